//! In-process transport with immediate, ordered, lossless delivery.
//!
//! Hosts created from the same [`MemoryHub`] can connect to each other; every
//! send lands in the peer's event queue right away. Tests and local play use
//! it to drive a server and its clients from one thread.

use crate::error::TransportError;
use crate::transport::{ConnectionId, DisconnectReason, SendMode, Transport, TransportEvent};
use crate::MAX_CLIENTS;
use log::debug;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::rc::Rc;

struct HostSlot {
    events: VecDeque<TransportEvent>,
    connections: BTreeSet<ConnectionId>,
    next_id: u32,
    max_peers: usize,
}

impl HostSlot {
    fn allocate(&mut self) -> ConnectionId {
        let id = ConnectionId(self.next_id);
        self.next_id += 1;
        id
    }
}

#[derive(Default)]
struct HubInner {
    hosts: Vec<HostSlot>,
    /// (host, local id) -> (remote host, remote id)
    links: HashMap<(usize, ConnectionId), (usize, ConnectionId)>,
}

#[derive(Clone, Default)]
pub struct MemoryHub {
    inner: Rc<RefCell<HubInner>>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(&self) -> MemoryHost {
        self.host_with_capacity(MAX_CLIENTS)
    }

    pub fn host_with_capacity(&self, max_peers: usize) -> MemoryHost {
        let mut inner = self.inner.borrow_mut();
        inner.hosts.push(HostSlot {
            events: VecDeque::new(),
            connections: BTreeSet::new(),
            next_id: 1,
            max_peers,
        });

        MemoryHost {
            hub: Rc::clone(&self.inner),
            index: inner.hosts.len() - 1,
        }
    }
}

pub struct MemoryHost {
    hub: Rc<RefCell<HubInner>>,
    index: usize,
}

impl MemoryHost {
    /// Connects to `remote`. Both sides see `Connected` on their next poll,
    /// unless `remote` is full, in which case this side sees `Refused`.
    pub fn connect(&mut self, remote: &MemoryHost) -> ConnectionId {
        let mut hub = self.hub.borrow_mut();
        let local_id = hub.hosts[self.index].allocate();

        let remote_slot = &mut hub.hosts[remote.index];
        if remote_slot.connections.len() >= remote_slot.max_peers {
            debug!("Memory host {} refused a connection", remote.index);
            hub.hosts[self.index]
                .events
                .push_back(TransportEvent::Disconnected(local_id, DisconnectReason::Refused));
            return local_id;
        }

        let remote_id = remote_slot.allocate();
        remote_slot.connections.insert(remote_id);
        remote_slot
            .events
            .push_back(TransportEvent::Connected(remote_id));

        let local_slot = &mut hub.hosts[self.index];
        local_slot.connections.insert(local_id);
        local_slot
            .events
            .push_back(TransportEvent::Connected(local_id));

        hub.links
            .insert((self.index, local_id), (remote.index, remote_id));
        hub.links
            .insert((remote.index, remote_id), (self.index, local_id));

        local_id
    }
}

impl Transport for MemoryHost {
    fn poll_event(&mut self) -> Option<TransportEvent> {
        self.hub.borrow_mut().hosts[self.index].events.pop_front()
    }

    fn send(
        &mut self,
        connection: ConnectionId,
        payload: &[u8],
        _mode: SendMode,
    ) -> Result<(), TransportError> {
        let mut hub = self.hub.borrow_mut();
        let (remote, remote_id) = *hub
            .links
            .get(&(self.index, connection))
            .ok_or(TransportError::UnknownConnection(connection))?;

        let slot = &mut hub.hosts[remote];
        // The remote side may have reset the connection without telling us.
        if slot.connections.contains(&remote_id) {
            slot.events
                .push_back(TransportEvent::Received(remote_id, payload.to_vec()));
        }
        Ok(())
    }

    fn connections(&self) -> Vec<ConnectionId> {
        self.hub.borrow().hosts[self.index]
            .connections
            .iter()
            .copied()
            .collect()
    }

    fn disconnect(&mut self, connection: ConnectionId) {
        let mut hub = self.hub.borrow_mut();
        let Some((remote, remote_id)) = hub.links.remove(&(self.index, connection)) else {
            return;
        };
        hub.links.remove(&(remote, remote_id));

        let local_slot = &mut hub.hosts[self.index];
        local_slot.connections.remove(&connection);
        local_slot
            .events
            .push_back(TransportEvent::Disconnected(connection, DisconnectReason::Requested));

        let remote_slot = &mut hub.hosts[remote];
        if remote_slot.connections.remove(&remote_id) {
            remote_slot
                .events
                .push_back(TransportEvent::Disconnected(remote_id, DisconnectReason::Remote));
        }
    }

    fn reset(&mut self, connection: ConnectionId) {
        let mut hub = self.hub.borrow_mut();
        hub.links.remove(&(self.index, connection));

        let slot = &mut hub.hosts[self.index];
        slot.connections.remove(&connection);
        slot.events.retain(|event| event.connection() != connection);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_reports_both_sides() {
        let hub = MemoryHub::new();
        let mut server = hub.host();
        let mut client = hub.host();

        let to_server = client.connect(&server);

        assert_eq!(client.poll_event(), Some(TransportEvent::Connected(to_server)));
        assert_eq!(
            server.poll_event(),
            Some(TransportEvent::Connected(ConnectionId(1)))
        );
        assert_eq!(server.connections(), vec![ConnectionId(1)]);
    }

    #[test]
    fn test_send_is_ordered_and_immediate() {
        let hub = MemoryHub::new();
        let mut server = hub.host();
        let mut client = hub.host();
        let to_server = client.connect(&server);
        server.drain_events(16);

        for i in 0..5u8 {
            client.send(to_server, &[i], SendMode::Unreliable).unwrap();
        }

        let received: Vec<u8> = server
            .drain_events(16)
            .into_iter()
            .filter_map(|event| match event {
                TransportEvent::Received(_, payload) => payload.first().copied(),
                _ => None,
            })
            .collect();
        assert_eq!(received, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_send_to_unknown_connection_fails() {
        let hub = MemoryHub::new();
        let mut host = hub.host();

        assert!(matches!(
            host.send(ConnectionId(7), &[1], SendMode::Reliable),
            Err(TransportError::UnknownConnection(ConnectionId(7)))
        ));
    }

    #[test]
    fn test_disconnect_notifies_both_sides() {
        let hub = MemoryHub::new();
        let mut server = hub.host();
        let mut client = hub.host();
        let to_server = client.connect(&server);
        client.drain_events(16);
        server.drain_events(16);

        client.disconnect(to_server);

        assert_eq!(
            client.poll_event(),
            Some(TransportEvent::Disconnected(to_server, DisconnectReason::Requested))
        );
        assert_eq!(
            server.poll_event(),
            Some(TransportEvent::Disconnected(ConnectionId(1), DisconnectReason::Remote))
        );
        assert!(server.connections().is_empty());
        assert!(client.connections().is_empty());
    }

    #[test]
    fn test_capacity_refusal() {
        let hub = MemoryHub::new();
        let server = hub.host_with_capacity(1);
        let mut first = hub.host();
        let mut second = hub.host();

        first.connect(&server);
        let refused = second.connect(&server);

        assert_eq!(
            second.poll_event(),
            Some(TransportEvent::Disconnected(refused, DisconnectReason::Refused))
        );
        assert_eq!(server.connections().len(), 1);
    }

    #[test]
    fn test_reset_drops_pending_events() {
        let hub = MemoryHub::new();
        let mut server = hub.host();
        let mut client = hub.host();
        let to_server = client.connect(&server);
        client.send(to_server, &[1], SendMode::Unreliable).unwrap();

        server.reset(ConnectionId(1));

        assert!(server.poll_event().is_none());
        assert!(server.connections().is_empty());

        // Later sends from the client go nowhere.
        client.send(to_server, &[2], SendMode::Unreliable).unwrap();
        assert!(server.poll_event().is_none());
    }
}
