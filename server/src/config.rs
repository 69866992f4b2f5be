//! Server configuration

use shared::transport::udp::UdpConfig;
use shared::{
    DEFAULT_PORT, MAX_CLIENTS, MAX_MOBS, MOB_SOFT_CAP, MOB_SPAWN_CHANCE, SEED_MOBS, TICK_RATE,
};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Authoritative ticks per second
    pub tick_rate: u32,
    pub max_clients: usize,
    /// Mobs spawned before the first tick
    pub seed_mobs: usize,
    /// Hard cap on the mob table, enforced after every spawn and tick
    pub max_mobs: usize,
    /// Random respawns only happen below this count
    pub mob_soft_cap: usize,
    /// Per-tick respawn probability
    pub spawn_chance: f64,
    /// How long shutdown waits for clients to acknowledge the disconnect
    pub drain_timeout: Duration,
    /// Fixed RNG seed for reproducible mob spawns
    pub seed: Option<u64>,
    /// Transport events handled per loop iteration
    pub max_events_per_step: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            tick_rate: TICK_RATE,
            max_clients: MAX_CLIENTS,
            seed_mobs: SEED_MOBS,
            max_mobs: MAX_MOBS,
            mob_soft_cap: MOB_SOFT_CAP,
            spawn_chance: MOB_SPAWN_CHANCE,
            drain_timeout: Duration::from_secs(1),
            seed: None,
            max_events_per_step: 4096,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Time between ticks. Zero tick rates are rejected before this is used.
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate.max(1)))
    }

    pub fn udp_config(&self) -> UdpConfig {
        UdpConfig {
            max_peers: self.max_clients,
            disconnect_timeout: self.drain_timeout,
            ..UdpConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr(), "0.0.0.0:1234");
        assert_eq!(config.tick_rate, 60);
        assert_eq!(config.max_clients, 32);
        assert_eq!(config.udp_config().max_peers, 32);
    }

    #[test]
    fn test_tick_duration() {
        let config = ServerConfig {
            tick_rate: 50,
            ..ServerConfig::default()
        };
        assert_eq!(config.tick_duration(), Duration::from_millis(20));
    }
}
