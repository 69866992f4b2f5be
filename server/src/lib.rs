//! # Meadow Server Library
//!
//! This library provides the authoritative server for the meadow game. It owns
//! the canonical player and mob state, ticks it forward at a fixed rate and
//! pushes a full snapshot to every connected client after each tick.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Mobs only exist on the server. Each tick moves every mob by its kind's
//! update rule, enforces the mob cap and occasionally spawns a new one.
//!
//! ### Player State
//! Players are simulated by their own clients. The server stores whatever a
//! client last reported for its player and forwards it to everyone else.
//! Reports are not validated.
//!
//! ### State Broadcasting
//! Every tick each connection receives `SNAPSHOT_BEGIN`, one `PLAYER_UPDATE`
//! per other player in ascending connection order, and one `MOB_UPDATE` per
//! mob. There is no delta compression and no interest management.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Event Loop
//! One [`network::Server`] value owns the transport and the game state. Each
//! loop iteration drains transport events without blocking, then runs at most
//! one tick once enough time has accumulated. Nothing is shared between
//! tasks, so no locking is needed.
//!
//! ### Transport Independence
//! The loop is generic over [`shared::Transport`]. The binary runs it over
//! UDP; tests drive it through the in-memory hub.
//!
//! ### Lifecycle
//! Initializing, Running, Draining, Stopped. Draining asks every client to
//! disconnect and waits a bounded time for acknowledgements before resetting
//! the rest.
//!
//! ## Module Organization
//!
//! ### Config Module (`config`)
//! Server settings with defaults matching the shared constants.
//!
//! ### Game Module (`game`)
//! Canonical world state: the player table, the mob table and the RNG.
//!
//! ### Network Module (`network`)
//! The authority loop, its lifecycle and error type.
//!
//! ### Shutdown Module (`shutdown`)
//! The ctrl-c and SIGTERM future the binary stops on.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//! use server::shutdown::shutdown_signal;
//! use shared::transport::udp::UdpHost;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let transport = UdpHost::bind_with_config(&config.bind_addr(), config.udp_config())?;
//!
//!     let mut server = Server::new(transport, config)?;
//!     server.run(shutdown_signal()?).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod game;
pub mod network;
pub mod shutdown;
