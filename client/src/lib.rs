//! # Meadow Client Library
//!
//! This library provides the client side of the meadow game: local movement
//! prediction, mirrors of the server's players and mobs, and a renderer that
//! draws them.
//!
//! ## Architecture Overview
//!
//! ### Client-Side Prediction
//! The local player is simulated entirely on the client with the same damped
//! Euler step the server would use. Every frame the predicted state is sent to
//! the server, which takes it as truth. There is no rollback: the server never
//! corrects the local player.
//!
//! ### Mirrors
//! Snapshots from the server fill two non-authoritative mirrors:
//! - remote players, keyed by their slot in the latest snapshot
//! - mobs, matched to existing entries by proximity because mobs carry no id
//!
//! Mobs far from the local player are evicted locally, and the mirror is
//! capped independently of the server's table.
//!
//! ## Module Organization
//!
//! ### Config Module (`config`)
//! Client settings with defaults matching the shared constants.
//!
//! ### Game Module (`game`)
//! The local body, the remote player mirror and the mob mirror.
//!
//! ### Input Module (`input`)
//! Keyboard sampling into a movement input.
//!
//! ### Network Module (`network`)
//! Handshake, per-frame event handling, state reporting and shutdown.
//!
//! ### Rendering Module (`rendering`)
//! Scene composition against a small [`rendering::Canvas`] trait, with a
//! macroquad implementation for the binary.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::config::ClientConfig;
//! use client::network::Client;
//! use shared::transport::udp::{resolve, UdpHost};
//! use shared::InputState;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::default();
//!     let mut transport = UdpHost::bind("0.0.0.0:0")?;
//!     let server = transport.connect(resolve(&config.server)?)?;
//!
//!     let mut client = Client::new(transport, server, config.clone());
//!     client.connect(config.connect_timeout)?;
//!
//!     for _ in 0..600 {
//!         client.frame(&InputState::default(), 1.0 / 60.0)?;
//!         std::thread::sleep(std::time::Duration::from_millis(16));
//!     }
//!
//!     client.shutdown(config.shutdown_timeout);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod game;
pub mod input;
pub mod network;
pub mod rendering;
