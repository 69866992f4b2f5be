use shared::{DEFAULT_PORT, MAX_DISTANCE, MAX_MOBS, PROXIMITY_THRESHOLD};
use std::time::Duration;

/// Client settings. The binary fills these from the command line.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server: String,
    pub width: u32,
    pub height: u32,
    pub connect_timeout: Duration,
    pub shutdown_timeout: Duration,
    /// Incoming mob snapshots within this distance overwrite a mirror entry.
    pub proximity_threshold: f32,
    /// Mirrored mobs farther than this from the local player are evicted.
    pub max_distance: f32,
    pub max_mobs: usize,
    /// Transport events handled per frame
    pub max_events_per_frame: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: format!("127.0.0.1:{}", DEFAULT_PORT),
            width: 800,
            height: 600,
            connect_timeout: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(1),
            proximity_threshold: PROXIMITY_THRESHOLD,
            max_distance: MAX_DISTANCE,
            max_mobs: MAX_MOBS,
            max_events_per_frame: 8192,
        }
    }
}
