use std::time::Duration;

use crate::config::Config;
use crate::signaling::state::RoomDirectory;
use crate::ws::ConnectionRegistry;

/// WebSocket keep-alive timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Liveness {
    /// Server sends a ping this often.
    pub ping_interval: Duration,
    /// Connection is closed if no pong arrives within this window after a ping.
    pub pong_timeout: Duration,
}

impl Default for Liveness {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(10),
        }
    }
}

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    /// Live WebSocket connections keyed by connection id
    pub connections: ConnectionRegistry,
    /// Active rooms and their participants
    pub rooms: RoomDirectory,
    /// Ping cadence and pong deadline for every WebSocket
    pub liveness: Liveness,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            connections: ConnectionRegistry::new(),
            rooms: RoomDirectory::new(),
            liveness: config.liveness(),
        }
    }
}
