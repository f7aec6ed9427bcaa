//! Statistics snapshots for relay connections and the supervisor

use std::time::Duration;

use crate::client::state::ConnectionPhase;
use crate::registry::frame::CameraId;

/// Point-in-time view of one relay connection
#[derive(Debug, Clone)]
pub struct RelayStats {
    /// Camera served by the connection
    pub camera_id: CameraId,
    /// Upstream stream port
    pub port: u16,
    /// Current phase
    pub phase: ConnectionPhase,
    /// Instantaneous frame rate
    pub fps: f64,
    /// Frames received since connect
    pub frames_received: u64,
    /// Payload bytes received since connect
    pub bytes_received: u64,
    /// Time since the last complete frame (None before the first one)
    pub last_frame_age: Option<Duration>,
    /// Time since the connection was created
    pub age: Duration,
}

impl RelayStats {
    /// Check if at least one frame is available
    pub fn has_frame(&self) -> bool {
        self.frames_received > 0
    }

    /// Mean payload size
    pub fn average_frame_size(&self) -> u64 {
        if self.frames_received > 0 {
            self.bytes_received / self.frames_received
        } else {
            0
        }
    }
}

/// Supervisor-wide counters
#[derive(Debug, Clone, Default)]
pub struct SupervisorStats {
    /// Connections currently registered
    pub active_connections: usize,
    /// Connections created since start
    pub total_connections: u64,
    /// Closures that counted toward burst detection
    pub erroneous_closes: u64,
    /// Capture process restarts requested
    pub restarts: u64,
}
