//! Frame rate accounting and statistics snapshots

pub mod framerate;
pub mod metrics;

pub use framerate::FrameRate;
pub use metrics::{RelayStats, SupervisorStats};
