//! Collaborators around the capture process
//!
//! - [`camera`]: camera configuration lookup
//! - [`control`]: stop/start of the shared capture process
//! - [`cleanup`]: periodic media cleanup in a separate process

pub mod camera;
pub mod cleanup;
pub mod control;

pub use camera::{CameraConfig, CameraSource, StaticCameras};
pub use cleanup::{CleanupConfig, CleanupScheduler};
pub use control::{CaptureControl, UnmanagedCapture};
