//! MJPEG relay client library
//!
//! Keeps one long-lived connection per camera to the local motion capture
//! process, parses its `Content-Length` framed MJPEG stream and serves the
//! most recent JPEG frame and the current frame rate to any number of
//! readers without blocking them on upstream I/O.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use mjpg_relay::capture::{CameraConfig, StaticCameras, UnmanagedCapture};
//! use mjpg_relay::{CameraId, RelaySupervisor, SupervisorConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let cameras = StaticCameras::new().with_camera(1, CameraConfig::local(8081));
//!     let supervisor = Arc::new(RelaySupervisor::new(
//!         SupervisorConfig::default(),
//!         Arc::new(cameras),
//!         Arc::new(UnmanagedCapture),
//!     ));
//!     supervisor.start();
//!
//!     // First call connects; later calls return the latest frame
//!     let _ = supervisor.get_frame(CameraId(1));
//!     tokio::time::sleep(std::time::Duration::from_secs(1)).await;
//!
//!     if let Some(jpeg) = supervisor.get_frame(CameraId(1)) {
//!         println!("{} bytes at {:.1} fps", jpeg.len(), supervisor.get_fps(CameraId(1)));
//!     }
//! }
//! ```

pub mod capture;
pub mod client;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod stats;

pub use client::{AuthMode, ClientConfig, ConnectionPhase, Credentials};
pub use error::{Error, ProtocolError, Result};
pub use registry::{CameraId, RelaySupervisor, SupervisorConfig, SweepReport};
pub use stats::{RelayStats, SupervisorStats};
