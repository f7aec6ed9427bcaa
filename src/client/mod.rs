//! MJPEG relay client
//!
//! One client per camera stream:
//! - Connects to the capture process on the camera's stream port
//! - Answers a single Basic/Digest challenge
//! - Publishes each completed JPEG frame to the registry entry

pub mod config;
pub mod connection;
pub mod state;

pub use config::{AuthMode, ClientConfig, Credentials};
pub use connection::RelayClient;
pub use state::ConnectionPhase;
