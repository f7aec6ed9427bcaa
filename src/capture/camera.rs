//! Camera configuration lookup
//!
//! The relay only needs a handful of fields from a camera's configuration:
//! whether it is enabled, whether its stream is hosted by the local capture
//! process, the stream port and the stream credentials.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::client::config::{AuthMode, ClientConfig, Credentials};
use crate::registry::frame::CameraId;

/// Stream-related fields of a camera configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraConfig {
    /// Camera is enabled
    pub enabled: bool,
    /// Stream is served by the local capture process
    pub local: bool,
    /// MJPEG stream port
    pub stream_port: u16,
    /// 0 = none, 1 = basic, 2 = digest
    pub stream_auth_method: u8,
    /// `username:password`
    pub stream_authentication: String,
}

impl CameraConfig {
    /// An enabled local camera without stream authentication
    pub fn local(stream_port: u16) -> Self {
        Self {
            enabled: true,
            local: true,
            stream_port,
            stream_auth_method: 0,
            stream_authentication: String::new(),
        }
    }

    /// Set stream authentication level and `user:pass` credentials
    pub fn with_auth(mut self, method: u8, authentication: impl Into<String>) -> Self {
        self.stream_auth_method = method;
        self.stream_authentication = authentication.into();
        self
    }

    /// Whether a relay connection may be created for this camera
    pub fn is_relayable(&self) -> bool {
        self.enabled && self.local
    }

    /// Stream authentication mode
    pub fn auth_mode(&self) -> AuthMode {
        AuthMode::from_level(self.stream_auth_method)
    }

    /// Decoded credentials (empty when authentication is off)
    pub fn credentials(&self) -> Credentials {
        match self.auth_mode() {
            AuthMode::None => Credentials::default(),
            AuthMode::Basic | AuthMode::Digest => Credentials::parse(&self.stream_authentication),
        }
    }

    /// Layer this camera's port and auth onto a client template
    pub fn client_config(&self, template: &ClientConfig) -> ClientConfig {
        template
            .clone()
            .port(self.stream_port)
            .auth(self.auth_mode(), self.credentials())
    }
}

/// Source of camera configurations
pub trait CameraSource: Send + Sync + 'static {
    /// Look up a camera; `None` if it is not configured
    fn camera(&self, camera_id: CameraId) -> Option<CameraConfig>;
}

/// In-memory camera table
#[derive(Debug, Default)]
pub struct StaticCameras {
    cameras: RwLock<HashMap<CameraId, CameraConfig>>,
}

impl StaticCameras {
    /// Create an empty camera table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a camera (builder style)
    pub fn with_camera(self, camera_id: impl Into<CameraId>, config: CameraConfig) -> Self {
        self.insert(camera_id, config);
        self
    }

    /// Add or replace a camera
    pub fn insert(&self, camera_id: impl Into<CameraId>, config: CameraConfig) {
        self.cameras
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(camera_id.into(), config);
    }

    /// Remove a camera
    pub fn remove(&self, camera_id: CameraId) -> Option<CameraConfig> {
        self.cameras
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&camera_id)
    }
}

impl CameraSource for StaticCameras {
    fn camera(&self, camera_id: CameraId) -> Option<CameraConfig> {
        self.cameras
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&camera_id)
            .cloned()
    }
}
