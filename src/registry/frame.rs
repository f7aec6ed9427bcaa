//! Camera keys and cached frames

use std::time::Instant;

use bytes::Bytes;

/// Identifier of a configured camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CameraId(pub u32);

impl From<u32> for CameraId {
    fn from(id: u32) -> Self {
        CameraId(id)
    }
}

impl std::fmt::Display for CameraId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The latest complete JPEG received on a connection
///
/// Cheap to clone: `Bytes` is reference counted, so every reader shares the
/// same allocation until the next frame replaces it.
#[derive(Debug, Clone)]
pub struct Frame {
    /// JPEG payload
    pub data: Bytes,
    /// When the last byte of the payload arrived
    pub received_at: Instant,
}

impl Frame {
    /// Wrap a completed payload
    pub fn new(data: Bytes, received_at: Instant) -> Self {
        Self { data, received_at }
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_id_display() {
        assert_eq!(CameraId(3).to_string(), "3");
        assert_eq!(CameraId::from(7), CameraId(7));
    }

    #[test]
    fn test_frame_shares_payload() {
        let data = Bytes::from_static(b"\xff\xd8\xff\xd9");
        let frame = Frame::new(data.clone(), Instant::now());
        let copy = frame.clone();

        assert_eq!(copy.len(), 4);
        assert_eq!(copy.data.as_ptr(), data.as_ptr());
    }
}
