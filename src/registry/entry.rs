//! Per-camera relay connection state
//!
//! A `RelayEntry` is shared between the registry (readers, sweep) and the
//! task driving the upstream socket. All fields behind the mutex are touched
//! in short, non-blocking sections so frame reads never wait on I/O.

use std::sync::Mutex;
use std::time::Instant;

use bytes::Bytes;
use tokio::task::JoinHandle;

use crate::client::state::ConnectionPhase;
use crate::stats::{FrameRate, RelayStats};

use super::frame::{CameraId, Frame};
use super::lock;

#[derive(Debug)]
struct EntryState {
    phase: ConnectionPhase,
    last_frame: Option<Frame>,
    frame_rate: FrameRate,
    last_access: Instant,
    frames_received: u64,
    bytes_received: u64,
}

/// Relay connection for a single camera
#[derive(Debug)]
pub struct RelayEntry {
    /// Monotonic id distinguishing successive connections for one camera
    connection_id: u64,

    camera_id: CameraId,

    port: u16,

    created_at: Instant,

    state: Mutex<EntryState>,

    /// Task driving the socket, aborted on close
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RelayEntry {
    pub(crate) fn new(connection_id: u64, camera_id: CameraId, port: u16, now: Instant) -> Self {
        Self {
            connection_id,
            camera_id,
            port,
            created_at: now,
            state: Mutex::new(EntryState {
                phase: ConnectionPhase::Connecting,
                last_frame: None,
                frame_rate: FrameRate::new(),
                last_access: now,
                frames_received: 0,
                bytes_received: 0,
            }),
            task: Mutex::new(None),
        }
    }

    /// Id of this connection instance
    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    /// Camera served by this connection
    pub fn camera_id(&self) -> CameraId {
        self.camera_id
    }

    /// Upstream stream port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// When the connection was created
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Latest frame, recording `now` as the last access time
    pub fn last_frame_at(&self, now: Instant) -> Option<Bytes> {
        let mut state = lock(&self.state);
        state.last_access = now;
        state.last_frame.as_ref().map(|frame| frame.data.clone())
    }

    /// Latest frame without touching the access time
    pub fn peek_frame(&self) -> Option<Frame> {
        lock(&self.state).last_frame.clone()
    }

    /// Replace the cached frame with a newly completed one
    pub(crate) fn push_frame(&self, data: Bytes, at: Instant) {
        let mut state = lock(&self.state);
        state.frames_received += 1;
        state.bytes_received += data.len() as u64;
        state.frame_rate.record(at);
        state.last_frame = Some(Frame::new(data, at));
    }

    /// Frame rate as of `now`
    pub fn fps_at(&self, now: Instant) -> f64 {
        lock(&self.state).frame_rate.fps_at(now)
    }

    /// Arrival time of the newest frame, or creation time before the first one
    pub fn last_activity(&self) -> Instant {
        lock(&self.state)
            .frame_rate
            .newest()
            .unwrap_or(self.created_at)
    }

    /// Time of the most recent frame read
    pub fn last_access(&self) -> Instant {
        lock(&self.state).last_access
    }

    /// Current connection phase
    pub fn phase(&self) -> ConnectionPhase {
        lock(&self.state).phase
    }

    /// Check if the connection has been closed
    pub fn is_closed(&self) -> bool {
        !self.phase().is_open()
    }

    /// Update the phase unless the connection was already closed
    pub(crate) fn set_phase(&self, phase: ConnectionPhase) {
        let mut state = lock(&self.state);
        if state.phase.is_open() {
            state.phase = phase;
        }
    }

    /// Attach the task driving this connection
    ///
    /// If the entry was closed before the task could be attached, the task
    /// is aborted straight away.
    pub(crate) fn attach(&self, handle: JoinHandle<()>) {
        // Held across the phase check so a concurrent close() either sees
        // the handle or has already flipped the phase
        let mut task = lock(&self.task);
        if self.is_closed() {
            handle.abort();
            return;
        }
        *task = Some(handle);
    }

    /// Release the socket by aborting the driving task
    ///
    /// The task may be mid-scan; whatever it buffered is dropped and never
    /// becomes the cached frame.
    pub(crate) fn close(&self) {
        lock(&self.state).phase = ConnectionPhase::Closed;
        if let Some(handle) = lock(&self.task).take() {
            handle.abort();
        }
    }

    /// Mark closed from inside the driving task
    pub(crate) fn mark_closed(&self) {
        lock(&self.state).phase = ConnectionPhase::Closed;
        lock(&self.task).take();
    }

    /// Statistics snapshot as of `now`
    pub fn stats_at(&self, now: Instant) -> RelayStats {
        let state = lock(&self.state);
        RelayStats {
            camera_id: self.camera_id,
            port: self.port,
            phase: state.phase,
            fps: state.frame_rate.fps_at(now),
            frames_received: state.frames_received,
            bytes_received: state.bytes_received,
            last_frame_age: state
                .last_frame
                .as_ref()
                .map(|frame| now.saturating_duration_since(frame.received_at)),
            age: now.saturating_duration_since(self.created_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn entry(now: Instant) -> RelayEntry {
        RelayEntry::new(1, CameraId(1), 8081, now)
    }

    #[test]
    fn test_new_entry() {
        let now = Instant::now();
        let entry = entry(now);

        assert_eq!(entry.phase(), ConnectionPhase::Connecting);
        assert_eq!(entry.last_activity(), now);
        assert_eq!(entry.last_access(), now);
        assert!(entry.peek_frame().is_none());
        assert!(!entry.is_closed());
    }

    #[test]
    fn test_frame_overwritten_not_appended() {
        let now = Instant::now();
        let entry = entry(now);

        entry.push_frame(Bytes::from_static(b"AAAAA"), now + Duration::from_millis(10));
        entry.push_frame(Bytes::from_static(b"BBB"), now + Duration::from_millis(20));

        let later = now + Duration::from_millis(30);
        assert_eq!(entry.last_frame_at(later).unwrap(), Bytes::from_static(b"BBB"));
        assert_eq!(entry.last_access(), later);
        assert_eq!(entry.last_activity(), now + Duration::from_millis(20));

        let stats = entry.stats_at(later);
        assert_eq!(stats.frames_received, 2);
        assert_eq!(stats.bytes_received, 8);
        assert_eq!(stats.last_frame_age, Some(Duration::from_millis(10)));
    }

    #[test]
    fn test_peek_does_not_touch_access() {
        let now = Instant::now();
        let entry = entry(now);
        entry.push_frame(Bytes::from_static(b"X"), now);

        assert!(entry.peek_frame().is_some());
        assert_eq!(entry.last_access(), now);
    }

    #[test]
    fn test_closed_phase_is_sticky() {
        let entry = entry(Instant::now());
        entry.close();
        entry.set_phase(ConnectionPhase::ReadingBody);

        assert_eq!(entry.phase(), ConnectionPhase::Closed);
        assert!(entry.is_closed());
    }

    /// A task that never finishes on its own; `rx` resolves once it is dropped
    fn pending_task() -> (JoinHandle<()>, tokio::sync::oneshot::Receiver<()>) {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let _tx = tx;
            std::future::pending::<()>().await;
        });
        (handle, rx)
    }

    #[tokio::test]
    async fn test_close_aborts_task() {
        let entry = entry(Instant::now());
        let (handle, dropped) = pending_task();
        entry.attach(handle);

        entry.close();
        assert!(dropped.await.is_err());
    }

    #[tokio::test]
    async fn test_attach_after_close_aborts() {
        let entry = entry(Instant::now());
        entry.close();

        let (handle, dropped) = pending_task();
        entry.attach(handle);
        assert!(dropped.await.is_err());
    }
}
