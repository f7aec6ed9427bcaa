//! Relay registry and supervisor
//!
//! Owns the camera → connection table, creates connections on demand and
//! watches them for stalls, idleness and bursts of erroneous closes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::capture::{CameraSource, CaptureControl};
use crate::client::config::ClientConfig;
use crate::client::connection::RelayClient;
use crate::error::Result;
use crate::stats::{RelayStats, SupervisorStats};

use super::config::SupervisorConfig;
use super::entry::RelayEntry;
use super::frame::CameraId;
use super::lock;

/// Lower bound on the sweep period
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

/// Outcome of one sweep pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Camera whose connection stalled (the pass stops there)
    pub stalled: Option<CameraId>,
    /// Whether the capture process restart was requested
    pub restarted: bool,
    /// Cameras whose connections were closed for idleness
    pub idle_closed: Vec<CameraId>,
}

/// Registry of relay connections, one per camera
///
/// `get_frame` and `get_fps` only take short std mutex sections and never
/// await, so they are safe to call from request handlers regardless of
/// upstream health.
pub struct RelaySupervisor {
    clients: Mutex<HashMap<CameraId, Arc<RelayEntry>>>,

    /// Time of the last closure that counted toward burst detection
    last_erroneous_close: Mutex<Option<Instant>>,

    next_connection_id: AtomicU64,
    total_connections: AtomicU64,
    erroneous_closes: AtomicU64,
    restarts: AtomicU64,

    cameras: Arc<dyn CameraSource>,
    capture: Arc<dyn CaptureControl>,

    config: SupervisorConfig,
}

impl RelaySupervisor {
    /// Create a supervisor with no connections
    pub fn new(
        config: SupervisorConfig,
        cameras: Arc<dyn CameraSource>,
        capture: Arc<dyn CaptureControl>,
    ) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            last_erroneous_close: Mutex::new(None),
            next_connection_id: AtomicU64::new(1),
            total_connections: AtomicU64::new(0),
            erroneous_closes: AtomicU64::new(0),
            restarts: AtomicU64::new(0),
            cameras,
            capture,
            config,
        }
    }

    /// Get the supervisor configuration
    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Latest frame for a camera, connecting on first use
    ///
    /// Returns `None` for unknown, disabled or remote cameras (no connection
    /// is created), and for a connection that has not completed a frame yet.
    pub fn get_frame(self: &Arc<Self>, camera_id: CameraId) -> Option<Bytes> {
        self.get_frame_at(camera_id, Instant::now())
    }

    /// [`get_frame`](Self::get_frame) with an explicit access time
    pub fn get_frame_at(self: &Arc<Self>, camera_id: CameraId, now: Instant) -> Option<Bytes> {
        if let Some(entry) = self.entry(camera_id) {
            return entry.last_frame_at(now);
        }

        let camera = self.cameras.camera(camera_id)?;
        if !camera.is_relayable() {
            tracing::debug!(camera = %camera_id, "Camera not relayable, no mjpg client");
            return None;
        }

        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!(camera = %camera_id, "No tokio runtime, cannot start mjpg client");
            return None;
        };

        let (entry, created) = self.register(camera_id, camera.stream_port, now);
        if created {
            self.spawn_client(&runtime, &entry, camera.client_config(&self.config.client));
        }
        entry.last_frame_at(now)
    }

    /// Current frame rate of a camera, 0 without a connection
    pub fn get_fps(&self, camera_id: CameraId) -> f64 {
        self.get_fps_at(camera_id, Instant::now())
    }

    /// [`get_fps`](Self::get_fps) with an explicit reference time
    pub fn get_fps_at(&self, camera_id: CameraId, now: Instant) -> f64 {
        self.entry(camera_id)
            .map(|entry| entry.fps_at(now))
            .unwrap_or(0.0)
    }

    /// Connection statistics for a camera
    pub fn stats(&self, camera_id: CameraId) -> Option<RelayStats> {
        self.entry(camera_id)
            .map(|entry| entry.stats_at(Instant::now()))
    }

    /// Supervisor-wide counters
    pub fn supervisor_stats(&self) -> SupervisorStats {
        SupervisorStats {
            active_connections: self.connection_count(),
            total_connections: self.total_connections.load(Ordering::Relaxed),
            erroneous_closes: self.erroneous_closes.load(Ordering::Relaxed),
            restarts: self.restarts.load(Ordering::Relaxed),
        }
    }

    /// Number of registered connections
    pub fn connection_count(&self) -> usize {
        lock(&self.clients).len()
    }

    /// Close one camera's connection; it is recreated on the next frame request
    pub fn close(&self, camera_id: CameraId) -> bool {
        let Some(entry) = lock(&self.clients).remove(&camera_id) else {
            return false;
        };
        entry.close();
        tracing::debug!(camera = %camera_id, port = entry.port(), "Mjpg client closed");
        true
    }

    /// Close every connection
    ///
    /// `invalidate` additionally resets erroneous-close tracking.
    pub fn close_all(&self, invalidate: bool) {
        let entries: Vec<Arc<RelayEntry>> = lock(&self.clients)
            .drain()
            .map(|(_, entry)| entry)
            .collect();

        for entry in &entries {
            entry.close();
        }

        if invalidate {
            *lock(&self.last_erroneous_close) = None;
        }

        tracing::debug!(count = entries.len(), invalidate, "Closed all mjpg clients");
    }

    /// Check every open connection for stalls and idleness
    pub fn sweep(&self) -> SweepReport {
        self.sweep_at(Instant::now())
    }

    /// [`sweep`](Self::sweep) with an explicit reference time
    pub fn sweep_at(&self, now: Instant) -> SweepReport {
        let entries: Vec<Arc<RelayEntry>> = lock(&self.clients).values().cloned().collect();
        let mut report = SweepReport::default();

        for entry in entries {
            if entry.is_closed() {
                continue;
            }

            let silent = now.saturating_duration_since(entry.last_activity());
            if silent > self.config.frame_timeout {
                tracing::error!(
                    camera = %entry.camera_id(),
                    port = entry.port(),
                    silent_secs = silent.as_secs(),
                    "Mjpg client timed out receiving data"
                );
                report.stalled = Some(entry.camera_id());
                if self.config.restart_on_errors {
                    self.restart_capture();
                    report.restarted = true;
                }
                // One stalled stream means the shared capture process is gone
                break;
            }

            if let Some(idle_timeout) = self.config.idle_timeout {
                let idle = now.saturating_duration_since(entry.last_access());
                if idle > idle_timeout {
                    tracing::debug!(
                        camera = %entry.camera_id(),
                        port = entry.port(),
                        idle_secs = idle.as_secs(),
                        "Mjpg client idle, removing it"
                    );
                    self.remove_entry(&entry);
                    entry.close();
                    report.idle_closed.push(entry.camera_id());
                }
            }
        }

        report
    }

    /// Spawn the periodic sweep
    ///
    /// The first pass runs one frame timeout after start.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let supervisor = Arc::clone(self);
        let period = self.config.frame_timeout.max(MIN_SWEEP_INTERVAL);

        tracing::info!(
            frame_timeout_secs = self.config.frame_timeout.as_secs(),
            idle_timeout_secs = self.config.idle_timeout.map(|t| t.as_secs()),
            restart_on_errors = self.config.restart_on_errors,
            "Relay supervisor started"
        );

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let report = supervisor.sweep();
                if report != SweepReport::default() {
                    tracing::debug!(?report, "Sweep finished");
                }
            }
        })
    }

    /// Record the end of a connection task
    pub(crate) fn report_closure(
        &self,
        camera_id: CameraId,
        connection_id: u64,
        result: &Result<()>,
        at: Instant,
    ) {
        {
            let mut clients = lock(&self.clients);
            match clients.get(&camera_id) {
                Some(entry) if entry.connection_id() == connection_id => {
                    clients.remove(&camera_id);
                }
                Some(entry) => {
                    tracing::warn!(
                        camera = %camera_id,
                        expected = entry.connection_id(),
                        actual = connection_id,
                        "Mjpg client close mismatch"
                    );
                }
                None => {}
            }
        }

        let error = match result {
            Ok(()) => {
                tracing::debug!(camera = %camera_id, "Mjpg client connection closed");
                return;
            }
            Err(error) => error,
        };

        if error.is_benign() {
            tracing::debug!(
                camera = %camera_id,
                error = %error,
                "Capture process not listening"
            );
            return;
        }

        if !error.counts_toward_burst() {
            tracing::debug!(camera = %camera_id, error = %error, "Mjpg client connection closed");
            return;
        }

        tracing::error!(camera = %camera_id, error = %error, "Mjpg client closed with error");
        self.erroneous_closes.fetch_add(1, Ordering::Relaxed);

        if self.arm_burst_detector(at) {
            tracing::error!(camera = %camera_id, "Connection problem detected for mjpg client");
            if self.config.restart_on_errors {
                self.restart_capture();
            }
        }
        *lock(&self.last_erroneous_close) = Some(at);
    }

    /// Whether a closure at `at` falls within the window of the previous one
    fn arm_burst_detector(&self, at: Instant) -> bool {
        match *lock(&self.last_erroneous_close) {
            Some(previous) => at.saturating_duration_since(previous) < self.config.frame_timeout,
            None => false,
        }
    }

    fn restart_capture(&self) {
        self.restarts.fetch_add(1, Ordering::Relaxed);
        tracing::info!("Restarting capture process");

        self.capture.stop(true);
        self.close_all(true);
        self.capture.start(true);
    }

    fn entry(&self, camera_id: CameraId) -> Option<Arc<RelayEntry>> {
        lock(&self.clients).get(&camera_id).cloned()
    }

    /// Install an entry for `camera_id` unless one already exists
    fn register(&self, camera_id: CameraId, port: u16, now: Instant) -> (Arc<RelayEntry>, bool) {
        let mut clients = lock(&self.clients);
        if let Some(existing) = clients.get(&camera_id) {
            return (Arc::clone(existing), false);
        }

        let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        let entry = Arc::new(RelayEntry::new(connection_id, camera_id, port, now));
        clients.insert(camera_id, Arc::clone(&entry));
        self.total_connections.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            camera = %camera_id,
            port,
            connection_id,
            "Creating mjpg client"
        );
        (entry, true)
    }

    fn remove_entry(&self, entry: &RelayEntry) {
        let mut clients = lock(&self.clients);
        if clients
            .get(&entry.camera_id())
            .is_some_and(|current| current.connection_id() == entry.connection_id())
        {
            clients.remove(&entry.camera_id());
        }
    }

    fn spawn_client(self: &Arc<Self>, runtime: &Handle, entry: &Arc<RelayEntry>, config: ClientConfig) {
        let supervisor = Arc::downgrade(self);
        let client = RelayClient::new(config, Arc::clone(entry));
        let task_entry = Arc::clone(entry);

        let handle = runtime.spawn(async move {
            let result = client.run().await;
            task_entry.mark_closed();
            if let Some(supervisor) = supervisor.upgrade() {
                supervisor.report_closure(
                    task_entry.camera_id(),
                    task_entry.connection_id(),
                    &result,
                    Instant::now(),
                );
            }
        });
        entry.attach(handle);
    }
}
