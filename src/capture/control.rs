//! Capture process lifecycle
//!
//! The relay does not manage the capture process itself; it only asks for a
//! restart when the streams indicate the process is unhealthy.

/// Lifecycle operations of the capture process
pub trait CaptureControl: Send + Sync + 'static {
    /// Stop the capture process; `invalidate` drops any cached process state
    fn stop(&self, invalidate: bool);

    /// Start the capture process; `deferred` schedules the start instead of
    /// running it inline
    fn start(&self, deferred: bool);
}

/// Capture control that only logs requests
///
/// For deployments where the capture process is supervised elsewhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnmanagedCapture;

impl CaptureControl for UnmanagedCapture {
    fn stop(&self, invalidate: bool) {
        tracing::warn!(invalidate, "Capture process stop requested, not managed here");
    }

    fn start(&self, deferred: bool) {
        tracing::warn!(deferred, "Capture process start requested, not managed here");
    }
}
