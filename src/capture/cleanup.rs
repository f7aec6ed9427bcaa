//! Periodic media cleanup
//!
//! Runs an external cleanup program on a fixed interval, each run in its own
//! process group with SIGINT/SIGTERM ignored so that stopping the relay never
//! interrupts a half-finished deletion. A run still alive when the next one is
//! due gets `join_timeout` to finish before it is killed.

use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::error::Result;

/// Cleanup scheduler configuration
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    /// Time between runs; `None` or zero disables the scheduler
    pub interval: Option<Duration>,

    /// Cleanup program
    pub program: String,

    /// Program arguments
    pub args: Vec<String>,

    /// How long an overrunning run may continue before it is killed
    pub join_timeout: Duration,

    /// Upper bound on the delay before the first run
    pub first_run_cap: Duration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval: None,
            program: String::new(),
            args: Vec::new(),
            join_timeout: Duration::from_secs(10),
            first_run_cap: Duration::from_secs(60),
        }
    }
}

impl CleanupConfig {
    /// Run `program` every `interval`
    pub fn new(program: impl Into<String>, interval: Duration) -> Self {
        Self {
            interval: Some(interval),
            program: program.into(),
            ..Default::default()
        }
    }

    /// Set program arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the overrun grace period
    pub fn join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    /// Active interval, if the scheduler is enabled
    pub fn active_interval(&self) -> Option<Duration> {
        self.interval.filter(|interval| !interval.is_zero())
    }

    /// Delay before the first run
    pub fn first_delay(&self) -> Option<Duration> {
        self.active_interval()
            .map(|interval| interval.min(self.first_run_cap))
    }
}

/// Spawns and reaps the cleanup process
pub struct CleanupScheduler {
    config: CleanupConfig,
    child: Mutex<Option<Child>>,
    runs: AtomicU64,
}

impl CleanupScheduler {
    /// Create an idle scheduler
    pub fn new(config: CleanupConfig) -> Self {
        Self {
            config,
            child: Mutex::new(None),
            runs: AtomicU64::new(0),
        }
    }

    /// Get the scheduler configuration
    pub fn config(&self) -> &CleanupConfig {
        &self.config
    }

    /// Number of runs started so far
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }

    /// Spawn the background schedule
    ///
    /// Returns `None` when no interval is configured.
    pub fn start(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let interval = self.config.active_interval()?;
        let first = self.config.first_delay()?;
        let scheduler = Arc::clone(self);

        tracing::info!(
            program = %self.config.program,
            interval_secs = interval.as_secs(),
            first_run_secs = first.as_secs(),
            "Media cleanup scheduled"
        );

        Some(tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + first, interval);
            loop {
                ticker.tick().await;
                if let Err(e) = scheduler.run_once().await {
                    tracing::error!(error = %e, "Media cleanup failed to start");
                }
            }
        }))
    }

    /// Start one cleanup run, reaping the previous one first
    pub async fn run_once(&self) -> Result<()> {
        let mut child = self.child.lock().await;

        if let Some(previous) = child.as_mut() {
            if previous.try_wait()?.is_none() {
                tracing::warn!("Previous media cleanup still running");
                reap(previous, self.config.join_timeout).await?;
            }
        }

        let mut command = Command::new(&self.config.program);
        command.args(&self.config.args).stdin(Stdio::null());
        #[cfg(unix)]
        detach(&mut command);

        let spawned = command.spawn()?;
        tracing::debug!(pid = ?spawned.id(), "Media cleanup started");

        *child = Some(spawned);
        self.runs.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Whether the last run is still alive
    pub async fn running(&self) -> bool {
        match self.child.lock().await.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Process id of the last run, while it is alive
    pub async fn pid(&self) -> Option<u32> {
        self.child.lock().await.as_ref().and_then(Child::id)
    }

    /// Wait for (or kill) the last run
    pub async fn stop(&self) -> Result<()> {
        let Some(mut child) = self.child.lock().await.take() else {
            return Ok(());
        };
        if child.try_wait()?.is_none() {
            reap(&mut child, self.config.join_timeout).await?;
        }
        Ok(())
    }
}

/// Wait up to `timeout` for `child`, then kill it
async fn reap(child: &mut Child, timeout: Duration) -> Result<()> {
    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(status) => {
            tracing::debug!(status = %status?, "Media cleanup finished");
        }
        Err(_) => {
            tracing::error!(
                timeout_ms = timeout.as_millis() as u64,
                "Media cleanup did not finish in time, killing it"
            );
            child.kill().await?;
        }
    }
    Ok(())
}

/// Own process group, termination signals ignored
#[cfg(unix)]
fn detach(command: &mut Command) {
    // SAFETY: setpgid and signal are async-signal-safe
    unsafe {
        command.pre_exec(|| {
            if libc::setpgid(0, 0) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            libc::signal(libc::SIGINT, libc::SIG_IGN);
            libc::signal(libc::SIGTERM, libc::SIG_IGN);
            Ok(())
        });
    }
}
