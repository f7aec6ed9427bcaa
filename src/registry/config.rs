//! Supervisor configuration

use std::time::Duration;

use crate::client::config::ClientConfig;

/// Registry and supervisor configuration
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Frame timeout: a connection without a frame for this long is stalled.
    /// Also the sweep interval and the erroneous-close burst window.
    pub frame_timeout: Duration,

    /// Close connections nobody has read from for this long (None = never)
    pub idle_timeout: Option<Duration>,

    /// Restart the capture process on stalls and error bursts
    pub restart_on_errors: bool,

    /// Template for per-camera client configs (port and auth are filled in)
    pub client: ClientConfig,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            frame_timeout: Duration::from_secs(10),
            idle_timeout: Some(Duration::from_secs(20)),
            restart_on_errors: true,
            client: ClientConfig::default(),
        }
    }
}

impl SupervisorConfig {
    /// Set the frame timeout
    pub fn frame_timeout(mut self, timeout: Duration) -> Self {
        self.frame_timeout = timeout;
        self
    }

    /// Set the idle timeout; `Duration::ZERO` disables idle closing
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Never close idle connections
    pub fn disable_idle_timeout(mut self) -> Self {
        self.idle_timeout = None;
        self
    }

    /// Enable or disable capture process restarts
    pub fn restart_on_errors(mut self, enabled: bool) -> Self {
        self.restart_on_errors = enabled;
        self
    }

    /// Set the client template
    pub fn client(mut self, client: ClientConfig) -> Self {
        self.client = client;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SupervisorConfig::default();

        assert_eq!(config.frame_timeout, Duration::from_secs(10));
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(20)));
        assert!(config.restart_on_errors);
        assert_eq!(config.client.host, "127.0.0.1");
    }

    #[test]
    fn test_zero_idle_timeout_disables() {
        let config = SupervisorConfig::default().idle_timeout(Duration::ZERO);
        assert_eq!(config.idle_timeout, None);

        let config = SupervisorConfig::default().idle_timeout(Duration::from_secs(5));
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_builder_chaining() {
        let config = SupervisorConfig::default()
            .frame_timeout(Duration::from_secs(30))
            .disable_idle_timeout()
            .restart_on_errors(false)
            .client(ClientConfig::default().host("localhost"));

        assert_eq!(config.frame_timeout, Duration::from_secs(30));
        assert_eq!(config.idle_timeout, None);
        assert!(!config.restart_on_errors);
        assert_eq!(config.client.host, "localhost");
    }
}
