//! Worker pool configuration.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Configuration for a [`Dispatcher`](crate::Dispatcher).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Maximum number of operations running at once. Extra work queues.
    pub worker_threads: usize,

    /// Name given to worker threads (shows up in debuggers and logs).
    pub thread_name: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            worker_threads: 4,
            thread_name: "tessera-worker".to_string(),
        }
    }
}

impl DispatchConfig {
    /// Upper bound on `worker_threads`.
    pub const MAX_WORKER_THREADS: usize = 64;

    /// A default config with a specific pool size.
    pub fn with_workers(worker_threads: usize) -> Self {
        Self {
            worker_threads,
            ..Default::default()
        }
    }

    /// Clamps out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`Dispatcher::new`](crate::Dispatcher::new).
    /// - `worker_threads` forced into `1..=MAX_WORKER_THREADS`.
    /// - An empty `thread_name` falls back to the default.
    pub fn validated(mut self) -> Self {
        if self.worker_threads == 0 {
            warn!("worker_threads is 0, using 1");
            self.worker_threads = 1;
        } else if self.worker_threads > Self::MAX_WORKER_THREADS {
            warn!(
                requested = self.worker_threads,
                max = Self::MAX_WORKER_THREADS,
                "worker_threads exceeds maximum, clamping"
            );
            self.worker_threads = Self::MAX_WORKER_THREADS;
        }
        if self.thread_name.is_empty() {
            self.thread_name = Self::default().thread_name;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DispatchConfig::default();
        assert_eq!(config.worker_threads, 4);
        assert_eq!(config.thread_name, "tessera-worker");
    }

    #[test]
    fn test_validated_zero_workers_becomes_one() {
        let config = DispatchConfig::with_workers(0).validated();
        assert_eq!(config.worker_threads, 1);
    }

    #[test]
    fn test_validated_clamps_to_max() {
        let config = DispatchConfig::with_workers(1_000).validated();
        assert_eq!(config.worker_threads, DispatchConfig::MAX_WORKER_THREADS);
    }

    #[test]
    fn test_validated_restores_empty_thread_name() {
        let config = DispatchConfig {
            worker_threads: 2,
            thread_name: String::new(),
        }
        .validated();
        assert_eq!(config.thread_name, "tessera-worker");
        assert_eq!(config.worker_threads, 2);
    }

    #[test]
    fn test_deserialize_partial_config_uses_defaults() {
        let config: DispatchConfig =
            serde_json::from_str(r#"{"worker_threads": 8}"#).unwrap();
        assert_eq!(config.worker_threads, 8);
        assert_eq!(config.thread_name, "tessera-worker");
    }
}
