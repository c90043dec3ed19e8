use std::num::NonZeroUsize;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::models::{CoreError, CoreErrorKind, CoreResult};

pub const DEFAULT_THREAD_NAME: &str = "baton-worker";

/// Sizing for [`crate::pool::ThreadPool`].
///
/// `queue_capacity: None` means an unbounded queue.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    pub workers: usize,
    pub queue_capacity: Option<usize>,
    pub thread_name: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            queue_capacity: None,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl PoolConfig {
    pub fn single_worker() -> Self {
        Self {
            workers: 1,
            ..Self::default()
        }
    }

    pub fn from_json_str(raw: &str) -> CoreResult<Self> {
        let config: Self = serde_json::from_str(raw).map_err(|error| {
            CoreError::invalid_input(format!("invalid pool configuration: {error}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|error| {
            CoreError::new(
                CoreErrorKind::Internal,
                format!(
                    "failed to read pool configuration '{}': {error}",
                    path.display()
                ),
            )
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.workers == 0 {
            return Err(CoreError::invalid_input(
                "pool must have at least one worker",
            ));
        }

        if self.queue_capacity == Some(0) {
            return Err(CoreError::invalid_input(
                "queue capacity must be greater than zero when provided",
            ));
        }

        if self.thread_name.is_empty() || self.thread_name.contains('\0') {
            return Err(CoreError::invalid_input(
                "thread name must be non-empty and must not contain NUL bytes",
            ));
        }

        Ok(())
    }
}
