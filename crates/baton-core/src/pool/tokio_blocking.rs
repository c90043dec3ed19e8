use std::panic::{AssertUnwindSafe, catch_unwind};

use tokio::runtime::Handle;

use crate::models::{CoreError, CoreErrorKind, CoreResult};
use crate::pool::{Job, WorkerPool, panic_message};

/// Runs work on a tokio runtime's blocking thread pool.
///
/// Sizing and thread reuse follow the runtime's `max_blocking_threads` and
/// `thread_keep_alive` settings.
#[derive(Clone, Debug)]
pub struct TokioBlockingPool {
    handle: Handle,
}

impl TokioBlockingPool {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    pub fn current() -> CoreResult<Self> {
        Handle::try_current().map(Self::new).map_err(|error| {
            CoreError::new(
                CoreErrorKind::InvalidInput,
                format!("no tokio runtime is available: {error}"),
            )
        })
    }
}

impl WorkerPool for TokioBlockingPool {
    fn execute(&self, job: Job) -> CoreResult<()> {
        self.handle.spawn_blocking(move || {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
                let message = panic_message(payload.as_ref());
                tracing::error!(panic = %message, "blocking job panicked");
            }
        });
        Ok(())
    }
}
