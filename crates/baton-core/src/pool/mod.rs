pub mod context_pool;
pub mod thread_pool;
pub mod tokio_blocking;

pub use context_pool::ContextPropagatingPool;
pub use thread_pool::{PanicHandler, ThreadPool, ThreadPoolBuilder};
pub use tokio_blocking::TokioBlockingPool;

use std::any::Any;
use std::future::{Future, IntoFuture};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::oneshot;

use crate::models::CoreResult;

/// Fire-and-forget unit of work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

pub fn job(work: impl FnOnce() + Send + 'static) -> Job {
    Box::new(work)
}

pub type TaskOutcome<T> = Result<T, TaskError>;

#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum TaskError {
    #[error("task panicked: {0}")]
    Panicked(String),
    #[error("task was dropped before it completed")]
    Dropped,
}

/// Two ways work enters a pool: [`WorkerPool::execute`] without a result and
/// [`WorkerPool::submit`] with a [`TaskHandle`].
pub trait WorkerPool: Send + Sync {
    /// Queues `job` for execution. Rejection is reported synchronously.
    fn execute(&self, job: Job) -> CoreResult<()>;

    fn submit<F, T>(&self, work: F) -> CoreResult<TaskHandle<T>>
    where
        Self: Sized,
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (job, handle) = completion_job(work);
        self.execute(job)?;
        Ok(handle)
    }
}

impl<P: WorkerPool> WorkerPool for Arc<P> {
    fn execute(&self, job: Job) -> CoreResult<()> {
        (**self).execute(job)
    }

    fn submit<F, T>(&self, work: F) -> CoreResult<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        (**self).submit(work)
    }
}

/// Receiving side of a submitted task.
///
/// Resolves to exactly what the work returned, [`TaskError::Panicked`] when it
/// panicked, or [`TaskError::Dropped`] when the pool discarded it unrun.
pub struct TaskHandle<T> {
    receiver: oneshot::Receiver<TaskOutcome<T>>,
}

impl<T> TaskHandle<T> {
    /// Blocks the calling thread until the task finishes.
    ///
    /// Must not be called from inside an async runtime; await the handle there.
    pub fn join(self) -> TaskOutcome<T> {
        self.receiver
            .blocking_recv()
            .unwrap_or(Err(TaskError::Dropped))
    }

    /// Returns the outcome if the task already finished.
    pub fn try_join(&mut self) -> Option<TaskOutcome<T>> {
        match self.receiver.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(TaskError::Dropped)),
        }
    }
}

impl<T: Send + 'static> IntoFuture for TaskHandle<T> {
    type Output = TaskOutcome<T>;
    type IntoFuture = Pin<Box<dyn Future<Output = TaskOutcome<T>> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.receiver.await.unwrap_or(Err(TaskError::Dropped)) })
    }
}

/// Pairs `work` with a handle: the returned job runs the work, catches a
/// panic, and sends the outcome to the handle.
pub fn completion_job<F, T>(work: F) -> (Job, TaskHandle<T>)
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let (sender, receiver) = oneshot::channel();
    let job: Job = Box::new(move || {
        let outcome = catch_unwind(AssertUnwindSafe(work))
            .map_err(|payload| TaskError::Panicked(panic_message(payload.as_ref())));
        // The caller may have dropped the handle; the outcome is then unobserved.
        let _ = sender.send(outcome);
    });
    (job, TaskHandle { receiver })
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
