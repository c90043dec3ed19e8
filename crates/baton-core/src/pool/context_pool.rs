use crate::context_store::{ContextStore, ThreadLocalContextStore};
use crate::models::CoreResult;
use crate::pool::{Job, TaskHandle, WorkerPool};
use crate::propagation::wrap_with;

/// Decorates a pool so every unit of work runs under the context of the
/// thread that submitted it.
///
/// Queueing, concurrency limits, rejection and shutdown stay with the inner
/// pool. Each entry point wraps exactly once and forwards to the matching entry
/// point of the inner pool.
#[derive(Clone, Debug)]
pub struct ContextPropagatingPool<P, S = ThreadLocalContextStore> {
    inner: P,
    store: S,
}

impl<P> ContextPropagatingPool<P> {
    pub fn new(inner: P) -> Self {
        Self::with_store(inner, ThreadLocalContextStore)
    }
}

impl<P, S> ContextPropagatingPool<P, S> {
    pub fn with_store(inner: P, store: S) -> Self {
        Self { inner, store }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn into_inner(self) -> P {
        self.inner
    }
}

impl<P, S> WorkerPool for ContextPropagatingPool<P, S>
where
    P: WorkerPool,
    S: ContextStore + Clone + 'static,
{
    fn execute(&self, job: Job) -> CoreResult<()> {
        let task = wrap_with(self.store.clone(), job)?;
        tracing::trace!(entries = task.snapshot().len(), "captured context for execute");
        self.inner.execute(task.into_job())
    }

    fn submit<F, T>(&self, work: F) -> CoreResult<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let task = wrap_with(self.store.clone(), work)?;
        tracing::trace!(entries = task.snapshot().len(), "captured context for submit");
        self.inner.submit(move || task.run_or_escalate())
    }
}
