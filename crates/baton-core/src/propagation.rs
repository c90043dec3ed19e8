use std::sync::Arc;

use crate::context_store::{ContextStore, ThreadLocalContextStore};
use crate::models::{ContextSnapshot, CoreResult};
use crate::pool::Job;

/// Work bound to the context snapshot of the thread that wrapped it.
///
/// Running it installs the snapshot on the current thread, runs the work, and
/// clears the thread's context on every exit path, including a panic
/// unwinding through the work.
pub struct PropagatedTask<W, S = ThreadLocalContextStore> {
    snapshot: ContextSnapshot,
    store: S,
    work: W,
}

/// Captures the calling thread's context and binds it to `work`.
///
/// Capture happens now, on the calling thread, never when the task runs.
pub fn wrap<W>(work: W) -> CoreResult<PropagatedTask<W>> {
    wrap_with(ThreadLocalContextStore, work)
}

pub fn wrap_with<W, S>(store: S, work: W) -> CoreResult<PropagatedTask<W, S>>
where
    S: ContextStore,
{
    let snapshot = store.get_all()?;
    Ok(PropagatedTask {
        snapshot,
        store,
        work,
    })
}

impl<W, S> PropagatedTask<W, S>
where
    S: ContextStore,
{
    pub fn snapshot(&self) -> &ContextSnapshot {
        &self.snapshot
    }

    /// Runs the work with the captured context installed.
    ///
    /// Returns `Err` only when the snapshot cannot be installed; the work is
    /// not run in that case. Whatever the work returns is passed back as is.
    pub fn run<R>(self) -> CoreResult<R>
    where
        W: FnOnce() -> R,
    {
        let scope = ContextScope::enter(&self.store, &self.snapshot)?;
        let output = (self.work)();
        drop(scope);
        Ok(output)
    }
}

impl<W, S> PropagatedTask<W, S>
where
    S: ContextStore,
{
    /// Like [`PropagatedTask::run`], but panics when the snapshot cannot be
    /// installed, so that a pool surfaces the failure through its panic
    /// channel instead of running the work without context.
    pub fn run_or_escalate<R>(self) -> R
    where
        W: FnOnce() -> R,
    {
        match self.run() {
            Ok(output) => output,
            Err(error) => panic!("context propagation failed: {error}"),
        }
    }
}

impl<W, S> PropagatedTask<W, S>
where
    W: FnOnce() + Send + 'static,
    S: ContextStore + 'static,
{
    pub fn into_job(self) -> Job {
        Box::new(move || self.run_or_escalate())
    }
}

/// Installs a snapshot on creation and clears the store on drop.
pub struct ContextScope<'a, S: ContextStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: ContextStore + ?Sized> ContextScope<'a, S> {
    pub fn enter(store: &'a S, snapshot: &ContextSnapshot) -> CoreResult<Self> {
        if let Err(error) = store.replace_all(snapshot) {
            // Never leave a half-installed context behind.
            store.clear();
            return Err(error);
        }
        Ok(Self { store })
    }
}

impl<S: ContextStore + ?Sized> Drop for ContextScope<'_, S> {
    fn drop(&mut self) {
        self.store.clear();
    }
}

/// Hook a pool applies to every job before it is queued.
///
/// An error rejects the job on the submitting thread.
pub trait TaskDecorator: Send + Sync {
    fn decorate(&self, work: Job) -> CoreResult<Job>;
}

/// Decorator that binds each job to the submitting thread's context.
#[derive(Clone, Debug, Default)]
pub struct PropagateContext<S = ThreadLocalContextStore> {
    store: S,
}

impl PropagateContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<dyn TaskDecorator> {
        Arc::new(Self::new())
    }
}

impl<S> PropagateContext<S>
where
    S: ContextStore + Clone + 'static,
{
    pub fn with_store(store: S) -> Self {
        Self { store }
    }
}

impl<S> TaskDecorator for PropagateContext<S>
where
    S: ContextStore + Clone + 'static,
{
    fn decorate(&self, work: Job) -> CoreResult<Job> {
        Ok(wrap_with(self.store.clone(), work)?.into_job())
    }
}
