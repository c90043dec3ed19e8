use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use crate::config::PoolConfig;
use crate::models::{CoreError, CoreErrorKind, CoreResult};
use crate::pool::{Job, WorkerPool, panic_message};
use crate::propagation::TaskDecorator;

/// Receives the worker name and panic message of a fire-and-forget job.
pub type PanicHandler = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Fixed-size pool of named worker threads fed from a shared queue.
///
/// A panicking job is reported to the panic handler and the worker moves on
/// to the next job. `shutdown` stops intake, drains the queue and joins the
/// workers; dropping the pool does the same.
pub struct ThreadPool {
    config: PoolConfig,
    sender: Mutex<Option<JobSender>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    decorator: Option<Arc<dyn TaskDecorator>>,
}

pub struct ThreadPoolBuilder {
    config: PoolConfig,
    decorator: Option<Arc<dyn TaskDecorator>>,
    panic_handler: Option<PanicHandler>,
}

enum JobSender {
    Bounded(SyncSender<Job>),
    Unbounded(Sender<Job>),
}

impl ThreadPool {
    pub fn new(config: PoolConfig) -> CoreResult<Self> {
        Self::builder().config(config).build()
    }

    pub fn builder() -> ThreadPoolBuilder {
        ThreadPoolBuilder {
            config: PoolConfig::default(),
            decorator: None,
            panic_handler: None,
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn is_shutdown(&self) -> bool {
        lock_or_recover(&self.sender).is_none()
    }

    pub fn shutdown(&self) {
        let sender = lock_or_recover(&self.sender).take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        let workers = std::mem::take(&mut *lock_or_recover(&self.workers));
        let current = thread::current().id();
        for worker in workers {
            // A job that shuts down its own pool cannot wait for itself.
            if worker.thread().id() == current {
                continue;
            }
            if worker.join().is_err() {
                tracing::error!("pool worker exited abnormally");
            }
        }
        tracing::debug!(pool = %self.config.thread_name, "pool shut down");
    }
}

impl WorkerPool for ThreadPool {
    fn execute(&self, job: Job) -> CoreResult<()> {
        let job = match &self.decorator {
            Some(decorator) => decorator.decorate(job)?,
            None => job,
        };

        let guard = lock_or_recover(&self.sender);
        let Some(sender) = guard.as_ref() else {
            return Err(CoreError::rejected(format!(
                "pool '{}' is shut down",
                self.config.thread_name
            )));
        };

        match sender {
            JobSender::Bounded(sender) => sender.try_send(job).map_err(|error| match error {
                TrySendError::Full(_) => CoreError::rejected(format!(
                    "pool '{}' queue is full",
                    self.config.thread_name
                )),
                TrySendError::Disconnected(_) => all_workers_gone(&self.config),
            }),
            JobSender::Unbounded(sender) => {
                sender.send(job).map_err(|_| all_workers_gone(&self.config))
            }
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl ThreadPoolBuilder {
    pub fn config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = Some(capacity);
        self
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.thread_name = name.into();
        self
    }

    /// Applies `decorator` to every job entering the pool.
    pub fn task_decorator(mut self, decorator: Arc<dyn TaskDecorator>) -> Self {
        self.decorator = Some(decorator);
        self
    }

    pub fn panic_handler(mut self, handler: impl Fn(&str, &str) + Send + Sync + 'static) -> Self {
        self.panic_handler = Some(Arc::new(handler));
        self
    }

    pub fn build(self) -> CoreResult<ThreadPool> {
        self.config.validate()?;

        let (sender, receiver) = match self.config.queue_capacity {
            Some(capacity) => {
                let (sender, receiver) = mpsc::sync_channel(capacity);
                (JobSender::Bounded(sender), receiver)
            }
            None => {
                let (sender, receiver) = mpsc::channel();
                (JobSender::Unbounded(sender), receiver)
            }
        };

        let receiver = Arc::new(Mutex::new(receiver));
        let panic_handler = self
            .panic_handler
            .unwrap_or_else(|| Arc::new(log_panic) as PanicHandler);

        let mut workers = Vec::with_capacity(self.config.workers);
        for index in 0..self.config.workers {
            let name = format!("{}-{index}", self.config.thread_name);
            let receiver = receiver.clone();
            let panic_handler = panic_handler.clone();
            let worker = thread::Builder::new()
                .name(name.clone())
                .spawn(move || worker_loop(&name, &receiver, &panic_handler))
                .map_err(|error| {
                    CoreError::new(
                        CoreErrorKind::Internal,
                        format!("failed to spawn pool worker: {error}"),
                    )
                })?;
            workers.push(worker);
        }

        Ok(ThreadPool {
            config: self.config,
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            decorator: self.decorator,
        })
    }
}

fn worker_loop(name: &str, receiver: &Mutex<Receiver<Job>>, panic_handler: &PanicHandler) {
    tracing::debug!(worker = name, "pool worker started");
    loop {
        let next = lock_or_recover(receiver).recv();
        let Ok(job) = next else {
            break;
        };

        if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
            panic_handler(name, &panic_message(payload.as_ref()));
        }
    }
    tracing::debug!(worker = name, "pool worker stopped");
}

fn log_panic(worker: &str, message: &str) {
    tracing::error!(worker = worker, panic = %message, "pool job panicked");
}

fn all_workers_gone(config: &PoolConfig) -> CoreError {
    CoreError::rejected(format!(
        "pool '{}' has no running workers",
        config.thread_name
    ))
}

// Jobs never run while these locks are held, so a poisoned lock still guards
// consistent state.
fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
