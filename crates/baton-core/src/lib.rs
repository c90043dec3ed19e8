pub mod config;
pub mod context_store;
pub mod logging;
pub mod models;
pub mod pool;
pub mod propagation;

pub use context_store::{ContextStore, ThreadLocalContextStore};
pub use models::{ContextSnapshot, CoreError, CoreErrorKind, CoreResult};
pub use pool::{ContextPropagatingPool, TaskHandle, WorkerPool};
pub use propagation::{PropagatedTask, wrap};
