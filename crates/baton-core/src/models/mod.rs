pub mod context;
pub mod error;

pub use context::ContextSnapshot;
pub use error::{CoreError, CoreErrorKind, CoreResult};
