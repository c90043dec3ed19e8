use std::fmt;

use tracing::{Event, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::{Format, Writer};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

use crate::context_store;
use crate::models::{CoreError, CoreResult};

/// Event formatter that prefixes every line with the emitting thread's
/// context, e.g. `{traceNumber=4f1c...} INFO ...`.
///
/// Lines from a thread with an empty context are left untouched.
#[derive(Clone, Debug, Default)]
pub struct ContextFormat<F = Format> {
    inner: F,
}

impl<F> ContextFormat<F> {
    pub fn new(inner: F) -> Self {
        Self { inner }
    }
}

impl<S, N, F> FormatEvent<S, N> for ContextFormat<F>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
    F: FormatEvent<S, N>,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        if let Ok(snapshot) = context_store::snapshot()
            && !snapshot.is_empty()
        {
            write!(writer, "{{{snapshot}}} ")?;
        }
        self.inner.format_event(ctx, writer, event)
    }
}

/// Installs the global subscriber. `RUST_LOG` wins over `default_directive`.
///
/// Calling this again after a subscriber is installed is a no-op.
pub fn init(default_directive: &str) -> CoreResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .map_err(|error| {
            CoreError::invalid_input(format!(
                "invalid log filter '{default_directive}': {error}"
            ))
        })?;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .event_format(ContextFormat::new(Format::default().with_thread_names(true)))
        .try_init();

    Ok(())
}
