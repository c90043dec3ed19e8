use std::process::ExitCode;
use std::time::Duration;

use baton_core::config::PoolConfig;
use baton_core::context_store;
use baton_core::logging;
use baton_core::models::{CoreError, CoreErrorKind, CoreResult};
use baton_core::pool::{ContextPropagatingPool, ThreadPool, TokioBlockingPool, WorkerPool};
use baton_core::propagation::PropagateContext;
use uuid::Uuid;

const TRACE_NUMBER: &str = "traceNumber";
const CONFIG_ENV: &str = "BATON_POOL_CONFIG";

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("baton: {error}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CoreResult<()> {
    logging::init("info")?;

    let config = match std::env::var_os(CONFIG_ENV) {
        Some(path) => PoolConfig::load(path)?,
        None => PoolConfig::default(),
    };
    tracing::debug!(?config, "loaded pool configuration");

    let trace_number = Uuid::new_v4().to_string();
    tracing::info!("traceNumber: {trace_number}");
    context_store::put(TRACE_NUMBER, trace_number)?;

    // Decorator installed on the pool itself.
    let hooked = ThreadPool::builder()
        .config(config.clone())
        .thread_name(format!("{}-hooked", config.thread_name))
        .task_decorator(PropagateContext::shared())
        .build()?;
    greet(&hooked, "ThreadPool")?;
    hooked.shutdown();

    // Decorator wrapped around an undecorated pool.
    let decorated = ContextPropagatingPool::new(
        ThreadPool::builder()
            .config(config.clone())
            .thread_name(format!("{}-wrapped", config.thread_name))
            .build()?,
    );
    greet(&decorated, "ContextPropagatingPool<ThreadPool>")?;
    decorated.inner().shutdown();

    // Same decorator over a foreign pool.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .max_blocking_threads(config.workers)
        .thread_name(format!("{}-tokio", config.thread_name))
        .build()
        .map_err(|error| {
            CoreError::new(
                CoreErrorKind::Internal,
                format!("failed to build tokio runtime: {error}"),
            )
        })?;
    let blocking = ContextPropagatingPool::new(TokioBlockingPool::new(runtime.handle().clone()));
    greet(&blocking, "ContextPropagatingPool<TokioBlockingPool>")?;
    runtime.shutdown_timeout(Duration::from_secs(5));

    context_store::clear();
    Ok(())
}

fn greet<P: WorkerPool>(pool: &P, label: &'static str) -> CoreResult<()> {
    let handle = pool.submit(move || tracing::info!("hello {label}::submit()"))?;
    pool.execute(Box::new(move || {
        tracing::info!("hello {label}::execute()");
    }))?;

    handle
        .join()
        .map_err(|error| CoreError::new(CoreErrorKind::Internal, error.to_string()))
}
