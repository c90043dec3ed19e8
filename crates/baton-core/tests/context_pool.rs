use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use baton_core::config::PoolConfig;
use baton_core::context_store::{self, ContextStore, ThreadLocalContextStore};
use baton_core::models::{ContextSnapshot, CoreErrorKind, CoreResult};
use baton_core::pool::{ContextPropagatingPool, TaskError, ThreadPool, WorkerPool, job};

#[derive(Clone, Default)]
struct CountingStore {
    captures: Arc<AtomicUsize>,
    installs: Arc<AtomicUsize>,
}

impl ContextStore for CountingStore {
    fn get_all(&self) -> CoreResult<ContextSnapshot> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        ThreadLocalContextStore.get_all()
    }

    fn replace_all(&self, snapshot: &ContextSnapshot) -> CoreResult<()> {
        self.installs.fetch_add(1, Ordering::SeqCst);
        ThreadLocalContextStore.replace_all(snapshot)
    }

    fn clear(&self) {
        ThreadLocalContextStore.clear();
    }
}

fn single_worker_pool() -> ContextPropagatingPool<ThreadPool> {
    ContextPropagatingPool::new(ThreadPool::new(PoolConfig::single_worker()).unwrap())
}

fn observe() -> (ContextSnapshot, thread::ThreadId) {
    (context_store::snapshot().unwrap(), thread::current().id())
}

#[test]
fn worker_observes_submitted_context() {
    let pool = ContextPropagatingPool::new(ThreadPool::new(PoolConfig::default()).unwrap());
    context_store::put("trace", "A").unwrap();
    context_store::put("user", "42").unwrap();

    let (observed, _) = pool.submit(observe).unwrap().join().unwrap();

    assert_eq!(
        observed,
        ContextSnapshot::new().with("trace", "A").with("user", "42")
    );
    context_store::clear();
}

#[test]
fn reused_worker_never_sees_previous_task_context() {
    let pool = single_worker_pool();

    context_store::put("trace", "A").unwrap();
    let first = pool
        .submit(|| {
            let seen = observe();
            // Leave junk behind on purpose.
            context_store::put("leaked", "yes").unwrap();
            seen
        })
        .unwrap();

    context_store::put("trace", "B").unwrap();
    let second = pool.submit(observe).unwrap();

    context_store::put("trace", "C").unwrap();
    // Bypasses the decorator, so it sees whatever the second task left behind.
    let third = pool.inner().submit(observe).unwrap();
    context_store::clear();

    let (first_seen, first_thread) = first.join().unwrap();
    let (second_seen, second_thread) = second.join().unwrap();
    let (third_seen, third_thread) = third.join().unwrap();

    assert_eq!(first_thread, second_thread);
    assert_eq!(second_thread, third_thread);
    assert_eq!(first_seen, ContextSnapshot::new().with("trace", "A"));
    assert_eq!(second_seen, ContextSnapshot::new().with("trace", "B"));
    assert!(third_seen.is_empty());
}

#[test]
fn reverse_submission_order_is_isolated_too() {
    let pool = single_worker_pool();

    context_store::put("trace", "B").unwrap();
    let first = pool.submit(observe).unwrap();
    context_store::put("trace", "A").unwrap();
    let second = pool.submit(observe).unwrap();
    context_store::clear();

    assert_eq!(first.join().unwrap().0.get("trace"), Some("B"));
    assert_eq!(second.join().unwrap().0.get("trace"), Some("A"));
}

#[test]
fn submit_returns_exactly_what_work_returned() {
    let pool = single_worker_pool();
    context_store::put("trace", "A").unwrap();

    let value = pool.submit(|| vec![1_u8, 2, 3]).unwrap().join().unwrap();
    let failed = pool
        .submit(|| -> Result<u32, String> { Err("not found".to_string()) })
        .unwrap()
        .join()
        .unwrap();

    assert_eq!(value, vec![1, 2, 3]);
    assert_eq!(failed, Err("not found".to_string()));
    context_store::clear();
}

#[test]
fn submit_panic_reaches_handle_and_worker_is_cleared() {
    let pool = single_worker_pool();
    context_store::put("trace", "A").unwrap();

    let outcome = pool.submit(|| -> u32 { panic!("F") }).unwrap();
    let after = pool
        .inner()
        .submit(|| context_store::snapshot().unwrap())
        .unwrap();
    context_store::clear();

    assert_eq!(outcome.join(), Err(TaskError::Panicked("F".to_string())));
    assert!(after.join().unwrap().is_empty());
}

#[test]
fn submit_clears_worker_after_normal_completion() {
    let pool = single_worker_pool();
    context_store::put("trace", "A").unwrap();

    let value = pool.submit(|| 7_u32).unwrap();
    let after = pool
        .inner()
        .submit(|| context_store::snapshot().unwrap())
        .unwrap();
    context_store::clear();

    assert_eq!(value.join().unwrap(), 7);
    assert!(after.join().unwrap().is_empty());
}

#[derive(Clone)]
struct NoClearStore;

impl ContextStore for NoClearStore {
    fn get_all(&self) -> CoreResult<ContextSnapshot> {
        ThreadLocalContextStore.get_all()
    }

    fn replace_all(&self, snapshot: &ContextSnapshot) -> CoreResult<()> {
        ThreadLocalContextStore.replace_all(snapshot)
    }

    fn clear(&self) {}
}

#[test]
fn undecorated_follow_up_detects_a_store_that_never_clears() {
    let pool = ContextPropagatingPool::with_store(
        ThreadPool::new(PoolConfig::single_worker()).unwrap(),
        NoClearStore,
    );
    context_store::put("trace", "A").unwrap();

    let _ = pool.submit(|| -> u32 { panic!("F") }).unwrap().join();
    let leaked = pool
        .inner()
        .submit(|| context_store::snapshot().unwrap())
        .unwrap()
        .join()
        .unwrap();
    context_store::clear();

    assert_eq!(leaked, ContextSnapshot::new().with("trace", "A"));
}

#[test]
fn execute_panic_reaches_panic_handler_after_cleanup() {
    let (sender, receiver) = mpsc::channel();
    let sender = Mutex::new(sender);
    let inner = ThreadPool::builder()
        .workers(1)
        .panic_handler(move |_worker, message| {
            let empty = context_store::is_empty().unwrap();
            let _ = sender.lock().unwrap().send((message.to_string(), empty));
        })
        .build()
        .unwrap();
    let pool = ContextPropagatingPool::new(inner);

    context_store::put("trace", "A").unwrap();
    pool.execute(job(|| panic!("F"))).unwrap();
    context_store::clear();

    let (message, empty) = receiver.recv().unwrap();
    assert_eq!(message, "F");
    assert!(empty);
}

#[test]
fn execute_observes_submitted_context() {
    let pool = single_worker_pool();
    let (sender, receiver) = mpsc::channel();

    context_store::put("trace", "A").unwrap();
    pool.execute(Box::new(move || {
        let _ = sender.send(context_store::snapshot().unwrap());
    }))
    .unwrap();
    context_store::clear();

    assert_eq!(
        receiver.recv().unwrap(),
        ContextSnapshot::new().with("trace", "A")
    );
}

#[test]
fn each_entry_point_wraps_exactly_once() {
    let store = CountingStore::default();
    let pool = ContextPropagatingPool::with_store(
        ThreadPool::new(PoolConfig::single_worker()).unwrap(),
        store.clone(),
    );

    pool.submit(|| ()).unwrap().join().unwrap();
    assert_eq!(store.captures.load(Ordering::SeqCst), 1);
    assert_eq!(store.installs.load(Ordering::SeqCst), 1);

    let (sender, receiver) = mpsc::channel();
    pool.execute(Box::new(move || {
        let _ = sender.send(());
    }))
    .unwrap();
    receiver.recv().unwrap();
    assert_eq!(store.captures.load(Ordering::SeqCst), 2);
    assert_eq!(store.installs.load(Ordering::SeqCst), 2);
}

#[test]
fn rejection_from_inner_pool_is_forwarded() {
    let pool = ContextPropagatingPool::new(
        ThreadPool::builder()
            .workers(1)
            .queue_capacity(1)
            .build()
            .unwrap(),
    );

    // Park the only worker so the queue can fill up.
    let gate = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));
    pool.execute(Box::new({
        let gate = gate.clone();
        let release = release.clone();
        move || {
            gate.wait();
            release.wait();
        }
    }))
    .unwrap();
    gate.wait();

    pool.execute(Box::new(|| ())).unwrap();
    let error = pool.execute(Box::new(|| ())).unwrap_err();
    assert_eq!(error.kind, CoreErrorKind::Rejected);

    release.wait();
    pool.inner().shutdown();
    let error = pool.submit(|| ()).err().unwrap();
    assert_eq!(error.kind, CoreErrorKind::Rejected);
    assert!(pool.into_inner().is_shutdown());
}

#[test]
fn parallel_submitters_keep_their_own_context() {
    let pool = Arc::new(ContextPropagatingPool::new(
        ThreadPool::builder().workers(4).build().unwrap(),
    ));

    let submitters: Vec<_> = (0..8)
        .map(|index| {
            let pool = pool.clone();
            thread::spawn(move || {
                let trace = format!("trace-{index}");
                context_store::put("trace", trace.clone()).unwrap();
                let handles: Vec<_> = (0..25)
                    .map(|_| pool.submit(|| context_store::get("trace").unwrap()).unwrap())
                    .collect();
                handles
                    .into_iter()
                    .all(|handle| handle.join().unwrap().as_deref() == Some(trace.as_str()))
            })
        })
        .collect();

    for submitter in submitters {
        assert!(submitter.join().unwrap());
    }
}
