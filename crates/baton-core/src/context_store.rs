use std::cell::RefCell;
use std::collections::BTreeMap;

use crate::models::{ContextSnapshot, CoreError, CoreResult};

thread_local! {
    static CURRENT_CONTEXT: RefCell<BTreeMap<String, String>> = const { RefCell::new(BTreeMap::new()) };
}

/// Per-thread key/value store consumed by the propagation wrapper.
///
/// Every operation acts on the store of the calling thread only.
pub trait ContextStore: Send + Sync {
    fn get_all(&self) -> CoreResult<ContextSnapshot>;

    /// Overwrites the calling thread's entries with `snapshot`. Entries not in
    /// the snapshot are dropped.
    fn replace_all(&self, snapshot: &ContextSnapshot) -> CoreResult<()>;

    /// Empties the calling thread's entries. Clearing an empty store is a no-op.
    fn clear(&self);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadLocalContextStore;

impl ContextStore for ThreadLocalContextStore {
    fn get_all(&self) -> CoreResult<ContextSnapshot> {
        snapshot()
    }

    fn replace_all(&self, snapshot: &ContextSnapshot) -> CoreResult<()> {
        write(|entries| {
            *entries = snapshot
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect();
        })
    }

    fn clear(&self) {
        clear();
    }
}

pub fn snapshot() -> CoreResult<ContextSnapshot> {
    read(|entries| ContextSnapshot::from(entries.clone()))
}

pub fn get(key: &str) -> CoreResult<Option<String>> {
    read(|entries| entries.get(key).cloned())
}

pub fn is_empty() -> CoreResult<bool> {
    read(BTreeMap::is_empty)
}

pub fn put(key: impl Into<String>, value: impl Into<String>) -> CoreResult<()> {
    let (key, value) = (key.into(), value.into());
    write(|entries| {
        entries.insert(key, value);
    })
}

pub fn remove(key: &str) -> CoreResult<Option<String>> {
    write(|entries| entries.remove(key))
}

pub fn clear() {
    // A store that is already torn down or in use has nothing this call could clear.
    let _ = write(BTreeMap::clear);
}

fn read<R>(operation: impl FnOnce(&BTreeMap<String, String>) -> R) -> CoreResult<R> {
    CURRENT_CONTEXT
        .try_with(|slot| {
            slot.try_borrow()
                .map(|entries| operation(&*entries))
                .map_err(|_| CoreError::context_unavailable("context store is being modified"))
        })
        .map_err(|_| teardown_error())?
}

fn write<R>(operation: impl FnOnce(&mut BTreeMap<String, String>) -> R) -> CoreResult<R> {
    CURRENT_CONTEXT
        .try_with(|slot| {
            slot.try_borrow_mut()
                .map(|mut entries| operation(&mut *entries))
                .map_err(|_| CoreError::context_unavailable("context store is already borrowed"))
        })
        .map_err(|_| teardown_error())?
}

fn teardown_error() -> CoreError {
    CoreError::context_unavailable("context store accessed after thread teardown")
}
