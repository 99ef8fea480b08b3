//! Process-wide access to the context store
//!
//! There is nothing to initialize or tear down: the store's state lives in a
//! module-scoped thread-local for the lifetime of each thread, and the handles
//! given out here are stateless. Collaborators that prefer not to depend on a
//! concrete type can take a `&dyn MdcAdapter`.

use crate::map::Snapshot;
use crate::store::ContextStore;

/// The operations a collaborator (request filter, client interceptor, log
/// formatter) needs from a diagnostic context implementation.
pub trait MdcAdapter: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn put(&self, key: &str, value: Option<&str>);
    fn remove(&self, key: &str);
    fn clear(&self);
    fn snapshot(&self) -> Option<Snapshot>;
    fn restore(&self, snapshot: &Snapshot);
}

impl MdcAdapter for ContextStore {
    fn get(&self, key: &str) -> Option<String> {
        ContextStore::get(self, key)
    }

    fn put(&self, key: &str, value: Option<&str>) {
        ContextStore::put(self, key, value)
    }

    fn remove(&self, key: &str) {
        ContextStore::remove(self, key)
    }

    fn clear(&self) {
        ContextStore::clear(self)
    }

    fn snapshot(&self) -> Option<Snapshot> {
        ContextStore::snapshot(self)
    }

    fn restore(&self, snapshot: &Snapshot) {
        ContextStore::restore(self, snapshot)
    }
}

static STORE: ContextStore = ContextStore::new();

/// The store behind the crate-level functions.
pub fn store() -> ContextStore {
    STORE
}

pub fn adapter() -> &'static dyn MdcAdapter {
    &STORE
}
