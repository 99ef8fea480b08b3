//! The per-thread context store
//!
//! Each thread owns one slot holding an optional shared map and a marker for
//! whether its last context operation was a read or a write. A write that
//! follows a read (or comes first) copies the map before mutating it, since a
//! read may have handed a snapshot of that very map to someone else. Writes
//! that follow a write mutate in place, so a run of consecutive writes costs a
//! single copy at its start.

use std::cell::RefCell;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::trace;

use crate::error::{MdcError, Result};
use crate::map::{Entries, Snapshot};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Operation {
    Unset,
    Read,
    Write,
}

struct Slot {
    map: Option<Arc<Entries>>,
    last_op: Operation,
}

impl Slot {
    const fn new() -> Slot {
        Slot {
            map: None,
            last_op: Operation::Unset,
        }
    }

    fn mark(&mut self, op: Operation) -> Operation {
        std::mem::replace(&mut self.last_op, op)
    }

    /// Returns a map this thread may mutate and, if a defensive copy was
    /// needed to get it, how many entries were copied.
    fn writable(&mut self) -> (&mut Entries, Option<usize>) {
        let last_op = self.mark(Operation::Write);

        let copied = if last_op != Operation::Write || self.map.is_none() {
            let copy = self.map.as_deref().cloned().unwrap_or_default();
            let len = copy.len();

            record_copy();
            self.map = Some(Arc::new(copy));

            Some(len)
        } else {
            None
        };

        let map = self.map.get_or_insert_with(Default::default);

        // a write always leaves the map unshared, so this does not clone
        (Arc::make_mut(map), copied)
    }
}

thread_local! {
    static SLOT: RefCell<Slot> = const { RefCell::new(Slot::new()) };
}

// Returns `None` if the thread-local has already been destroyed, which can
// happen when logging from another thread-local's destructor.
fn with_slot<R>(f: impl FnOnce(&mut Slot) -> R) -> Option<R> {
    SLOT.try_with(|slot| f(&mut slot.borrow_mut())).ok()
}

#[cfg(test)]
thread_local! {
    static COPIES: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
}

fn record_copy() {
    #[cfg(test)]
    COPIES.with(|copies| copies.set(copies.get() + 1));
}

/// The number of defensive copies made on this thread so far.
#[cfg(test)]
pub(crate) fn copies() -> usize {
    COPIES.with(|copies| copies.get())
}

#[cfg(test)]
pub(crate) fn last_operation() -> Operation {
    SLOT.with(|slot| slot.borrow().last_op)
}

fn log_copy(entries: usize) {
    trace!(
        thread = thread_id::get(),
        entries,
        "copied diagnostic context before write"
    );
}

/// A handle onto the calling thread's diagnostic context.
///
/// The handle holds no state itself; every operation acts on the slot of the
/// thread it is called from. It can be freely copied and passed to whatever
/// needs context access.
#[derive(Debug, Default, Copy, Clone)]
pub struct ContextStore {
    _private: (),
}

impl ContextStore {
    pub const fn new() -> ContextStore {
        ContextStore { _private: () }
    }

    /// Gets the value for `key`. Absent keys, explicit nulls, and a thread
    /// with no context all yield `None`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.get_entry(key).flatten()
    }

    /// Gets the entry for `key`, where `Some(None)` means the key is present
    /// with a null value.
    pub fn get_entry(&self, key: &str) -> Option<Option<String>> {
        with_slot(|slot| {
            slot.mark(Operation::Read);
            slot.map.as_ref()?.get(key).cloned()
        })
        .flatten()
    }

    /// Inserts or overwrites `key`. The value may be null.
    pub fn put<'v>(&self, key: &str, value: impl Into<Option<&'v str>>) {
        let value = value.into().map(str::to_owned);

        let copied = with_slot(|slot| {
            let (map, copied) = slot.writable();
            map.insert(key.to_owned(), value);
            copied
        })
        .flatten();

        if let Some(entries) = copied {
            log_copy(entries);
        }
    }

    /// Same as [`put`](Self::put) for keys from an untrusted source, where a
    /// missing key is a caller error.
    pub fn try_put<'v>(&self, key: Option<&str>, value: impl Into<Option<&'v str>>) -> Result<()> {
        let key = key.ok_or(MdcError::InvalidArgument("key cannot be null"))?;
        self.put(key, value);
        Ok(())
    }

    /// Removes `key`. Does nothing if this thread has no context.
    pub fn remove(&self, key: &str) {
        let copied = with_slot(|slot| {
            slot.map.as_ref()?;

            let (map, copied) = slot.writable();
            map.remove(key);
            copied
        })
        .flatten();

        if let Some(entries) = copied {
            log_copy(entries);
        }
    }

    /// Discards this thread's context entirely.
    pub fn clear(&self) {
        with_slot(|slot| {
            slot.mark(Operation::Write);
            slot.map = None;
        });
    }

    /// Returns a view of this thread's context as it is now, or `None` if the
    /// thread has none (as opposed to an empty one).
    pub fn snapshot(&self) -> Option<Snapshot> {
        with_slot(|slot| {
            slot.mark(Operation::Read);
            slot.map.clone().map(Snapshot::from_shared)
        })
        .flatten()
    }

    /// Replaces this thread's context with a copy of `snapshot`.
    ///
    /// An empty snapshot leaves the thread with an empty context, which is not
    /// the same as calling [`clear`](Self::clear).
    pub fn restore(&self, snapshot: &Snapshot) {
        self.install(snapshot.entries().clone());
    }

    pub fn restore_map(&self, map: &HashMap<String, Option<String>>) {
        self.install(map.clone());
    }

    /// Same as [`restore`](Self::restore) for a context from an untrusted
    /// source. A missing context is a caller error; use
    /// [`clear`](Self::clear) to discard the context instead.
    pub fn try_restore(&self, snapshot: Option<&Snapshot>) -> Result<()> {
        let snapshot = snapshot.ok_or(MdcError::InvalidArgument("context map cannot be null"))?;
        self.restore(snapshot);
        Ok(())
    }

    /// Visits every entry of this thread's context.
    ///
    /// This is meant for log formatters. It does not count as a read for
    /// copy-on-write purposes since nothing is retained past the call.
    pub fn for_each(&self, mut f: impl FnMut(&str, Option<&str>)) {
        let map = with_slot(|slot| slot.map.clone()).flatten();

        if let Some(map) = map {
            for (key, value) in map.iter() {
                f(key, value.as_deref());
            }
        }
    }

    /// Puts `key` and returns a guard that removes it when dropped.
    pub fn put_scoped<'v>(&self, key: &str, value: impl Into<Option<&'v str>>) -> ScopedEntry {
        self.put(key, value);

        ScopedEntry {
            store: *self,
            key: key.to_owned(),
            _thread_bound: PhantomData,
        }
    }

    fn install(&self, entries: Entries) {
        let len = entries.len();

        with_slot(move |slot| {
            slot.mark(Operation::Write);
            slot.map = Some(Arc::new(entries));
        });

        trace!(
            thread = thread_id::get(),
            entries = len,
            "restored diagnostic context"
        );
    }
}

/// Removes its key from the thread's context when dropped.
///
/// The guard belongs to the thread that created it and cannot be sent to
/// another one:
///
/// ```compile_fail
/// let guard = mdc::put_scoped("request", "r-1");
/// std::thread::spawn(move || drop(guard));
/// ```
#[must_use = "the entry is removed as soon as the guard is dropped"]
pub struct ScopedEntry {
    store: ContextStore,
    key: String,
    // keeps the guard `!Send` since it must drop on the creating thread
    _thread_bound: PhantomData<*const ()>,
}

impl Drop for ScopedEntry {
    fn drop(&mut self) {
        self.store.remove(&self.key);
    }
}
