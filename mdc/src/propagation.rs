//! Handing context to worker threads
//!
//! Threads do not inherit context on their own. Whatever schedules work onto
//! another thread has to capture the current context when the work is
//! submitted and install it on the worker before the work runs. The helpers
//! here do exactly that; executors and pools should wrap submitted work with
//! [`inherit`].

use std::io;
use std::thread::{self, Builder, JoinHandle};

use tracing::trace;

use crate::map::Snapshot;
use crate::store::ContextStore;

/// Captures the calling thread's context and returns a closure that runs `f`
/// with that context installed.
///
/// The worker's own context is put back once `f` returns or unwinds, so a
/// pooled thread does not carry one task's context into the next. If the
/// calling thread had no context, `f` runs with none.
pub fn inherit<F, R>(f: F) -> impl FnOnce() -> R
where
    F: FnOnce() -> R,
{
    let store = ContextStore::new();
    let inherited = store.snapshot();

    move || {
        let _reinstate = Reinstate {
            store,
            previous: store.snapshot(),
        };

        match &inherited {
            Some(snapshot) => store.restore(snapshot),
            None => store.clear(),
        }

        trace!(
            thread = thread_id::get(),
            entries = inherited.as_ref().map(Snapshot::len),
            "inherited diagnostic context"
        );

        f()
    }
}

struct Reinstate {
    store: ContextStore,
    previous: Option<Snapshot>,
}

impl Drop for Reinstate {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(previous) => self.store.restore(&previous),
            None => self.store.clear(),
        }
    }
}

/// Spawns a thread that starts with a copy of the caller's context.
pub fn spawn<F, T>(f: F) -> JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    thread::spawn(inherit(f))
}

/// Like [`spawn`], using a configured thread builder.
pub fn spawn_with<F, T>(builder: Builder, f: F) -> io::Result<JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    builder.spawn(inherit(f))
}

/// Runs blocking work on tokio's blocking pool with a copy of the caller's
/// context.
#[cfg(feature = "tokio")]
pub fn spawn_blocking<F, T>(f: F) -> tokio::task::JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(inherit(f))
}
