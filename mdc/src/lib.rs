//! A mapped diagnostic context (MDC): a per-thread key/value map for carrying
//! request and trace identifiers through processing so they can be attached
//! to log output.
//!
//! Reads never copy the map. Writes copy it only at the start of a run of
//! consecutive writes, which guarantees a [`Snapshot`] handed out earlier is
//! never changed underneath its holder. Context does not follow work onto
//! other threads by itself; see the [`propagation`] module for the handoff.
//! Enable the `tokio` feature for `propagation::spawn_blocking`.
//!
//! ```
//! mdc::put("traceId", "abc123");
//!
//! let worker = mdc::propagation::spawn(|| mdc::get("traceId"));
//! assert_eq!(worker.join().unwrap().as_deref(), Some("abc123"));
//! ```

mod error;
mod map;
pub mod propagation;
pub mod registry;
mod store;

pub use error::{MdcError, Result};
pub use map::{Iter, Snapshot};
pub use registry::MdcAdapter;
pub use store::{ContextStore, ScopedEntry};

pub fn get(key: &str) -> Option<String> {
    registry::store().get(key)
}

pub fn get_entry(key: &str) -> Option<Option<String>> {
    registry::store().get_entry(key)
}

pub fn put<'v>(key: &str, value: impl Into<Option<&'v str>>) {
    registry::store().put(key, value)
}

pub fn try_put<'v>(key: Option<&str>, value: impl Into<Option<&'v str>>) -> Result<()> {
    registry::store().try_put(key, value)
}

pub fn put_scoped<'v>(key: &str, value: impl Into<Option<&'v str>>) -> ScopedEntry {
    registry::store().put_scoped(key, value)
}

pub fn remove(key: &str) {
    registry::store().remove(key)
}

pub fn clear() {
    registry::store().clear()
}

pub fn snapshot() -> Option<Snapshot> {
    registry::store().snapshot()
}

pub fn restore(snapshot: &Snapshot) {
    registry::store().restore(snapshot)
}

pub fn try_restore(snapshot: Option<&Snapshot>) -> Result<()> {
    registry::store().try_restore(snapshot)
}

pub fn for_each(f: impl FnMut(&str, Option<&str>)) {
    registry::store().for_each(f)
}
