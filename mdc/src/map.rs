//! Context maps and snapshots
//!
//! A thread's context map is kept behind an `Arc` so that a `Snapshot` can be
//! handed out without copying any entries. The owning thread never mutates a
//! map that a snapshot may still reference; it copies before the first write
//! instead (see the `store` module).

use std::collections::hash_map::{self, HashMap};
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The concrete mapping. A `None` value is an explicitly stored null, which is
/// distinct from the key being absent.
pub(crate) type Entries = HashMap<String, Option<String>>;

/// An immutable point-in-time view of a thread's diagnostic context.
///
/// Later writes on the originating thread are never observable through a
/// snapshot, and a snapshot cannot be used to change the live context. Use
/// [`Snapshot::to_map`] to get an owned map that can be edited freely.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: Arc<Entries>,
}

impl Snapshot {
    /// An empty snapshot. Restoring it yields a present but empty context.
    pub fn new() -> Snapshot {
        Snapshot::default()
    }

    pub(crate) fn from_shared(entries: Arc<Entries>) -> Snapshot {
        Snapshot { entries }
    }

    pub(crate) fn entries(&self) -> &Entries {
        &self.entries
    }

    /// Gets the value for `key`, treating an explicit null the same as an
    /// absent key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(|value| value.as_deref())
    }

    /// Gets the entry for `key`. `Some(None)` means the key was stored with a
    /// null value.
    pub fn get_entry(&self, key: &str) -> Option<Option<&str>> {
        self.entries.get(key).map(|value| value.as_deref())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.entries.iter(),
        }
    }

    /// Returns an independently owned copy of the entries.
    pub fn to_map(&self) -> HashMap<String, Option<String>> {
        (*self.entries).clone()
    }
}

impl Debug for Snapshot {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl From<HashMap<String, Option<String>>> for Snapshot {
    fn from(entries: HashMap<String, Option<String>>) -> Snapshot {
        Snapshot {
            entries: Arc::new(entries),
        }
    }
}

impl From<Snapshot> for HashMap<String, Option<String>> {
    fn from(snapshot: Snapshot) -> HashMap<String, Option<String>> {
        Arc::try_unwrap(snapshot.entries).unwrap_or_else(|shared| (*shared).clone())
    }
}

impl<K, V> FromIterator<(K, V)> for Snapshot
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Snapshot {
        let entries = iter
            .into_iter()
            .map(|(key, value)| (key.into(), Some(value.into())))
            .collect::<Entries>();

        Snapshot::from(entries)
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = (&'a str, Option<&'a str>);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Snapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Snapshot, D::Error> {
        Entries::deserialize(deserializer).map(Snapshot::from)
    }
}

pub struct Iter<'a> {
    inner: hash_map::Iter<'a, String, Option<String>>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, Option<&'a str>);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|(key, value)| (key.as_str(), value.as_deref()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Iter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_value_is_distinct_from_absent() {
        let mut entries = HashMap::new();
        entries.insert("present".to_owned(), Some("1".to_owned()));
        entries.insert("null".to_owned(), None);

        let snapshot = Snapshot::from(entries);

        assert_eq!(snapshot.get("present"), Some("1"));
        assert_eq!(snapshot.get("null"), None);
        assert_eq!(snapshot.get_entry("null"), Some(None));
        assert_eq!(snapshot.get_entry("missing"), None);
        assert!(snapshot.contains_key("null"));
        assert!(!snapshot.contains_key("missing"));
    }

    #[test]
    fn owned_map_is_detached() {
        let snapshot: Snapshot = [("a", "1")].into_iter().collect();

        let mut map = snapshot.to_map();
        map.insert("a".to_owned(), Some("2".to_owned()));
        map.insert("b".to_owned(), None);

        assert_eq!(snapshot.get("a"), Some("1"));
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn serializes_as_plain_map() {
        let snapshot: Snapshot = [("traceId", "abc123")].into_iter().collect();

        let json = serde_json::to_string(&snapshot).unwrap();
        assert_eq!(json, r#"{"traceId":"abc123"}"#);

        let parsed: Snapshot = serde_json::from_str(r#"{"traceId":"abc123","parent":null}"#).unwrap();
        assert_eq!(parsed.get("traceId"), Some("abc123"));
        assert_eq!(parsed.get_entry("parent"), Some(None));
    }
}
