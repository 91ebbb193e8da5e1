use std::collections::{btree_map::IntoIter, BTreeMap};

use bytes::Bytes;

use super::EntryState;

/// Pending writes of a single column, `None` marks a deletion
#[derive(Clone, Debug, Default)]
pub struct Changes {
    pub writes: BTreeMap<Bytes, Option<Bytes>>,
}

impl Changes {
    // Set a key to a new value, returns the previous state
    pub fn insert<K, V>(&mut self, key: K, value: V) -> EntryState<Bytes>
    where
        K: Into<Bytes>,
        V: Into<Bytes>,
    {
        EntryState::from_write(self.writes.insert(key.into(), Some(value.into())))
    }

    // Mark a key as deleted, returns the previous state
    pub fn remove<K>(&mut self, key: K) -> EntryState<Bytes>
    where
        K: Into<Bytes>,
    {
        EntryState::from_write(self.writes.insert(key.into(), None))
    }

    // None if the key was never written in this batch
    pub fn contains<K>(&self, key: K) -> Option<bool>
    where
        K: AsRef<[u8]>,
    {
        self.writes.get(key.as_ref()).map(|v| v.is_some())
    }

    // Writes whose key starts with the prefix
    pub fn with_prefix<'a>(
        &'a self,
        prefix: &'a [u8],
    ) -> impl Iterator<Item = (&'a Bytes, &'a Option<Bytes>)> + 'a {
        self.writes
            .range(Bytes::copy_from_slice(prefix)..)
            .take_while(move |(k, _)| k.starts_with(prefix))
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

impl IntoIterator for Changes {
    type Item = (Bytes, Option<Bytes>);
    type IntoIter = IntoIter<Bytes, Option<Bytes>>;

    fn into_iter(self) -> Self::IntoIter {
        self.writes.into_iter()
    }
}
