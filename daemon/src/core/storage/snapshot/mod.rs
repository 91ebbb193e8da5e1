mod changes;

use std::{collections::HashMap, hash::Hash};

use bytes::Bytes;

pub use changes::Changes;

/// Direction for iteration
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

impl From<Direction> for rocksdb::Direction {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Forward => rocksdb::Direction::Forward,
            Direction::Reverse => rocksdb::Direction::Reverse,
        }
    }
}

/// State of a key inside a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryState<T> {
    /// Written in this snapshot
    Stored(T),
    /// Deleted in this snapshot
    Deleted,
    /// Untouched, the disk value applies
    Absent,
}

impl<T> EntryState<T> {
    fn from_write(previous: Option<Option<T>>) -> Self {
        match previous {
            Some(Some(v)) => Self::Stored(v),
            Some(None) => Self::Deleted,
            None => Self::Absent,
        }
    }

    pub fn is_stored(&self) -> bool {
        matches!(self, Self::Stored(_))
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted)
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn stored(self) -> Option<T> {
        match self {
            Self::Stored(v) => Some(v),
            _ => None,
        }
    }
}

/// A transactional batch of changes, committed in one write or dropped.
///
/// Reads performed while a snapshot is active see its writes first and fall
/// back on disk for untouched keys.
#[derive(Debug)]
pub struct Snapshot<C: Hash + Eq> {
    trees: HashMap<C, Changes>,
}

impl<C: Hash + Eq> Default for Snapshot<C> {
    fn default() -> Self {
        Self {
            trees: HashMap::new(),
        }
    }
}

impl<C: Hash + Eq> Snapshot<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put<K: Into<Bytes>, V: Into<Bytes>>(
        &mut self,
        column: C,
        key: K,
        value: V,
    ) -> EntryState<Bytes> {
        self.trees.entry(column).or_default().insert(key, value)
    }

    pub fn delete<K: Into<Bytes>>(&mut self, column: C, key: K) -> EntryState<Bytes> {
        self.trees.entry(column).or_default().remove(key)
    }

    pub fn get<K: AsRef<[u8]>>(&self, column: C, key: K) -> EntryState<&Bytes> {
        match self
            .trees
            .get(&column)
            .and_then(|changes| changes.writes.get(key.as_ref()))
        {
            Some(Some(v)) => EntryState::Stored(v),
            Some(None) => EntryState::Deleted,
            None => EntryState::Absent,
        }
    }

    // None if the key was not touched by this snapshot
    pub fn contains<K: AsRef<[u8]>>(&self, column: C, key: K) -> Option<bool> {
        self.trees.get(&column)?.contains(key)
    }

    pub fn changes(&self, column: &C) -> Option<&Changes> {
        self.trees.get(column).filter(|changes| !changes.is_empty())
    }

    // Number of pending writes across all columns
    pub fn len(&self) -> usize {
        self.trees.values().map(Changes::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_columns(self) -> impl Iterator<Item = (C, Changes)> {
        self.trees.into_iter()
    }
}
