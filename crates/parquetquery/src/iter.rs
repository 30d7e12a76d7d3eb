//! Shared iterator contract

use crate::error::Result;
use crate::row_number::RowNumber;
use crate::value::Value;

/// One logical row produced by an iterator.
///
/// `entries` hold values read from columns under the name the column was
/// selected as. `other_entries` hold values attached by a
/// [`GroupPredicate`](crate::GroupPredicate), for example per-row
/// statistics computed from the entries.
#[derive(Debug, Clone)]
pub struct IteratorResult<T> {
    pub row_number: RowNumber,
    pub entries: Vec<(&'static str, Value)>,
    pub other_entries: Vec<(&'static str, T)>,
}

impl<T> IteratorResult<T> {
    pub fn new(row_number: RowNumber) -> Self {
        Self {
            row_number,
            entries: Vec::new(),
            other_entries: Vec::new(),
        }
    }

    /// Moves all entries of `other` into this result
    pub fn append(&mut self, mut other: IteratorResult<T>) {
        self.entries.append(&mut other.entries);
        self.other_entries.append(&mut other.other_entries);
    }

    pub fn append_other(&mut self, key: &'static str, value: T) {
        self.other_entries.push((key, value));
    }

    /// Clears the column entries, keeping attached values
    pub fn reset_entries(&mut self) {
        self.entries.clear();
    }

    /// Returns the values selected under `key`, in column order
    pub fn values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| *k == key)
            .map(|(_, v)| v)
    }
}

/// An ordered source of [`IteratorResult`]s.
///
/// Results are returned in ascending row number order. `close` releases
/// column readers and buffered pages; it is idempotent and implementations
/// also call it on drop.
pub trait RowIterator<T>: Send {
    /// Returns the next result, or `None` once the iterator is exhausted
    fn next(&mut self) -> Result<Option<IteratorResult<T>>>;

    fn close(&mut self);
}
