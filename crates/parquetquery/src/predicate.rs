//! Value and column chunk predicates
//!
//! Predicates are evaluated by [`ColumnIterator`](crate::ColumnIterator)
//! before a value is handed out. Column chunk pruning uses the chunk
//! statistics so whole row groups can be skipped without decoding pages.

use crate::value::Value;
use parquet::file::metadata::ColumnChunkMetaData;

/// Filter applied to a single column
pub trait Predicate: Send {
    /// Returns false if no value of this column chunk can match
    fn keep_column_chunk(&self, _chunk: &ColumnChunkMetaData) -> bool {
        true
    }

    /// Returns true if the value should be yielded
    fn keep_value(&self, value: &Value) -> bool;
}

/// Keeps only non-null values
#[derive(Debug, Clone, Copy, Default)]
pub struct NotNullPredicate;

impl Predicate for NotNullPredicate {
    fn keep_column_chunk(&self, chunk: &ColumnChunkMetaData) -> bool {
        let Some(nulls) = chunk.statistics().and_then(|stats| stats.null_count_opt()) else {
            return true;
        };
        // num_values counts every level entry, nulls included
        (nulls as i64) < chunk.num_values()
    }

    fn keep_value(&self, value: &Value) -> bool {
        !value.is_null()
    }
}
