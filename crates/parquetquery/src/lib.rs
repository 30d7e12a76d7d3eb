//! # parquetquery
//!
//! Row-number aware iteration over the leaf columns of nested parquet files.
//!
//! Tempo blocks store one trace per top-level row with resources, scopes,
//! spans, events and links nested below it. Every leaf value carries
//! repetition and definition levels; this crate turns those levels into a
//! hierarchical [`RowNumber`] so that values from different columns can be
//! aligned with each other.
//!
//! - [`ColumnIterator`] yields `(RowNumber, Value)` pairs for one column path
//! - [`JoinIterator`] merges several iterators that share a definition level
//! - [`GroupPredicate`] lets callers inspect and drop joined rows
//!
//! ## Example
//!
//! ```no_run
//! use parquetquery::{open_file, ColumnIterator, JoinIterator, KeepAll, RowIterator};
//!
//! # fn main() -> parquetquery::Result<()> {
//! let file = open_file(std::fs::File::open("data.parquet")?)?;
//! let key = "rs.list.element.Resource.Attrs.list.element.Key";
//! let value = "rs.list.element.Resource.Attrs.list.element.Value";
//!
//! let iters: Vec<Box<dyn RowIterator<()>>> = vec![
//!     Box::new(ColumnIterator::new(file.clone(), key, None, "key")?),
//!     Box::new(ColumnIterator::new(file, value, None, "value")?),
//! ];
//! let mut join = JoinIterator::new(2, iters, KeepAll);
//! while let Some(row) = join.next()? {
//!     println!("{} {:?}", row.row_number, row.entries);
//! }
//! # Ok(())
//! # }
//! ```

pub mod column;
pub mod error;
pub mod iter;
pub mod join;
pub mod predicate;
pub mod row_number;
pub mod value;

pub use column::{column_exists, open_file, ColumnIterator, ParquetFile};
pub use error::{QueryError as Error, Result};
pub use iter::{IteratorResult, RowIterator};
pub use join::{GroupPredicate, JoinIterator, KeepAll};
pub use predicate::{NotNullPredicate, Predicate};
pub use row_number::{RowNumber, MAX_DEFINITION_LEVEL};
pub use value::Value;
