//! # analyse
//!
//! Attribute statistics and an experimental attribute index for Tempo
//! vParquet blocks.
//!
//! - [`analyse_block`] sums attribute sizes and value counts per scope,
//!   including dedicated columns, producing a [`BlockSummary`]
//! - [`index::collect_attribute_stats`] groups every attribute occurrence
//!   by key and distinct value
//! - [`index::generate_index`] encodes those groups in one of three layouts
//!   that [`index::write_attribute_index`] persists as `index.parquet`
//!
//! ## Example
//!
//! ```no_run
//! use analyse::{analyse_block, parquetquery};
//! use storage::BlockMeta;
//!
//! # fn main() -> analyse::Result<()> {
//! let file = parquetquery::open_file(std::fs::File::open("data.parquet")?)?;
//! let meta = BlockMeta::new("vParquet4", "7ea59c2c-2b5a-4d4f-9f1e-0f9b3b1f9d1e");
//!
//! let summary = analyse_block(&file, &meta)?;
//! for attr in summary.span.top_n(10) {
//!     println!("{} {}", attr.name, attr.bytes);
//! }
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod collector;
pub mod error;
pub mod index;
pub mod paths;
pub mod scope;
pub mod summary;

pub use parquetquery;

pub use aggregate::{aggregate_attributes, aggregate_dedicated_columns, aggregate_scope, analyse_block};
pub use collector::{AttrStats, AttrStatsCollector, StatsPool};
pub use error::{AnalyseError as Error, Result};
pub use paths::{paths_for_version, AttributePaths, AttributeScope, ScopeAttributePath, Version};
pub use scope::ScopeMask;
pub use summary::{top_n, Attribute, BlockSummary, GenericAttrSummary};
