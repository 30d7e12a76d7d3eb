//! Error types for column iteration

use thiserror::Error;

/// Result type for parquetquery operations
pub type Result<T> = std::result::Result<T, QueryError>;

/// Errors that can occur while iterating parquet columns
#[derive(Error, Debug)]
pub enum QueryError {
    /// Error reading or decoding the parquet file
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// The requested column path does not exist in the file schema
    #[error("Column not found: {path}")]
    ColumnNotFound { path: String },

    /// The column uses a physical type that cannot be decoded into a value
    #[error("Unsupported physical type {physical_type} for column {path}")]
    UnsupportedType { path: String, physical_type: String },

    /// The column is nested deeper than a row number can address
    #[error("Column {path} is nested {depth} levels deep")]
    TooDeep { path: String, depth: usize },

    /// I/O error while opening the underlying file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
