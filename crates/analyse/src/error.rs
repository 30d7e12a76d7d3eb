use thiserror::Error;

/// Result type for block analysis
pub type Result<T> = std::result::Result<T, AnalyseError>;

#[derive(Error, Debug)]
pub enum AnalyseError {
    /// A column required by the block version is missing from the file
    #[error("Column {path} not found in block schema")]
    Schema { path: String },

    /// The block uses a format version without known column paths
    #[error("Unsupported block version: {0}")]
    UnsupportedVersion(String),

    #[error("Column iteration failed: {0}")]
    Query(parquetquery::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Invalid index file: {0}")]
    InvalidIndex(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<parquetquery::Error> for AnalyseError {
    fn from(err: parquetquery::Error) -> Self {
        match err {
            parquetquery::Error::ColumnNotFound { path } => AnalyseError::Schema { path },
            other => AnalyseError::Query(other),
        }
    }
}
