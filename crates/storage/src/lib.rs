pub mod block_info;
pub mod error;
pub mod meta;
pub mod object_store;
pub mod reader;
pub mod tempo_storage;

pub use block_info::BlockInfo;
pub use error::{Result, StorageError};
pub use meta::{BlockMeta, DedicatedColumn, DedicatedColumnScope, DedicatedColumnType};
pub use object_store::{create_local_store, create_object_store, create_s3_store};
pub use reader::{BufferedReaderAt, ObjectReaderAt, ReaderAt};
pub use tempo_storage::{retain_blocks, BlockStatus, TempoStorage};
