use crate::block_info::BlockInfo;
use crate::error::{Result, StorageError};
use crate::meta::BlockMeta;
use crate::reader::{BufferedReaderAt, ObjectReaderAt};
use chrono::{DateTime, Utc};
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

/// Metadata state of a block
#[derive(Debug, Clone)]
pub enum BlockStatus {
    /// The block has a meta.json and can be analysed
    Live(BlockMeta),
    /// The block was compacted away and only meta.compacted.json remains
    Compacted(BlockMeta),
}

/// TempoStorage - block discovery and data access for one Tempo backend
#[derive(Debug)]
pub struct TempoStorage {
    object_store: Arc<dyn ObjectStore>,
    prefix: String,
}

impl TempoStorage {
    /// Create a new TempoStorage instance
    pub fn new(object_store: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        Self {
            object_store,
            prefix: prefix.into(),
        }
    }

    fn path(&self, relative: &str) -> ObjectPath {
        if self.prefix.is_empty() {
            ObjectPath::from(relative)
        } else {
            ObjectPath::from(format!("{}/{}", self.prefix.trim_end_matches('/'), relative))
        }
    }

    /// Lists the block IDs stored for a tenant, sorted
    pub async fn list_blocks(&self, tenant_id: &str) -> Result<Vec<String>> {
        let tenant_path = self.path(tenant_id);
        let listing = self
            .object_store
            .list_with_delimiter(Some(&tenant_path))
            .await?;

        let mut blocks: Vec<String> = listing
            .common_prefixes
            .iter()
            .filter_map(|p| p.filename().map(str::to_string))
            .collect();
        blocks.sort();

        info!(tenant = tenant_id, blocks = blocks.len(), "Listed blocks");
        Ok(blocks)
    }

    /// Reads the metadata of a block, falling back to the compacted meta
    pub async fn block_status(&self, block: &BlockInfo) -> Result<BlockStatus> {
        match self.read_meta(&block.meta_path()).await {
            Ok(meta) => return Ok(BlockStatus::Live(meta)),
            Err(StorageError::ObjectStore(object_store::Error::NotFound { .. })) => {
                debug!(block = %block.block_id, "meta.json not found, trying compacted meta");
            }
            Err(e) => return Err(e),
        }

        match self.read_meta(&block.compacted_meta_path()).await {
            Ok(meta) => Ok(BlockStatus::Compacted(meta)),
            Err(StorageError::ObjectStore(object_store::Error::NotFound { .. })) => {
                Err(StorageError::BlockNotFound {
                    tenant_id: block.tenant_id.clone(),
                    block_id: block.block_id.clone(),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Read and parse a meta.json or meta.compacted.json file
    async fn read_meta(&self, relative: &str) -> Result<BlockMeta> {
        let path = self.path(relative);
        let bytes = self.object_store.get(&path).await?.bytes().await?;

        serde_json::from_slice(&bytes).map_err(|source| StorageError::InvalidMeta {
            path: path.to_string(),
            source,
        })
    }

    /// Opens a buffered reader over the block's data.parquet.
    ///
    /// The returned reader performs blocking reads through `handle`.
    pub async fn data_reader(
        &self,
        block: &BlockInfo,
        handle: Handle,
        buffer_size: u64,
        buffer_count: usize,
    ) -> Result<BufferedReaderAt<ObjectReaderAt>> {
        let path = self.path(&block.data_parquet_path());
        let head = self.object_store.head(&path).await?;
        debug!(path = %path, size = head.size, "Opening block data");

        let reader = ObjectReaderAt::new(Arc::clone(&self.object_store), path, head.size, handle);
        Ok(BufferedReaderAt::new(reader, buffer_size, buffer_count))
    }

    /// Get a reference to the object store
    pub fn object_store(&self) -> &Arc<dyn ObjectStore> {
        &self.object_store
    }
}

/// Keeps blocks at or above `min_compaction_level` whose end time is after
/// `since`. Blocks with unparseable timestamps are kept.
pub fn retain_blocks(
    metas: &mut Vec<BlockMeta>,
    min_compaction_level: u8,
    since: Option<DateTime<Utc>>,
) {
    let before = metas.len();
    metas.retain(|meta| {
        if meta.compaction_level < min_compaction_level {
            return false;
        }
        match (since, meta.end_time_utc()) {
            (Some(since), Some(end)) => end >= since,
            (Some(_), None) => {
                warn!(
                    block = %meta.block_id,
                    end_time = %meta.end_time,
                    "Failed to parse end_time, keeping block"
                );
                true
            }
            (None, _) => true,
        }
    });

    let filtered = before - metas.len();
    if filtered > 0 {
        info!(filtered, kept = metas.len(), "Filtered blocks");
    }
}
