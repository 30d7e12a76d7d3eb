pub mod analyse_block;
pub mod analyse_blocks;
pub mod gen_attrindex;

use analyse::{analyse_block, parquetquery, BlockSummary, Version};
use anyhow::{Context, Result};
use config::{AnalyseConfig, Backend, Config};
use std::sync::Arc;
use storage::{create_object_store, BlockInfo, BlockMeta, TempoStorage};
use tokio::runtime::Handle;
use tracing::{info, warn};

/// Opens the configured backend
pub fn open_storage(config: &Config) -> Result<TempoStorage> {
    let store = create_object_store(config).context("Failed to create object store")?;
    let prefix = match config.storage.backend {
        Backend::S3 => config.s3.prefix.clone(),
        Backend::Local => String::new(),
    };
    Ok(TempoStorage::new(store, prefix))
}

/// Analyses one live block. Returns `None` for blocks in a format
/// without known attribute columns.
pub async fn process_block(
    storage: Arc<TempoStorage>,
    block: BlockInfo,
    meta: BlockMeta,
    analyse: &AnalyseConfig,
) -> Result<Option<BlockSummary>> {
    if let Err(e) = Version::parse(&meta.version) {
        warn!(block = %block.block_id, error = %e, "Skipping block");
        return Ok(None);
    }

    let reader = storage
        .data_reader(&block, Handle::current(), analyse.buffer_size, analyse.buffer_count)
        .await
        .with_context(|| format!("Failed to open data of block {}", block.block_id))?;

    info!(block = %block.block_id, version = %meta.version, "Scanning block contents");
    let summary = tokio::task::spawn_blocking(move || -> analyse::Result<BlockSummary> {
        let file = parquetquery::open_file(reader)?;
        analyse_block(&file, &meta)
    })
    .await
    .context("Block scan task failed")?
    .with_context(|| format!("Failed to analyse block {}", block.block_id))?;

    Ok(Some(summary))
}
