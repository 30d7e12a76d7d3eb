use super::{open_storage, process_block};
use crate::output::{print_block_summary, PrintArgs};
use analyse::BlockSummary;
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use config::Config;
use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use storage::{retain_blocks, BlockInfo, BlockMeta, BlockStatus, TempoStorage};
use tracing::{debug, info, warn};

#[derive(Args, Debug)]
pub struct AnalyseBlocksCmd {
    /// Tenant ID within the bucket
    tenant_id: String,

    /// Skip blocks below this compaction level
    #[arg(long, default_value_t = 0)]
    min_compaction_level: u8,

    /// Only analyse blocks ending at or after this time (RFC 3339)
    #[arg(long)]
    since: Option<DateTime<Utc>>,

    /// Analyse at most this many blocks, in block ID order
    #[arg(long)]
    max_blocks: Option<usize>,

    #[command(flatten)]
    print: PrintArgs,
}

impl AnalyseBlocksCmd {
    pub async fn run(self, config: &Config) -> Result<()> {
        let storage = Arc::new(open_storage(config)?);
        let concurrency = config.analyse.concurrency;

        let ids = storage.list_blocks(&self.tenant_id).await?;
        let mut metas = live_metas(&storage, &self.tenant_id, ids, concurrency).await;
        retain_blocks(&mut metas, self.min_compaction_level, self.since);
        metas.sort_by(|a, b| a.block_id.cmp(&b.block_id));
        if let Some(max) = self.max_blocks {
            metas.truncate(max);
        }

        println!(
            "Scanning {} blocks of tenant {}.  Press CTRL+C to quit ...",
            metas.len(),
            self.tenant_id
        );

        let results: Vec<_> = stream::iter(metas)
            .map(|meta| {
                let storage = Arc::clone(&storage);
                let block = BlockInfo::new(&meta.block_id, &self.tenant_id);
                let analyse = config.analyse.clone();
                async move {
                    let id = block.block_id.clone();
                    (id, process_block(storage, block, meta, &analyse).await)
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut total = BlockSummary::default();
        let (mut analysed, mut skipped, mut failed) = (0, 0, 0);
        for (id, result) in results {
            match result {
                Ok(Some(summary)) => {
                    total.add(summary);
                    analysed += 1;
                }
                Ok(None) => skipped += 1,
                Err(e) => {
                    warn!(block = %id, error = ?e, "Failed to analyse block");
                    failed += 1;
                }
            }
        }

        info!(analysed, skipped, failed, "Finished scanning blocks");
        if analysed == 0 && failed > 0 {
            bail!("all {failed} blocks failed to analyse");
        }
        println!("Analysed {analysed} blocks ({skipped} skipped, {failed} failed)");

        print_block_summary(&total, &self.print, config.analyse.num_attr);
        Ok(())
    }
}

/// Reads the metas of blocks that are neither compacted nor missing
async fn live_metas(
    storage: &Arc<TempoStorage>,
    tenant_id: &str,
    ids: Vec<String>,
    concurrency: usize,
) -> Vec<BlockMeta> {
    stream::iter(ids)
        .map(|id| {
            let storage = Arc::clone(storage);
            let block = BlockInfo::new(id, tenant_id);
            async move {
                let status = storage.block_status(&block).await;
                (block, status)
            }
        })
        .buffer_unordered(concurrency)
        .filter_map(|(block, status)| async move {
            match status {
                Ok(BlockStatus::Live(meta)) => Some(meta),
                Ok(BlockStatus::Compacted(_)) => {
                    debug!(block = %block.block_id, "Skipping compacted block");
                    None
                }
                Err(e) => {
                    warn!(block = %block.block_id, error = %e, "Skipping block without meta");
                    None
                }
            }
        })
        .collect()
        .await
}
