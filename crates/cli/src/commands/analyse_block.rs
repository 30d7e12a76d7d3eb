use super::{open_storage, process_block};
use crate::output::{print_block_summary, PrintArgs};
use anyhow::{bail, Result};
use clap::Args;
use config::Config;
use std::sync::Arc;
use storage::{BlockInfo, BlockStatus};

#[derive(Args, Debug)]
pub struct AnalyseBlockCmd {
    /// Tenant ID within the bucket
    tenant_id: String,

    /// Block ID to analyse
    block_id: String,

    #[command(flatten)]
    print: PrintArgs,
}

impl AnalyseBlockCmd {
    pub async fn run(self, config: &Config) -> Result<()> {
        let storage = Arc::new(open_storage(config)?);
        let block = BlockInfo::new(&self.block_id, &self.tenant_id);

        let meta = match storage.block_status(&block).await? {
            BlockStatus::Live(meta) => meta,
            BlockStatus::Compacted(_) => {
                bail!("unable to analyse block: block has no meta.json because it was compacted")
            }
        };

        println!("Scanning block contents.  Press CTRL+C to quit ...");
        let version = meta.version.clone();
        let Some(summary) = process_block(storage, block, meta, &config.analyse).await? else {
            bail!("unsupported block version: {version}");
        };

        print_block_summary(&summary, &self.print, config.analyse.num_attr);
        Ok(())
    }
}
