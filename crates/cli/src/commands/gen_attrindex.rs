use crate::output::{attribute_stats_table, file_stats_table};
use analyse::index::{
    collect_attribute_stats, generate_index, write_attribute_index, CollectOptions, IndexKind,
    DATA_FILE,
};
use analyse::parquetquery;
use anyhow::{Context, Result};
use clap::Args;
use std::fs::File;
use std::path::{Path, PathBuf};
use storage::BlockMeta;

const META_FILE: &str = "meta.json";

#[derive(Args, Debug)]
pub struct GenAttrIndexCmd {
    /// Block directory holding meta.json and data.parquet, or the data file itself
    block: PathBuf,

    /// Add intrinsic attributes like name, kind and status to the index
    #[arg(long)]
    add_intrinsics: bool,

    /// Index layouts to generate, rows and codes together produce the combined layout
    #[arg(long, value_delimiter = ',', value_parser = ["rows", "codes"], default_value = "rows,codes")]
    index_types: Vec<String>,
}

impl GenAttrIndexCmd {
    pub fn run(self) -> Result<()> {
        let dir = block_dir(&self.block);
        println!("Analyzing parquet block from {}", dir.display());

        let meta = read_meta(&dir)?;
        let data_path = dir.join(DATA_FILE);
        let data = File::open(&data_path)
            .with_context(|| format!("Failed to open {}", data_path.display()))?;
        let file = parquetquery::open_file(data)?;

        let options = CollectOptions {
            add_intrinsics: self.add_intrinsics,
        };
        let stats = collect_attribute_stats(&file, &meta, &options)?;

        println!("File stats:");
        println!("{}", file_stats_table(&stats));
        println!("\nAttribute stats:");
        println!("{}", attribute_stats_table(&stats));

        let kind = IndexKind::from_index_types(&self.index_types)?;
        match kind {
            IndexKind::Combined => println!("Generating combined index with inverted index and key/value codes"),
            IndexKind::Rows => println!("Generating inverted index with rows"),
            IndexKind::Codes => println!("Generating index with key/value codes"),
        }

        let index = generate_index(&stats, kind);
        let path = write_attribute_index(&dir, &index)?;
        println!("\nSuccessfully generated attribute index in {}", path.display());
        Ok(())
    }
}

/// Accepts the block directory or a file inside it
fn block_dir(path: &Path) -> PathBuf {
    if path.is_file() {
        if let Some(parent) = path.parent() {
            return parent.to_path_buf();
        }
    }
    path.to_path_buf()
}

fn read_meta(dir: &Path) -> Result<BlockMeta> {
    let path = dir.join(META_FILE);
    let bytes = std::fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("Failed to parse {}", path.display()))
}
