mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::analyse_block::AnalyseBlockCmd;
use commands::analyse_blocks::AnalyseBlocksCmd;
use commands::gen_attrindex::GenAttrIndexCmd;
use config::Config;

/// Attribute analysis and indexing for Tempo blocks
#[derive(Parser, Debug)]
#[command(name = "tempo-cli")]
#[command(about = "Attribute analysis and indexing for Tempo blocks", long_about = None)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print attribute sizes of one block
    AnalyseBlock(AnalyseBlockCmd),
    /// Print attribute sizes summed over the blocks of a tenant
    AnalyseBlocks(AnalyseBlocksCmd),
    /// Generate an experimental attribute index for a local block
    GenAttrindex(GenAttrIndexCmd),
}

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls the level, e.g. RUST_LOG=debug. Logs go to stderr so
    // tables on stdout stay clean.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
                .add_directive("hyper_util=error".parse()?)
                .add_directive("aws_config=error".parse()?),
        )
        .init();

    let args = Args::parse();

    match args.command {
        Command::AnalyseBlock(cmd) => cmd.run(&load_config(args.config.as_deref())?).await,
        Command::AnalyseBlocks(cmd) => cmd.run(&load_config(args.config.as_deref())?).await,
        Command::GenAttrindex(cmd) => cmd.run(),
    }
}

fn load_config(path: Option<&str>) -> Result<Config> {
    let config = Config::load(path)?;
    config.validate()?;
    Ok(config)
}
