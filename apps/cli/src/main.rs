//! barload - load OHLCV bar files into the local bar store.
//!
//! Commands:
//! - `check` - open a connection and report the SQLite version
//! - `load` - stage a file and merge it into `ohlcv`

mod config;
mod main_lib;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use config::Config;
use main_lib::{build_pool, init_tracing, run_check, run_load, LoadArgs};

#[derive(Parser)]
#[command(name = "barload", about = "Load OHLCV bar files into the local bar store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify that the database can be opened and queried.
    Check,
    /// Load one bar file.
    Load {
        /// Comma-delimited file: date,time,open,high,low,close,volume.
        file: PathBuf,

        /// Target symbol. Inferred from the file name when omitted.
        #[arg(long)]
        symbol: Option<String>,

        /// Skip the first line of the file.
        #[arg(long, default_value_t = false)]
        header: bool,

        /// Print the outcome as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let config = Config::from_env();
    init_tracing(&config.log_format);

    let pool = build_pool(&config)?;
    tracing::info!("Using database {}", config.db_path);

    let success = match cli.command {
        Commands::Check => run_check(pool),
        Commands::Load {
            file,
            symbol,
            header,
            json,
        } => {
            let args = LoadArgs {
                file,
                symbol,
                has_header: header,
                json,
            };
            run_load(&config, pool, args).await?.is_success()
        }
    };

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
