use std::path::PathBuf;
use std::sync::Arc;

use barload_core::progress::{progress_channel, ProgressFeed, ProgressMessage};
use barload_core::{IngestSession, LoadOutcome, LoadRequest, SymbolSource, SymbolToken};
use barload_storage_sqlite::{
    create_pool, init, run_migrations, DbPool, OhlcvRepository, SqliteBarStore,
};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;

pub struct LoadArgs {
    pub file: PathBuf,
    pub symbol: Option<String>,
    pub has_header: bool,
    pub json: bool,
}

pub fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Opens the database file, builds the pool and applies migrations.
pub fn build_pool(config: &Config) -> anyhow::Result<Arc<DbPool>> {
    let db_path = init(&config.db_path)?;
    let pool = create_pool(&db_path, config.pool_size)?;
    run_migrations(&pool)?;
    Ok(pool)
}

fn session_for(pool: &Arc<DbPool>) -> (IngestSession, ProgressFeed) {
    let (sink, feed) = progress_channel();
    let store = SqliteBarStore::new(Arc::clone(pool));
    (IngestSession::new(Arc::new(store), Arc::new(sink)), feed)
}

fn print_progress(messages: Vec<ProgressMessage>) {
    for message in messages {
        eprintln!("{}", message);
    }
}

/// Runs the connectivity probe. The result is reported on the progress
/// stream, so only success is returned.
pub fn run_check(pool: Arc<DbPool>) -> bool {
    let (session, mut feed) = session_for(&pool);
    let result = session.check_connection();
    print_progress(feed.drain());
    result.is_ok()
}

pub async fn run_load(
    config: &Config,
    pool: Arc<DbPool>,
    args: LoadArgs,
) -> anyhow::Result<LoadOutcome> {
    let source = match args.symbol {
        Some(symbol) => SymbolSource::Explicit(symbol),
        None => SymbolSource::InferFromFile,
    };
    let request = LoadRequest::new(args.file, &source, args.has_header)?;
    let symbol = request.symbol.clone();

    let (session, mut feed) = session_for(&pool);
    let handle = session.start_load(request)?;

    // Relay progress while the worker runs.
    let mut ticker = tokio::time::interval(config.progress_interval);
    while !handle.is_finished() {
        ticker.tick().await;
        print_progress(feed.drain());
    }
    let outcome = handle.join()?;
    print_progress(feed.drain());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        let stored = if outcome.is_success() {
            stored_bar_count(&pool, &symbol)
        } else {
            None
        };
        println!("{}", summary_line(&symbol, &outcome, stored));
    }

    Ok(outcome)
}

/// Bars stored for `symbol`, or `None` if the count cannot be read. The
/// load outcome is reported either way.
fn stored_bar_count(pool: &Arc<DbPool>, symbol: &SymbolToken) -> Option<i64> {
    OhlcvRepository::new(Arc::clone(pool))
        .count_bars(Some(symbol))
        .map_err(|e| tracing::warn!("Could not count stored bars for {}: {}", symbol, e))
        .ok()
}

fn summary_line(symbol: &SymbolToken, outcome: &LoadOutcome, stored: Option<i64>) -> String {
    match outcome {
        LoadOutcome::Completed {
            staged_rows,
            inserted_rows,
            skipped_rows,
        } => {
            let counts = format!(
                "{}: {} staged, {} inserted, {} skipped",
                symbol, staged_rows, inserted_rows, skipped_rows
            );
            match stored {
                Some(stored) => format!("{} ({} bars stored)", counts, stored),
                None => counts,
            }
        }
        LoadOutcome::Failed { phase, reason } => {
            format!("{}: failed during {}: {}", symbol, phase, reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use barload_core::LoadPhase;
    use std::time::Duration;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> Config {
        Config {
            db_path: dir
                .path()
                .join("db")
                .join("market_data.db")
                .to_string_lossy()
                .into_owned(),
            log_format: "text".to_string(),
            progress_interval: Duration::from_millis(10),
            pool_size: 2,
        }
    }

    #[test]
    fn test_summary_line() {
        let symbol = SymbolToken::parse("EURUSD").unwrap();
        let done = LoadOutcome::Completed {
            staged_rows: 3,
            inserted_rows: 1,
            skipped_rows: 2,
        };
        assert_eq!(
            summary_line(&symbol, &done, Some(5)),
            "EURUSD: 3 staged, 1 inserted, 2 skipped (5 bars stored)"
        );
        assert_eq!(
            summary_line(&symbol, &done, None),
            "EURUSD: 3 staged, 1 inserted, 2 skipped"
        );

        let failed = LoadOutcome::failed(LoadPhase::Merge, "bad ts");
        assert_eq!(
            summary_line(&symbol, &failed, None),
            "EURUSD: failed during merge: bad ts"
        );
    }

    #[tokio::test]
    async fn test_load_command_end_to_end() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let pool = build_pool(&config).unwrap();

        let file = dir.path().join("EURUSD.csv");
        std::fs::write(
            &file,
            "date,time,o,h,l,c,v\n2024.01.02,00:00,1.1,1.2,1.0,1.15,10\n",
        )
        .unwrap();
        let args = LoadArgs {
            file: file.clone(),
            symbol: None,
            has_header: true,
            json: true,
        };
        let outcome = run_load(&config, Arc::clone(&pool), args).await.unwrap();
        assert_eq!(
            outcome,
            LoadOutcome::Completed {
                staged_rows: 1,
                inserted_rows: 1,
                skipped_rows: 0
            }
        );

        let eurusd = SymbolToken::parse("EURUSD").unwrap();
        assert_eq!(
            OhlcvRepository::new(pool).count_bars(Some(&eurusd)).unwrap(),
            1
        );
    }

    /// Pool over a database that has never been migrated, so `ohlcv` is missing.
    fn unmigrated_pool(config: &Config) -> Arc<DbPool> {
        let db_path = init(&config.db_path).unwrap();
        create_pool(&db_path, config.pool_size).unwrap()
    }

    #[tokio::test]
    async fn test_failed_load_outcome_is_returned_in_text_mode() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let pool = unmigrated_pool(&config);

        let args = LoadArgs {
            file: dir.path().join("EURUSD.csv"),
            symbol: None,
            has_header: false,
            json: false,
        };
        let outcome = run_load(&config, pool, args).await.unwrap();
        assert!(matches!(
            outcome,
            LoadOutcome::Failed {
                phase: LoadPhase::Open,
                ..
            }
        ));
    }

    #[test]
    fn test_stored_bar_count_failure_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let pool = unmigrated_pool(&test_config(&dir));
        let eurusd = SymbolToken::parse("EURUSD").unwrap();
        assert_eq!(stored_bar_count(&pool, &eurusd), None);
    }

    #[test]
    fn test_check_command() {
        let dir = TempDir::new().unwrap();
        let pool = build_pool(&test_config(&dir)).unwrap();
        assert!(run_check(pool));
    }
}
