use std::time::Duration;

use barload_core::constants::PROGRESS_DRAIN_INTERVAL;

pub struct Config {
    pub db_path: String,
    pub log_format: String,
    pub progress_interval: Duration,
    pub pool_size: u32,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let db_path = lookup("BARLOAD_DB_PATH").unwrap_or_else(|| "./db/market_data.db".into());
        let log_format = lookup("BARLOAD_LOG_FORMAT").unwrap_or_else(|| "text".into());
        let progress_interval = lookup("BARLOAD_PROGRESS_INTERVAL_MS")
            .and_then(|v| v.trim().parse().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(PROGRESS_DRAIN_INTERVAL);
        let pool_size: u32 = lookup("BARLOAD_POOL_SIZE")
            .and_then(|v| v.trim().parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(4);
        Self {
            db_path,
            log_format,
            progress_interval,
            pool_size,
        }
    }
}
