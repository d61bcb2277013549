use std::time::Duration;

/// Read size used when streaming a source file into staging (1 MiB).
pub const COPY_CHUNK_SIZE: usize = 1024 * 1024;

/// Number of fields in every source row:
/// `date_txt, time_txt, open, high, low, close, volume`.
pub const SOURCE_FIELD_COUNT: usize = 7;

/// Fractional digits kept for prices (numeric(20,10)).
pub const PRICE_SCALE: u32 = 10;

/// Total significant digits allowed for prices (numeric(20,10)).
pub const PRICE_PRECISION: u32 = 20;

/// Pattern used to compose `date_txt` and `time_txt` into a bar timestamp.
pub const BAR_TIMESTAMP_FORMAT: &str = "%Y.%m.%d %H:%M";

/// Interval at which front ends drain the progress feed.
pub const PROGRESS_DRAIN_INTERVAL: Duration = Duration::from_millis(100);

/// Name of the worker thread that runs a load.
pub const LOAD_WORKER_THREAD_NAME: &str = "barload-worker";
