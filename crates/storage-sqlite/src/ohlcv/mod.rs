//! SQLite bar store: staging, merge and read access to `ohlcv`.

mod model;
mod repository;

pub use model::{NewStagingRowDB, OhlcvBarDB, StagingRowDB, STORED_TS_FORMAT};
pub use repository::{OhlcvRepository, SqliteBarConnection, SqliteBarStore};
