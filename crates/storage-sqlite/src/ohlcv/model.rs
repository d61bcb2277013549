//! Database models for staged and durable bars.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::errors::StorageError;
use barload_core::ingest::{OhlcvBar, RawBar};
use barload_core::SymbolToken;

/// Text layout of `ohlcv.ts`. Sorts lexically in time order.
pub const STORED_TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Insert model for the staging table. `row_id` is assigned by SQLite.
#[derive(Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::staging_ohlcv)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct NewStagingRowDB {
    pub date_txt: String,
    pub time_txt: String,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: i64,
}

impl From<&RawBar> for NewStagingRowDB {
    fn from(bar: &RawBar) -> Self {
        Self {
            date_txt: bar.date_txt.clone(),
            time_txt: bar.time_txt.clone(),
            open: bar.open.to_string(),
            high: bar.high.to_string(),
            low: bar.low.to_string(),
            close: bar.close.to_string(),
            volume: bar.volume,
        }
    }
}

/// A staged row as read back by the merge.
#[derive(Queryable, Selectable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::staging_ohlcv)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct StagingRowDB {
    pub row_id: i64,
    pub date_txt: String,
    pub time_txt: String,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: i64,
}

/// Database model for durable bars.
#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = crate::schema::ohlcv)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct OhlcvBarDB {
    pub symbol: String,
    pub ts: String,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: i64,
}

impl OhlcvBarDB {
    /// Durable row for a staged one. Prices were canonicalized when staged
    /// and are copied as is.
    pub fn from_staged(symbol: &SymbolToken, ts: NaiveDateTime, row: &StagingRowDB) -> Self {
        Self {
            symbol: symbol.as_str().to_string(),
            ts: ts.format(STORED_TS_FORMAT).to_string(),
            open: row.open.clone(),
            high: row.high.clone(),
            low: row.low.clone(),
            close: row.close.clone(),
            volume: row.volume,
        }
    }
}

impl From<&OhlcvBar> for OhlcvBarDB {
    fn from(bar: &OhlcvBar) -> Self {
        Self {
            symbol: bar.symbol.as_str().to_string(),
            ts: bar.ts.format(STORED_TS_FORMAT).to_string(),
            open: bar.open.to_string(),
            high: bar.high.to_string(),
            low: bar.low.to_string(),
            close: bar.close.to_string(),
            volume: bar.volume,
        }
    }
}

impl TryFrom<OhlcvBarDB> for OhlcvBar {
    type Error = StorageError;

    fn try_from(db: OhlcvBarDB) -> Result<Self, Self::Error> {
        let price = |column: &str, value: &str| {
            Decimal::from_str(value).map_err(|e| {
                StorageError::CorruptValue(format!("{} '{}' for {}: {}", column, value, db.symbol, e))
            })
        };
        let ts = NaiveDateTime::parse_from_str(&db.ts, STORED_TS_FORMAT).map_err(|e| {
            StorageError::CorruptValue(format!("ts '{}' for {}: {}", db.ts, db.symbol, e))
        })?;

        Ok(OhlcvBar {
            ts,
            open: price("open", &db.open)?,
            high: price("high", &db.high)?,
            low: price("low", &db.low)?,
            close: price("close", &db.close)?,
            volume: db.volume,
            symbol: SymbolToken::from_canonical(db.symbol),
        })
    }
}
