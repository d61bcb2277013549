//! Domain models for bar ingestion.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::constants::BAR_TIMESTAMP_FORMAT;
use crate::errors::{Result, ValidationError};
use crate::symbols::{SymbolSource, SymbolToken};

/// One source row as decoded from the input file.
///
/// Date and time stay as text until the merge composes them into a timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBar {
    pub date_txt: String,
    pub time_txt: String,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: i64,
}

impl RawBar {
    /// Composes `date_txt` and `time_txt` into the bar timestamp.
    pub fn timestamp(&self) -> Result<NaiveDateTime> {
        compose_timestamp(&self.date_txt, &self.time_txt)
    }
}

/// Parses `YYYY.MM.DD` + `HH:MM` into a timestamp.
pub fn compose_timestamp(date_txt: &str, time_txt: &str) -> Result<NaiveDateTime> {
    let text = format!("{} {}", date_txt, time_txt);
    NaiveDateTime::parse_from_str(&text, BAR_TIMESTAMP_FORMAT).map_err(|e| {
        ValidationError::InvalidInput(format!("Invalid bar timestamp '{}': {}", text, e)).into()
    })
}

/// A durable bar, unique per `(symbol, ts)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OhlcvBar {
    pub symbol: SymbolToken,
    pub ts: NaiveDateTime,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: i64,
}

impl OhlcvBar {
    /// Builds the durable bar for a staged row.
    pub fn from_staged(symbol: &SymbolToken, raw: &RawBar) -> Result<Self> {
        Ok(Self {
            symbol: symbol.clone(),
            ts: raw.timestamp()?,
            open: raw.open,
            high: raw.high,
            low: raw.low,
            close: raw.close,
            volume: raw.volume,
        })
    }
}

/// A validated request to load one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadRequest {
    pub file_path: PathBuf,
    pub symbol: SymbolToken,
    pub has_header: bool,
}

impl LoadRequest {
    /// Resolves the target symbol and rejects requests that cannot start.
    pub fn new(
        file_path: impl Into<PathBuf>,
        symbol: &SymbolSource,
        has_header: bool,
    ) -> Result<Self> {
        let file_path = file_path.into();
        if file_path.as_os_str().is_empty() {
            return Err(ValidationError::MissingField("file".to_string()).into());
        }
        let symbol = symbol.resolve(&file_path)?;
        Ok(Self {
            file_path,
            symbol,
            has_header,
        })
    }
}

/// Counts reported by a committed merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeSummary {
    /// Staged rows visited by the merge.
    pub processed_rows: u64,
    /// Rows that created a new durable bar.
    pub inserted_rows: u64,
}

impl MergeSummary {
    /// Rows dropped because `(symbol, ts)` already existed.
    pub fn skipped_rows(&self) -> u64 {
        self.processed_rows.saturating_sub(self.inserted_rows)
    }
}

/// The step of a load that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LoadPhase {
    /// The source file could not be opened. Nothing was performed.
    Open,
    /// No database connection. Nothing was performed.
    Connect,
    /// Staging failed. The holding table may be dirty; durable data untouched.
    Stage,
    /// The merge rolled back; durable data untouched.
    Merge,
}

impl fmt::Display for LoadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoadPhase::Open => "open",
            LoadPhase::Connect => "connect",
            LoadPhase::Stage => "stage",
            LoadPhase::Merge => "merge",
        };
        f.write_str(name)
    }
}

/// Terminal status of a load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum LoadOutcome {
    #[serde(rename_all = "camelCase")]
    Completed {
        staged_rows: u64,
        inserted_rows: u64,
        skipped_rows: u64,
    },
    #[serde(rename_all = "camelCase")]
    Failed { phase: LoadPhase, reason: String },
}

impl LoadOutcome {
    pub fn completed(staged_rows: u64, summary: MergeSummary) -> Self {
        LoadOutcome::Completed {
            staged_rows,
            inserted_rows: summary.inserted_rows,
            skipped_rows: summary.skipped_rows(),
        }
    }

    pub fn failed(phase: LoadPhase, reason: impl Into<String>) -> Self {
        LoadOutcome::Failed {
            phase,
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, LoadOutcome::Completed { .. })
    }

    /// Rows added to the durable table, zero on failure.
    pub fn inserted_rows(&self) -> u64 {
        match self {
            LoadOutcome::Completed { inserted_rows, .. } => *inserted_rows,
            LoadOutcome::Failed { .. } => 0,
        }
    }
}
