//! Progress events emitted while loading.
//!
//! Events are advisory. They never gate a load and the terminal
//! [`LoadOutcome`](crate::ingest::LoadOutcome) is the only authoritative result.

mod sink;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::ingest::LoadPhase;

pub use sink::{
    progress_channel, ChannelProgressSink, MockProgressSink, NoOpProgressSink, ProgressFeed,
    ProgressSink,
};

/// Something observable that happened during a load or a connectivity check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ProgressEvent {
    #[serde(rename_all = "camelCase")]
    LoadStarted {
        file_path: PathBuf,
        symbol: String,
        has_header: bool,
    },
    UnknownSymbol {
        symbol: String,
    },
    StagingPrepared,
    CopyStarted,
    StagingComplete {
        rows: u64,
    },
    MergeStarted {
        symbol: String,
    },
    MergeComplete {
        inserted: u64,
        skipped: u64,
    },
    LoadCompleted {
        symbol: String,
        inserted: u64,
    },
    LoadFailed {
        phase: LoadPhase,
        reason: String,
    },
    ConnectionCheckStarted,
    ConnectionVerified {
        server: String,
    },
    ConnectionFailed {
        reason: String,
    },
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressEvent::LoadStarted {
                file_path,
                symbol,
                has_header,
            } => write!(
                f,
                "Starting load: file={}, symbol={}, header={}",
                file_path.display(),
                symbol,
                has_header
            ),
            ProgressEvent::UnknownSymbol { symbol } => write!(
                f,
                "Note: {} is not in the known symbol list; loading anyway.",
                symbol
            ),
            ProgressEvent::StagingPrepared => f.write_str("Staging table prepared."),
            ProgressEvent::CopyStarted => f.write_str("Copying into staging_ohlcv..."),
            ProgressEvent::StagingComplete { rows } => {
                write!(f, "Copy done: {} rows staged.", rows)
            }
            ProgressEvent::MergeStarted { symbol } => write!(
                f,
                "Inserting {} into ohlcv (dedupe on (symbol, ts))...",
                symbol
            ),
            ProgressEvent::MergeComplete { inserted, skipped } => write!(
                f,
                "Merge done: {} inserted, {} already present.",
                inserted, skipped
            ),
            ProgressEvent::LoadCompleted { symbol, inserted } => {
                write!(f, "Load completed for {}: {} new bars.", symbol, inserted)
            }
            ProgressEvent::LoadFailed { phase, reason } => {
                write!(f, "ERROR ({}): {}", phase, reason)
            }
            ProgressEvent::ConnectionCheckStarted => f.write_str("Testing connection..."),
            ProgressEvent::ConnectionVerified { server } => write!(f, "OK: {}", server),
            ProgressEvent::ConnectionFailed { reason } => {
                write!(f, "Connection failed: {}", reason)
            }
        }
    }
}

/// A progress event stamped with the local time it was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressMessage {
    pub at: DateTime<Local>,
    pub event: ProgressEvent,
}

impl ProgressMessage {
    pub fn now(event: ProgressEvent) -> Self {
        Self {
            at: Local::now(),
            event,
        }
    }
}

impl fmt::Display for ProgressMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.at.format("%H:%M:%S"), self.event)
    }
}
