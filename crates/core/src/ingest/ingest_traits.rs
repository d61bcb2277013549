//! Storage interface for bar ingestion.
//!
//! These traits abstract the relational store. A store must provide atomic
//! transactions, a unique `(symbol, ts)` constraint with do-nothing conflict
//! handling, and a bulk path into a connection-private holding table.

use std::io::Read;

use super::ingest_model::MergeSummary;
use crate::errors::Result;
use crate::symbols::SymbolToken;

/// Opens connections to the bar store.
pub trait BarStoreConnector: Send + Sync {
    /// Acquires a connection. It is released when the returned value is dropped.
    fn connect(&self) -> Result<Box<dyn BarStoreConnection>>;
}

/// A single connection to the bar store, owned by one load or one probe.
pub trait BarStoreConnection: Send {
    /// Runs a trivial read-only probe and returns a server identification.
    fn server_version(&mut self) -> Result<String>;

    /// Creates the holding table if absent and removes leftover rows.
    fn prepare_staging(&mut self) -> Result<()>;

    /// Streams `source` into the holding table and returns the staged row count.
    ///
    /// On error the holding table may be partially populated. It is cleared by
    /// the next [`prepare_staging`](Self::prepare_staging).
    fn copy_into_staging(&mut self, source: &mut dyn Read, has_header: bool) -> Result<u64>;

    /// Moves every staged row into the durable table for `symbol` in a single
    /// transaction. Rows whose `(symbol, ts)` already exists are skipped.
    /// Any error rolls the whole merge back.
    fn merge_staging(&mut self, symbol: &SymbolToken) -> Result<MergeSummary>;
}
