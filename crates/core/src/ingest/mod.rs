//! Bar ingestion.
//!
//! - [`ingest_model`] - raw rows, durable bars, requests and outcomes
//! - [`bar_reader`] - streaming decoder for the fixed source layout
//! - [`ingest_traits`] - the storage interface a bar store implements
//! - [`pipeline`] - the two-phase load (stage, then merge)
//!
//! ```text
//! source file --BarReader--> holding table --merge (one tx)--> ohlcv
//!                             (per connection)   ON CONFLICT DO NOTHING
//! ```

pub mod bar_reader;
pub mod ingest_model;
pub mod ingest_traits;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod mock_store;

pub use bar_reader::BarReader;
pub use ingest_model::{
    compose_timestamp, LoadOutcome, LoadPhase, LoadRequest, MergeSummary, OhlcvBar, RawBar,
};
pub use ingest_traits::{BarStoreConnection, BarStoreConnector};
pub use pipeline::IngestPipeline;
