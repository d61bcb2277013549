//! barload core - symbol normalization, the staged ingestion pipeline and
//! single-flight load sessions.
//!
//! This crate is database-agnostic. It defines the [`ingest::BarStoreConnector`]
//! traits that the `storage-sqlite` crate implements.

pub mod constants;
pub mod errors;
pub mod ingest;
pub mod progress;
pub mod session;
pub mod symbols;

pub use ingest::{IngestPipeline, LoadOutcome, LoadPhase, LoadRequest};
pub use session::{IngestSession, LoadHandle};
pub use symbols::{normalize_symbol, SymbolSource, SymbolToken};

// Re-export error types
pub use errors::Error;
pub use errors::Result;
