//! Session lifecycle: connection checks and the single-flight load guard.

mod load_session;

pub use load_session::{IngestSession, LoadHandle, LoadSession};
