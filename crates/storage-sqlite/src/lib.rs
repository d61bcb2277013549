//! SQLite bar store for barload.
//!
//! This crate provides all database-related functionality using Diesel with
//! SQLite. It implements the connector traits defined in `barload-core` and
//! contains:
//! - Database initialization, connection pooling and migrations
//! - The per-connection staging table and the transactional merge
//! - Read access to stored bars
//!
//! # Architecture
//!
//! This crate is the only place where Diesel dependencies exist. `core` works
//! with traits only.
//!
//! ```text
//!     core (pipeline, sessions)
//!                  │
//!                  ▼
//!          storage-sqlite (this crate)
//!                  │
//!                  ▼
//!              SQLite DB
//! ```

pub mod db;
pub mod errors;
pub mod ohlcv;
pub mod schema;
pub mod utils;

// Re-export database utilities
pub use db::{create_pool, get_connection, init, run_migrations, DbConnection, DbPool};

// Re-export storage errors and conversion helpers
pub use errors::{IntoCore, StorageError};

pub use ohlcv::{OhlcvRepository, SqliteBarStore};

// Re-export from barload-core for convenience
pub use barload_core::errors::{DatabaseError, Error, Result};
