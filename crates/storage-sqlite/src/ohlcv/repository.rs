use diesel::connection::SimpleConnection;
use diesel::dsl::sql;
use diesel::prelude::*;
use diesel::sql_types::Text;
use diesel::sqlite::SqliteConnection;
use log::{debug, info, warn};
use std::io::Read;
use std::sync::Arc;

use super::model::{NewStagingRowDB, OhlcvBarDB, StagingRowDB};
use crate::db::{get_connection, DbConnection, DbPool};
use crate::errors::{IntoCore, StorageError};
use crate::schema::ohlcv::dsl as ohlcv_dsl;
use crate::schema::staging_ohlcv::dsl as staging_dsl;
use crate::utils::{chunk_for_staging, MERGE_PAGE_ROWS, STAGING_BATCH_ROWS};
use barload_core::ingest::{
    compose_timestamp, BarReader, BarStoreConnection, BarStoreConnector, MergeSummary, OhlcvBar,
    RawBar,
};
use barload_core::{Result, SymbolToken};

/// TEMP tables live in the connection's private schema and vanish with it.
const CREATE_STAGING_SQL: &str = "CREATE TEMP TABLE IF NOT EXISTS staging_ohlcv (
    row_id INTEGER PRIMARY KEY,
    date_txt TEXT NOT NULL,
    time_txt TEXT NOT NULL,
    open TEXT NOT NULL,
    high TEXT NOT NULL,
    low TEXT NOT NULL,
    close TEXT NOT NULL,
    volume BIGINT NOT NULL
)";

/// Rows decoded from the source before they are written out.
const COPY_READ_ROWS: usize = STAGING_BATCH_ROWS * 8;

// =============================================================================
// Connector
// =============================================================================

/// [`BarStoreConnector`] backed by an r2d2 pool of SQLite connections.
#[derive(Clone)]
pub struct SqliteBarStore {
    pool: Arc<DbPool>,
}

impl SqliteBarStore {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

impl BarStoreConnector for SqliteBarStore {
    fn connect(&self) -> Result<Box<dyn BarStoreConnection>> {
        let conn = get_connection(&self.pool)?;
        Ok(Box::new(SqliteBarConnection { conn }))
    }
}

// =============================================================================
// Connection
// =============================================================================

/// One pooled connection. Its staging table is invisible to other
/// connections and the connection goes back to the pool on drop.
pub struct SqliteBarConnection {
    conn: DbConnection,
}

impl BarStoreConnection for SqliteBarConnection {
    fn server_version(&mut self) -> Result<String> {
        let version: String = diesel::select(sql::<Text>("sqlite_version()"))
            .get_result(&mut *self.conn)
            .into_core()?;
        Ok(format!("SQLite {}", version))
    }

    fn prepare_staging(&mut self) -> Result<()> {
        diesel::sql_query(CREATE_STAGING_SQL)
            .execute(&mut *self.conn)
            .into_core()?;
        let cleared = diesel::delete(staging_dsl::staging_ohlcv)
            .execute(&mut *self.conn)
            .into_core()?;
        if cleared > 0 {
            debug!("Cleared {} leftover staged rows", cleared);
        }
        Ok(())
    }

    fn copy_into_staging(&mut self, source: &mut dyn Read, has_header: bool) -> Result<u64> {
        let mut reader = BarReader::new(source, has_header);
        let mut batch: Vec<RawBar> = Vec::with_capacity(COPY_READ_ROWS);
        let mut staged: u64 = 0;

        loop {
            // A decode error ends the copy; rows already written stay staged
            // until the next prepare.
            let read = reader.read_batch(&mut batch, COPY_READ_ROWS)?;
            if read == 0 {
                break;
            }
            let rows: Vec<NewStagingRowDB> = batch.iter().map(NewStagingRowDB::from).collect();
            self.conn
                .transaction::<_, StorageError, _>(|conn| {
                    for chunk in chunk_for_staging(&rows) {
                        diesel::insert_into(staging_dsl::staging_ohlcv)
                            .values(chunk)
                            .execute(conn)?;
                    }
                    Ok(())
                })
                .into_core()?;
            staged += read as u64;
        }

        debug!("Staged {} rows", staged);
        Ok(staged)
    }

    fn merge_staging(&mut self, symbol: &SymbolToken) -> Result<MergeSummary> {
        // Durability of this transaction is traded for speed, like an
        // asynchronous commit. The pool customizer restores NORMAL on acquire.
        self.conn
            .batch_execute("PRAGMA synchronous = OFF")
            .into_core()?;

        let result = self
            .conn
            .immediate_transaction::<_, StorageError, _>(|conn| merge_pages(conn, symbol));

        if let Err(e) = self.conn.batch_execute("PRAGMA synchronous = NORMAL") {
            warn!("Failed to restore synchronous mode: {}", e);
        }

        let summary = result.into_core()?;
        info!(
            "Merged {} staged rows into ohlcv for {} ({} new)",
            summary.processed_rows, symbol, summary.inserted_rows
        );
        Ok(summary)
    }
}

/// Walks the staging table in `row_id` order and inserts each row,
/// counting only rows that created a new `(symbol, ts)`.
fn merge_pages(
    conn: &mut SqliteConnection,
    symbol: &SymbolToken,
) -> std::result::Result<MergeSummary, StorageError> {
    let mut summary = MergeSummary::default();
    let mut cursor: i64 = 0;

    loop {
        let page: Vec<StagingRowDB> = staging_dsl::staging_ohlcv
            .filter(staging_dsl::row_id.gt(cursor))
            .order(staging_dsl::row_id.asc())
            .limit(MERGE_PAGE_ROWS)
            .select(StagingRowDB::as_select())
            .load(conn)?;

        let Some(last) = page.last() else {
            break;
        };
        cursor = last.row_id;

        for row in &page {
            let ts = compose_timestamp(&row.date_txt, &row.time_txt)?;
            let bar = OhlcvBarDB::from_staged(symbol, ts, row);
            let inserted = diesel::insert_into(ohlcv_dsl::ohlcv)
                .values(&bar)
                .on_conflict((ohlcv_dsl::symbol, ohlcv_dsl::ts))
                .do_nothing()
                .execute(conn)?;
            summary.processed_rows += 1;
            summary.inserted_rows += inserted as u64;
        }
    }

    Ok(summary)
}

// =============================================================================
// Read access
// =============================================================================

/// Read-side queries over the durable table.
pub struct OhlcvRepository {
    pool: Arc<DbPool>,
}

impl OhlcvRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    /// Number of stored bars, for one symbol or for all of them.
    pub fn count_bars(&self, symbol: Option<&SymbolToken>) -> Result<i64> {
        let mut conn = get_connection(&self.pool)?;
        let mut query = ohlcv_dsl::ohlcv.into_boxed();
        if let Some(symbol) = symbol {
            query = query.filter(ohlcv_dsl::symbol.eq(symbol.as_str().to_string()));
        }
        query.count().get_result(&mut conn).into_core()
    }

    /// Bars of `symbol` in timestamp order.
    pub fn list_bars(&self, symbol: &SymbolToken) -> Result<Vec<OhlcvBar>> {
        let mut conn = get_connection(&self.pool)?;
        let rows: Vec<OhlcvBarDB> = ohlcv_dsl::ohlcv
            .filter(ohlcv_dsl::symbol.eq(symbol.as_str()))
            .order(ohlcv_dsl::ts.asc())
            .select(OhlcvBarDB::as_select())
            .load(&mut conn)
            .into_core()?;

        rows.into_iter()
            .map(|row| OhlcvBar::try_from(row).into_core())
            .collect()
    }

    /// Every stored row exactly as persisted, ordered by key.
    pub fn snapshot(&self) -> Result<Vec<OhlcvBarDB>> {
        let mut conn = get_connection(&self.pool)?;
        ohlcv_dsl::ohlcv
            .order((ohlcv_dsl::symbol.asc(), ohlcv_dsl::ts.asc()))
            .select(OhlcvBarDB::as_select())
            .load(&mut conn)
            .into_core()
    }
}
