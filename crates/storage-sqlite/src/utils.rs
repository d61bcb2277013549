//! Batch sizing helpers for SQLite statements.

/// SQLite's default limit on bound parameters per statement
/// (`SQLITE_MAX_VARIABLE_NUMBER` on older builds).
pub const SQLITE_MAX_PARAMS: usize = 999;

/// Columns bound per staged row.
const STAGING_COLUMNS: usize = 7;

/// Rows per multi-row `INSERT` into the staging table.
pub const STAGING_BATCH_ROWS: usize = SQLITE_MAX_PARAMS / STAGING_COLUMNS;

/// Staged rows read per page while merging.
pub const MERGE_PAGE_ROWS: i64 = 5_000;

/// Chunk a slice into batches that fit a single staging insert.
pub fn chunk_for_staging<T>(items: &[T]) -> impl Iterator<Item = &[T]> {
    items.chunks(STAGING_BATCH_ROWS)
}
