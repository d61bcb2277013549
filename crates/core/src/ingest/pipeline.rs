//! The staged load: bulk copy into the holding table, then a deduplicating
//! merge into the durable table.

use log::{debug, error, info, warn};
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use super::ingest_model::{LoadOutcome, LoadPhase, LoadRequest, MergeSummary};
use super::ingest_traits::{BarStoreConnection, BarStoreConnector};
use crate::constants::COPY_CHUNK_SIZE;
use crate::errors::Error;
use crate::progress::{ProgressEvent, ProgressSink};

struct PhaseFailure {
    phase: LoadPhase,
    error: Error,
}

impl PhaseFailure {
    fn at(phase: LoadPhase) -> impl FnOnce(Error) -> Self {
        move |error| Self { phase, error }
    }
}

/// Runs loads against a [`BarStoreConnector`].
pub struct IngestPipeline {
    connector: Arc<dyn BarStoreConnector>,
}

impl IngestPipeline {
    pub fn new(connector: Arc<dyn BarStoreConnector>) -> Self {
        Self { connector }
    }

    /// Loads one file and returns its terminal outcome.
    ///
    /// Never returns an error: every failure is reported as
    /// [`LoadOutcome::Failed`] with the phase it happened in. The durable table
    /// is only changed by a committed merge.
    pub fn load(&self, request: &LoadRequest, sink: &dyn ProgressSink) -> LoadOutcome {
        info!(
            "Starting load of {} for {} (header: {})",
            request.file_path.display(),
            request.symbol,
            request.has_header
        );
        sink.emit(ProgressEvent::LoadStarted {
            file_path: request.file_path.clone(),
            symbol: request.symbol.to_string(),
            has_header: request.has_header,
        });

        if !request.symbol.is_known() {
            warn!("{} is not a known symbol, loading anyway", request.symbol);
            sink.emit(ProgressEvent::UnknownSymbol {
                symbol: request.symbol.to_string(),
            });
        }

        match self.run(request, sink) {
            Ok((staged_rows, summary)) => {
                info!(
                    "Load of {} finished: {} staged, {} inserted, {} skipped",
                    request.symbol,
                    staged_rows,
                    summary.inserted_rows,
                    summary.skipped_rows()
                );
                sink.emit(ProgressEvent::LoadCompleted {
                    symbol: request.symbol.to_string(),
                    inserted: summary.inserted_rows,
                });
                LoadOutcome::completed(staged_rows, summary)
            }
            Err(PhaseFailure { phase, error }) => {
                error!("Load of {} failed during {}: {}", request.symbol, phase, error);
                let reason = error.to_string();
                sink.emit(ProgressEvent::LoadFailed {
                    phase,
                    reason: reason.clone(),
                });
                LoadOutcome::failed(phase, reason)
            }
        }
    }

    fn run(
        &self,
        request: &LoadRequest,
        sink: &dyn ProgressSink,
    ) -> std::result::Result<(u64, MergeSummary), PhaseFailure> {
        let file = File::open(&request.file_path)
            .map_err(Error::from)
            .map_err(PhaseFailure::at(LoadPhase::Open))?;
        let mut source = BufReader::with_capacity(COPY_CHUNK_SIZE, file);

        // Dropping `conn` on any return path hands the connection back.
        let mut conn = self
            .connector
            .connect()
            .map_err(PhaseFailure::at(LoadPhase::Connect))?;

        let staged_rows = stage(conn.as_mut(), &mut source, request.has_header, sink)
            .map_err(PhaseFailure::at(LoadPhase::Stage))?;

        sink.emit(ProgressEvent::MergeStarted {
            symbol: request.symbol.to_string(),
        });
        let summary = conn
            .merge_staging(&request.symbol)
            .map_err(PhaseFailure::at(LoadPhase::Merge))?;
        sink.emit(ProgressEvent::MergeComplete {
            inserted: summary.inserted_rows,
            skipped: summary.skipped_rows(),
        });

        Ok((staged_rows, summary))
    }
}

fn stage(
    conn: &mut dyn BarStoreConnection,
    source: &mut BufReader<File>,
    has_header: bool,
    sink: &dyn ProgressSink,
) -> crate::Result<u64> {
    conn.prepare_staging()?;
    sink.emit(ProgressEvent::StagingPrepared);

    sink.emit(ProgressEvent::CopyStarted);
    let rows = conn.copy_into_staging(source, has_header)?;
    debug!("Staged {} rows", rows);
    sink.emit(ProgressEvent::StagingComplete { rows });

    Ok(rows)
}
