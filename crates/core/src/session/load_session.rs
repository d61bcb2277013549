use chrono::{DateTime, Utc};
use log::{error, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use uuid::Uuid;

use crate::constants::LOAD_WORKER_THREAD_NAME;
use crate::errors::{Error, Result};
use crate::ingest::{BarStoreConnector, IngestPipeline, LoadOutcome, LoadRequest};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::symbols::SymbolToken;

/// Holds the session's in-flight flag and clears it when dropped.
struct FlightGuard {
    flag: Arc<AtomicBool>,
}

impl FlightGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                flag: Arc::clone(flag),
            })
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Execution context of one load: its id, the request and the sink its
/// progress goes to. The result is the [`LoadOutcome`] returned by the worker.
#[derive(Clone)]
pub struct LoadSession {
    pub id: Uuid,
    pub request: LoadRequest,
    pub started_at: DateTime<Utc>,
    pub sink: Arc<dyn ProgressSink>,
}

impl LoadSession {
    fn new(request: LoadRequest, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            started_at: Utc::now(),
            sink,
        }
    }

    /// Runs the load on the calling thread.
    fn run(&self, pipeline: &IngestPipeline) -> LoadOutcome {
        let outcome = pipeline.load(&self.request, self.sink.as_ref());
        info!(
            "Load {} ended after {} ms",
            self.id,
            (Utc::now() - self.started_at).num_milliseconds()
        );
        outcome
    }
}

/// Handle to a load running on its worker thread.
pub struct LoadHandle {
    id: Uuid,
    symbol: SymbolToken,
    worker: JoinHandle<LoadOutcome>,
}

impl LoadHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn symbol(&self) -> &SymbolToken {
        &self.symbol
    }

    /// Whether the worker has produced its outcome.
    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Blocks until the load ends and returns its outcome.
    pub fn join(self) -> Result<LoadOutcome> {
        self.worker
            .join()
            .map_err(|_| Error::Unexpected(format!("load worker {} panicked", self.id)))
    }
}

/// Coordinates loads against one bar store.
///
/// At most one load runs at a time. A request made while a load is in flight
/// is rejected with [`Error::LoadInProgress`]; it is never queued.
pub struct IngestSession {
    connector: Arc<dyn BarStoreConnector>,
    pipeline: Arc<IngestPipeline>,
    sink: Arc<dyn ProgressSink>,
    in_flight: Arc<AtomicBool>,
}

impl IngestSession {
    pub fn new(connector: Arc<dyn BarStoreConnector>, sink: Arc<dyn ProgressSink>) -> Self {
        let pipeline = Arc::new(IngestPipeline::new(Arc::clone(&connector)));
        Self {
            connector,
            pipeline,
            sink,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a load currently holds the session.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Starts `request` on a dedicated worker thread.
    pub fn start_load(&self, request: LoadRequest) -> Result<LoadHandle> {
        let guard = FlightGuard::acquire(&self.in_flight).ok_or_else(|| {
            info!(
                "Rejected load of {}: another load is running",
                request.file_path.display()
            );
            Error::LoadInProgress
        })?;

        let session = LoadSession::new(request, Arc::clone(&self.sink));
        let id = session.id;
        let symbol = session.request.symbol.clone();
        let pipeline = Arc::clone(&self.pipeline);

        info!("Load {} accepted for {}", id, symbol);

        // The guard moves into the worker; if spawning fails the closure is
        // dropped here and the flag is cleared with it.
        let worker = thread::Builder::new()
            .name(LOAD_WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                let _guard = guard;
                session.run(&pipeline)
            })
            .map_err(|e| {
                error!("Failed to spawn load worker: {}", e);
                Error::Unexpected(format!("failed to spawn load worker: {}", e))
            })?;

        Ok(LoadHandle { id, symbol, worker })
    }

    /// Starts `request` and waits for it.
    pub fn run_load(&self, request: LoadRequest) -> Result<LoadOutcome> {
        self.start_load(request)?.join()
    }

    /// Opens a connection, runs the store's probe and releases it.
    pub fn check_connection(&self) -> Result<String> {
        self.sink.emit(ProgressEvent::ConnectionCheckStarted);

        let result = self
            .connector
            .connect()
            .and_then(|mut conn| conn.server_version());

        match &result {
            Ok(server) => {
                info!("Connection check succeeded: {}", server);
                self.sink.emit(ProgressEvent::ConnectionVerified {
                    server: server.clone(),
                });
            }
            Err(e) => {
                error!("Connection check failed: {}", e);
                self.sink.emit(ProgressEvent::ConnectionFailed {
                    reason: e.to_string(),
                });
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::mock_store::MockBarStore;
    use crate::ingest::LoadPhase;
    use crate::progress::{progress_channel, MockProgressSink, NoOpProgressSink};
    use crate::symbols::SymbolSource;
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    const THREE_BARS: &str = "2024.01.02,00:00,1.1,1.2,1.0,1.15,10\n\
                              2024.01.02,00:01,1.1,1.2,1.0,1.15,11\n\
                              2024.01.02,00:02,1.1,1.2,1.0,1.15,12\n";

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::File::create(&path)
            .unwrap()
            .write_all(contents.as_bytes())
            .unwrap();
        path
    }

    fn request(path: &Path) -> LoadRequest {
        LoadRequest::new(path, &SymbolSource::InferFromFile, false).unwrap()
    }

    fn session(store: &MockBarStore) -> IngestSession {
        IngestSession::new(Arc::new(store.clone()), Arc::new(NoOpProgressSink))
    }

    #[test]
    fn test_second_load_rejected_while_first_in_flight() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "EURUSD.csv", THREE_BARS);
        let store = MockBarStore::new();
        let release = store.hold_next_merge();
        let session = session(&store);

        let first = session.start_load(request(&path)).unwrap();
        assert!(session.is_busy());

        let second = session.start_load(request(&path));
        assert!(matches!(second, Err(Error::LoadInProgress)));

        release.send(()).unwrap();
        let outcome = first.join().unwrap();
        assert_eq!(
            outcome,
            LoadOutcome::Completed {
                staged_rows: 3,
                inserted_rows: 3,
                skipped_rows: 0
            }
        );
        assert!(!session.is_busy());
        assert_eq!(store.durable_count(), 3);
    }

    #[test]
    fn test_session_accepts_new_load_after_completion() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "EURUSD.csv", THREE_BARS);
        let store = MockBarStore::new();
        let session = session(&store);

        assert_eq!(session.run_load(request(&path)).unwrap().inserted_rows(), 3);
        let again = session.run_load(request(&path)).unwrap();
        assert_eq!(
            again,
            LoadOutcome::Completed {
                staged_rows: 3,
                inserted_rows: 0,
                skipped_rows: 3
            }
        );
    }

    #[test]
    fn test_flag_released_after_failed_load() {
        let dir = TempDir::new().unwrap();
        let broken = write_file(&dir, "EURUSD.csv", "2024.01.02,00:00,1,1\n");
        let store = MockBarStore::new();
        let session = session(&store);

        let outcome = session.run_load(request(&broken)).unwrap();
        assert!(matches!(
            outcome,
            LoadOutcome::Failed {
                phase: LoadPhase::Stage,
                ..
            }
        ));
        assert!(!session.is_busy());
        assert!(session.start_load(request(&broken)).is_ok());
    }

    #[test]
    fn test_handle_reports_symbol_and_progress_reaches_feed() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "gbpusd_D1.csv", THREE_BARS);
        let store = MockBarStore::new();
        let (sink, mut feed) = progress_channel();
        let session = IngestSession::new(Arc::new(store.clone()), Arc::new(sink));

        let handle = session.start_load(request(&path)).unwrap();
        assert_eq!(handle.symbol().as_str(), "GBPUSD");
        handle.join().unwrap();

        let events: Vec<ProgressEvent> = feed.drain().into_iter().map(|m| m.event).collect();
        assert!(matches!(
            events.first(),
            Some(ProgressEvent::LoadStarted { .. })
        ));
        assert!(matches!(
            events.last(),
            Some(ProgressEvent::LoadCompleted { inserted: 3, .. })
        ));
    }

    #[test]
    fn test_load_session_reports_to_its_own_sink() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "EURUSD.csv", THREE_BARS);
        let store = MockBarStore::new();
        let pipeline = IngestPipeline::new(Arc::new(store.clone()));
        let sink = MockProgressSink::new();

        let session = LoadSession::new(request(&path), Arc::new(sink.clone()));
        assert_eq!(session.request.symbol.as_str(), "EURUSD");
        assert!(session.started_at <= Utc::now());

        let outcome = session.run(&pipeline);
        assert_eq!(outcome.inserted_rows(), 3);
        assert!(matches!(
            sink.events().last(),
            Some(ProgressEvent::LoadCompleted { inserted: 3, .. })
        ));
    }

    #[test]
    fn test_check_connection() {
        let store = MockBarStore::new();
        let sink = MockProgressSink::new();
        let session = IngestSession::new(Arc::new(store.clone()), Arc::new(sink.clone()));

        assert_eq!(session.check_connection().unwrap(), "MockStore 1.0");
        assert_eq!(store.open_connections(), 0);
        assert_eq!(
            sink.events(),
            vec![
                ProgressEvent::ConnectionCheckStarted,
                ProgressEvent::ConnectionVerified {
                    server: "MockStore 1.0".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_check_connection_failure() {
        let store = MockBarStore::new();
        store.set_fail_connect(true);
        let sink = MockProgressSink::new();
        let session = IngestSession::new(Arc::new(store), Arc::new(sink.clone()));

        assert!(session.check_connection().is_err());
        assert!(matches!(
            sink.events().last(),
            Some(ProgressEvent::ConnectionFailed { .. })
        ));
    }
}
