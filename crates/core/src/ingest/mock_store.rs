//! In-memory bar store used by pipeline and session tests.
//!
//! Staging is a plain vector. The merge works on a copy of the durable map and
//! swaps it in only when every row succeeded, which mirrors a transaction.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::io::Read;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};

use super::bar_reader::BarReader;
use super::ingest_model::{MergeSummary, OhlcvBar, RawBar};
use super::ingest_traits::{BarStoreConnection, BarStoreConnector};
use crate::errors::{DatabaseError, Result};
use crate::symbols::SymbolToken;

#[derive(Default)]
struct MockState {
    staging: Vec<RawBar>,
    durable: BTreeMap<(String, NaiveDateTime), OhlcvBar>,
    connects: usize,
    open_connections: usize,
    fail_connect: bool,
}

#[derive(Clone, Default)]
pub(crate) struct MockBarStore {
    state: Arc<Mutex<MockState>>,
    merge_gate: Arc<Mutex<Option<Receiver<()>>>>,
}

impl MockBarStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_fail_connect(&self, fail: bool) {
        self.state.lock().unwrap().fail_connect = fail;
    }

    /// Makes the next merge wait until the returned sender fires (or drops).
    pub(crate) fn hold_next_merge(&self) -> Sender<()> {
        let (tx, rx) = channel();
        *self.merge_gate.lock().unwrap() = Some(rx);
        tx
    }

    pub(crate) fn durable_bars(&self) -> Vec<OhlcvBar> {
        self.state.lock().unwrap().durable.values().cloned().collect()
    }

    pub(crate) fn durable_count(&self) -> usize {
        self.state.lock().unwrap().durable.len()
    }

    pub(crate) fn staged_count(&self) -> usize {
        self.state.lock().unwrap().staging.len()
    }

    pub(crate) fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    pub(crate) fn open_connections(&self) -> usize {
        self.state.lock().unwrap().open_connections
    }
}

impl BarStoreConnector for MockBarStore {
    fn connect(&self) -> Result<Box<dyn BarStoreConnection>> {
        let mut state = self.state.lock().unwrap();
        if state.fail_connect {
            return Err(DatabaseError::ConnectionFailed("mock store is offline".to_string()).into());
        }
        state.connects += 1;
        state.open_connections += 1;
        Ok(Box::new(MockConnection {
            store: self.clone(),
        }))
    }
}

struct MockConnection {
    store: MockBarStore,
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.store.state.lock().unwrap().open_connections -= 1;
    }
}

impl BarStoreConnection for MockConnection {
    fn server_version(&mut self) -> Result<String> {
        Ok("MockStore 1.0".to_string())
    }

    fn prepare_staging(&mut self) -> Result<()> {
        self.store.state.lock().unwrap().staging.clear();
        Ok(())
    }

    fn copy_into_staging(&mut self, source: &mut dyn Read, has_header: bool) -> Result<u64> {
        let mut reader = BarReader::new(source, has_header);
        let mut rows = 0;
        while let Some(bar) = reader.next_bar()? {
            self.store.state.lock().unwrap().staging.push(bar);
            rows += 1;
        }
        Ok(rows)
    }

    fn merge_staging(&mut self, symbol: &SymbolToken) -> Result<MergeSummary> {
        let gate = self.store.merge_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.recv();
        }

        let mut state = self.store.state.lock().unwrap();
        let mut working = state.durable.clone();
        let mut summary = MergeSummary::default();
        for raw in &state.staging {
            let bar = OhlcvBar::from_staged(symbol, raw)?;
            summary.processed_rows += 1;
            let key = (bar.symbol.to_string(), bar.ts);
            if !working.contains_key(&key) {
                working.insert(key, bar);
                summary.inserted_rows += 1;
            }
        }
        state.durable = working;
        Ok(summary)
    }
}
