//! Progress sink trait and implementations.

use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, error::TryRecvError};

use super::{ProgressEvent, ProgressMessage};

/// Receives progress events from a running load.
///
/// `emit()` must be fast and must never block the load. Failure to deliver is
/// ignored: progress is advisory.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Discards every event.
#[derive(Clone, Default)]
pub struct NoOpProgressSink;

impl ProgressSink for NoOpProgressSink {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Producer side of the progress channel. Unbounded, so `emit` never waits.
#[derive(Clone)]
pub struct ChannelProgressSink {
    tx: mpsc::UnboundedSender<ProgressMessage>,
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: ProgressEvent) {
        // The feed may already be gone (front end closed); the load carries on.
        let _ = self.tx.send(ProgressMessage::now(event));
    }
}

/// Consumer side of the progress channel, drained by polling.
pub struct ProgressFeed {
    rx: mpsc::UnboundedReceiver<ProgressMessage>,
}

impl ProgressFeed {
    /// Returns every message produced since the last drain, in order.
    pub fn drain(&mut self) -> Vec<ProgressMessage> {
        let mut messages = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(message) => messages.push(message),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        messages
    }
}

/// Creates a connected sink/feed pair.
pub fn progress_channel() -> (ChannelProgressSink, ProgressFeed) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelProgressSink { tx }, ProgressFeed { rx })
}

/// Collects events in memory, for tests.
#[derive(Clone, Default)]
pub struct MockProgressSink {
    events: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl MockProgressSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().unwrap().is_empty()
    }
}

impl ProgressSink for MockProgressSink {
    fn emit(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}
