//! The sink writer loop: acquire a batch, format it, bulk-insert it.
//!
//! # State machine
//!
//! ```text
//! Running ──SinkHandle::stop()──► Stopped
//!    │                               ▲
//!    └── queue closed / error ───────┘
//! ```
//!
//! The stop flag is checked at the top of each iteration only. A wait for the
//! next batch or an in-flight insert is never interrupted; the batch being
//! processed is always finished (or failed) before the loop exits.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use bson::Document;
use k4_core::queue::BatchReceiver;
use k4_core::types::EventKind;
use tracing::{debug, info};

use crate::DocumentStore;
use crate::format::{RecordFormatter, formatter_for};

/// Lifecycle state of a writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    Running,
    Stopped,
}

/// Shared stop flag for a writer. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SinkHandle {
    running: Arc<AtomicBool>,
}

impl SinkHandle {
    fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Request the writer to stop after its current iteration.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn state(&self) -> SinkState {
        if self.running.load(Ordering::Acquire) {
            SinkState::Running
        } else {
            SinkState::Stopped
        }
    }
}

/// Drains one queue into one collection.
pub struct SinkWriter<S> {
    label: String,
    collection: String,
    store: S,
    formatter: RecordFormatter,
    handle: SinkHandle,
}

impl<S: DocumentStore> SinkWriter<S> {
    /// Writer for `kind`, using that kind's formatter.
    pub fn new(label: impl Into<String>, kind: EventKind, collection: impl Into<String>, store: S) -> Self {
        Self::with_formatter(label, collection, store, formatter_for(kind))
    }

    pub fn with_formatter(
        label: impl Into<String>,
        collection: impl Into<String>,
        store: S,
        formatter: RecordFormatter,
    ) -> Self {
        Self {
            label: label.into(),
            collection: collection.into(),
            store,
            formatter,
            handle: SinkHandle::new(),
        }
    }

    pub fn handle(&self) -> SinkHandle {
        self.handle.clone()
    }

    /// Run until stopped, the queue closes, or a batch fails.
    ///
    /// Returns the number of documents written. A malformed record or a
    /// failed insert ends the loop with an error; the failed batch is
    /// released and not retried.
    pub async fn run(self, mut rx: BatchReceiver<Document>) -> Result<u64> {
        info!("[{}] writer started (collection={})", self.label, self.collection);
        let result = self.run_loop(&mut rx).await;
        self.handle.stop();
        match &result {
            Ok(written) => info!("[{}] writer stopped, {written} documents written", self.label),
            Err(e) => debug!("[{}] writer exiting on error: {e:#}", self.label),
        }
        result
    }

    async fn run_loop(&self, rx: &mut BatchReceiver<Document>) -> Result<u64> {
        let mut written = 0u64;

        while self.handle.state() == SinkState::Running {
            let Some(mut batch) = rx.next_batch().await else {
                debug!("[{}] queue closed", self.label);
                break;
            };

            let docs = batch
                .take()
                .into_iter()
                .map(|record| (self.formatter)(record))
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| format!("[{}] formatting batch of {}", self.label, batch.len()))?;

            let n = docs.len();
            self.store.insert_many(&self.collection, docs).await?;
            written += n as u64;
            debug!("[{}] inserted {n} documents into {}", self.label, self.collection);
        }

        Ok(written)
    }
}
