//! [`MongoSink`]: one connection and one writer task per configured sink.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use bson::Document;
use k4_core::config::MongoSinkConfig;
use k4_core::queue::BatchReceiver;
use k4_core::types::EventKind;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::{DocumentStore, SinkModule};
use crate::store::MongoStore;
use crate::writer::{SinkHandle, SinkWriter};

/// MongoDB sink module.
///
/// `start` connects and spawns the writer on the queue's receiving half;
/// `stop` flips the writer's stop flag and waits for the writer to exit.
/// A writer waiting on an empty queue exits once every sender is dropped,
/// so callers drop the feed before stopping the sink.
pub struct MongoSink {
    name: String,
    config: MongoSinkConfig,
    rx: Option<BatchReceiver<Document>>,
    handle: Option<SinkHandle>,
    task: Option<JoinHandle<Result<u64>>>,
}

impl MongoSink {
    pub fn new(name: impl Into<String>, config: MongoSinkConfig, rx: BatchReceiver<Document>) -> Self {
        Self {
            name: name.into(),
            config,
            rx: Some(rx),
            handle: None,
            task: None,
        }
    }

    /// Spawn the writer task on `store`, consuming the queue's receiver.
    fn spawn_writer<S: DocumentStore + 'static>(&mut self, store: S) -> Result<()> {
        let rx = self
            .rx
            .take()
            .ok_or_else(|| anyhow!("[{}] already started", self.name))?;

        let writer = SinkWriter::new(self.name.clone(), self.config.kind, self.config.collection(), store);
        self.handle = Some(writer.handle());

        let name = self.name.clone();
        self.task = Some(tokio::spawn(async move {
            let result = writer.run(rx).await;
            if let Err(e) = &result {
                error!("[{name}] writer failed: {e:#}");
            }
            result
        }));
        Ok(())
    }
}

#[async_trait]
impl SinkModule for MongoSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> EventKind {
        self.config.kind
    }

    async fn start(&mut self) -> Result<()> {
        if self.rx.is_none() {
            return Err(anyhow!("[{}] already started", self.name));
        }

        let store = MongoStore::connect(&self.config)
            .await
            .with_context(|| format!("[{}] starting sink", self.name))?;
        self.spawn_writer(store)?;

        info!(
            "[{}] started (db={}, collection={})",
            self.name,
            self.config.db,
            self.config.collection()
        );
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(handle) = &self.handle {
            handle.stop();
        }
        let Some(task) = self.task.take() else {
            return Ok(());
        };

        // No timeout: an in-flight insert is always allowed to finish.
        match task.await {
            Ok(Ok(written)) => {
                info!("[{}] stopped ({written} documents written)", self.name);
                Ok(())
            }
            Ok(Err(e)) => Err(e.context(format!("[{}] writer", self.name))),
            Err(join_err) => Err(anyhow!("[{}] writer task panicked: {join_err}", self.name)),
        }
    }

    fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}
