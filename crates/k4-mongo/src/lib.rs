//! # k4-mongo
//!
//! MongoDB sinks for normalized market data.
//!
//! ## Architecture
//!
//! Each configured sink owns one batch queue, one [`feed`](k4_core::feed)
//! on the producer side and one [`writer::SinkWriter`] on the consumer side.
//! The writer formats every record of a batch with the kind's
//! [`format::RecordFormatter`] and writes the whole batch with a single
//! bulk insert into the kind's collection.
//!
//! ```text
//! SinkFeed ──put()──► batch queue ──next_batch()──► SinkWriter ──insert_many──► db.<collection>
//! ```
//!
//! - [`format`]: per-kind record formatting (timestamps, book reshape)
//! - [`store`]: MongoDB connection and bulk insert
//! - [`writer`]: the batch/format/insert loop
//! - [`sink`]: [`SinkModule`] wrapper owning connection and writer task
//! - [`registry`]: builds feed + sink pairs from config

pub mod format;
pub mod registry;
pub mod sink;
pub mod store;
pub mod writer;

use anyhow::Result;
use async_trait::async_trait;
use bson::Document;
use k4_core::types::EventKind;

/// Destination for formatted batches.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert `docs` into `collection` as one bulk operation.
    async fn insert_many(&self, collection: &str, docs: Vec<Document>) -> Result<()>;
}

/// Trait implemented by all sink modules.
///
/// Only `Send` is required (not `Sync`) because modules are accessed
/// sequentially by the runner, never concurrently.
#[async_trait]
pub trait SinkModule: Send {
    /// Human-readable module name.
    fn name(&self) -> &str;
    /// Event kind this sink stores.
    fn kind(&self) -> EventKind;
    /// Connect and spawn the writer.
    async fn start(&mut self) -> Result<()>;
    /// Stop the writer and wait for it to exit.
    async fn stop(&mut self) -> Result<()>;
    /// Whether the writer task is still alive.
    fn is_running(&self) -> bool;
}
