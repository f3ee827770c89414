//! Sink registry: factory for feed + sink pairs from config.

use anyhow::{Context, Result};
use bson::Document;
use k4_core::config::MongoSinkConfig;
use k4_core::feed::SinkFeed;
use k4_core::queue::batch_queue;

use crate::SinkModule;
use crate::sink::MongoSink;

/// A configured sink: the feed side for the runner, the module side for
/// lifecycle management. Both share one queue.
pub struct SinkPair {
    pub feed: SinkFeed,
    pub module: Box<dyn SinkModule>,
}

/// Module name for sink `idx`, e.g. `"mongo_trades"` or `"mongo_book#2"`.
pub fn sink_name(idx: usize, config: &MongoSinkConfig, total_of_collection: usize) -> String {
    if total_of_collection > 1 {
        format!("mongo_{}#{idx}", config.collection())
    } else {
        format!("mongo_{}", config.collection())
    }
}

/// Validate `config` and wire a queue between a new feed and a new sink.
pub fn create_sink(name: impl Into<String>, config: &MongoSinkConfig) -> Result<SinkPair> {
    let name = name.into();
    config.validate().with_context(|| format!("[{name}] invalid config"))?;

    let (tx, rx) = batch_queue::<Document>(config.effective_queue_capacity(), config.effective_max_batch());
    let feed = SinkFeed::from_config(name.clone(), config, tx).with_context(|| format!("[{name}] building feed"))?;
    let module = Box::new(MongoSink::new(name, config.clone(), rx));

    Ok(SinkPair { feed, module })
}

/// Create one pair per config entry, named by collection.
pub fn create_sinks(configs: &[MongoSinkConfig]) -> Result<Vec<SinkPair>> {
    configs
        .iter()
        .enumerate()
        .map(|(idx, cfg)| {
            let same = configs.iter().filter(|c| c.collection() == cfg.collection()).count();
            create_sink(sink_name(idx, cfg, same), cfg)
        })
        .collect()
}
