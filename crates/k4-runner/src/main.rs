//! # k4-runner
//!
//! Main entry point for the MongoDB market data sinks.
//!
//! Loads a JSON configuration file, creates one feed + sink pair per
//! configured sink, then reads normalized events as newline-delimited JSON
//! (stdin or `--input`) and dispatches each to every feed of its kind.
//!
//! # Usage
//!
//! ```bash
//! k4-sink config.json --log-level info < events.ndjson
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use k4_core::error::K4Error;
use k4_core::feed::SinkFeed;
use k4_core::logging::{FileLog, init_logging};
use k4_core::time_util::now_secs;
use k4_core::types::MarketEvent;
use k4_mongo::SinkModule;
use k4_mongo::registry::{SinkPair, create_sinks};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// MongoDB Market Data Sink Runner.
#[derive(Parser)]
#[command(name = "k4-sink", about = "MongoDB Market Data Sink Runner")]
struct Cli {
    /// Configuration file path (JSON).
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Optional log directory for file output. Overrides `logging.log_path`.
    #[arg(long)]
    log_dir: Option<String>,

    /// Read events from this file instead of stdin.
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Seconds to wait for queued records to be written on shutdown.
    #[arg(long, default_value_t = 30)]
    drain_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration
    let config = k4_core::config::load_config(&cli.config)?;

    // 2. Initialize logging
    let module_name = config.module_name();
    let log_dir = cli.log_dir.clone().or_else(|| config.log_path());
    init_logging(
        &cli.log_level,
        log_dir.as_deref().map(|dir| FileLog {
            dir,
            prefix: &module_name,
            json: config.log_json(),
        }),
    );

    info!(
        "{module_name} starting, config={}, log_level={}, {} sink(s)",
        cli.config.display(),
        cli.log_level,
        config.sinks.len()
    );

    // 3. Create and start sinks
    let pairs = create_sinks(&config.sinks)?;
    let mut feeds = Vec::with_capacity(pairs.len());
    let mut modules: Vec<Box<dyn SinkModule>> = Vec::with_capacity(pairs.len());
    for SinkPair { feed, module } in pairs {
        feeds.push(feed);
        modules.push(module);
    }

    for module in &mut modules {
        module.start().await?;
        info!("sink '{}' started", module.name());
    }

    info!("all {} sink(s) started, press Ctrl+C to stop", modules.len());

    // 4. Dispatch events until EOF or shutdown signal
    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &cli.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("opening {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };
    let stats = tokio::select! {
        stats = dispatch(reader, &mut feeds) => stats?,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            DispatchStats::default()
        }
    };
    if stats.lines > 0 {
        info!("input finished: {} line(s), {} record(s) enqueued, {} rejected", stats.lines, stats.enqueued, stats.rejected);
    }

    // 5. Drain queues, then stop sinks
    if drain(&feeds, Duration::from_secs(cli.drain_timeout_secs)).await {
        debug!("all queues drained");
    }
    drop(feeds);

    for module in &mut modules {
        info!("stopping sink '{}'", module.name());
        if let Err(e) = module.stop().await {
            error!("error stopping '{}': {e:#}", module.name());
        }
    }

    info!("all sinks stopped, goodbye");
    Ok(())
}

#[derive(Debug, Default)]
struct DispatchStats {
    lines: u64,
    enqueued: u64,
    rejected: u64,
}

/// Read NDJSON events and offer each to the feeds of its kind.
///
/// Unparseable lines are logged and skipped. A feed whose queue has closed
/// (its writer stopped) is removed; dispatch ends when no feed remains.
async fn dispatch<R>(reader: R, feeds: &mut Vec<SinkFeed>) -> Result<DispatchStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut stats = DispatchStats::default();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        stats.lines += 1;
        let receipt = now_secs();

        let event: MarketEvent = match serde_json::from_str(line) {
            Ok(ev) => ev,
            Err(e) => {
                warn!("line {}: skipping unparseable event: {e}", stats.lines);
                stats.rejected += 1;
                continue;
            }
        };

        let mut closed = Vec::new();
        for (i, feed) in feeds.iter_mut().enumerate().filter(|(_, f)| f.kind() == event.kind()) {
            match feed.on_event(&event, receipt).await {
                Ok(n) => stats.enqueued += n as u64,
                Err(K4Error::QueueClosed) => {
                    error!("[{}] queue closed, dropping feed", feed.label());
                    closed.push(i);
                }
                Err(e) => {
                    warn!("[{}] rejected {event}: {e}", feed.label());
                    stats.rejected += 1;
                }
            }
        }
        for i in closed.into_iter().rev() {
            feeds.remove(i);
        }
        if feeds.is_empty() {
            error!("no sinks left accepting events");
            break;
        }
    }

    debug!("dispatch finished: {stats:?}");
    Ok(stats)
}

/// Wait for every feed's queue to be fully written.
///
/// The queues drain concurrently; `timeout` bounds the whole wait, not each
/// queue.
async fn drain(feeds: &[SinkFeed], timeout: Duration) -> bool {
    let mut joins = JoinSet::new();
    for feed in feeds {
        let pending = feed.sender().outstanding();
        if pending > 0 {
            info!("[{}] draining {pending} record(s)", feed.label());
        }
        let tx = feed.sender().clone();
        joins.spawn(async move { tx.join().await });
    }

    let all = async { while joins.join_next().await.is_some() {} };
    if tokio::time::timeout(timeout, all).await.is_ok() {
        return true;
    }
    for feed in feeds {
        let left = feed.sender().outstanding();
        if left > 0 {
            warn!("[{}] drain timed out, {left} record(s) not written", feed.label());
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use k4_core::config::MongoSinkConfig;
    use k4_core::queue::batch_queue;
    use k4_core::types::EventKind;

    use super::*;

    fn feed(kind: EventKind) -> (SinkFeed, k4_core::queue::BatchReceiver<bson::Document>) {
        let (tx, rx) = batch_queue(64, 64);
        let feed = SinkFeed::from_config(format!("test_{kind}"), &MongoSinkConfig::new(kind, "db"), tx).unwrap();
        (feed, rx)
    }

    #[tokio::test]
    async fn dispatches_by_kind() {
        let (trades, mut trades_rx) = feed(EventKind::Trades);
        let (ticker, _ticker_rx) = feed(EventKind::Ticker);
        let mut feeds = vec![trades, ticker];

        let input = concat!(
            r#"{"kind":"trades","exchange":"X","symbol":"BTC-USD","side":"buy","amount":"0.5","price":"30000","timestamp":1700000000.0}"#,
            "\n\n",
            "not json\n",
            r#"{"kind":"trades","exchange":"X","symbol":"BTC-USD","side":"sell","amount":"1","price":"30001"}"#,
            "\n",
        );
        let stats = dispatch(input.as_bytes(), &mut feeds).await.unwrap();
        assert_eq!(stats.lines, 3);
        assert_eq!(stats.enqueued, 2);
        assert_eq!(stats.rejected, 1);
        assert_eq!(feeds[1].sender().outstanding(), 0);

        let mut batch = trades_rx.next_batch().await.unwrap();
        let docs = batch.take();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].get_str("side").unwrap(), "buy");
        assert!(docs[1].contains_key("receipt_timestamp"));
    }

    #[tokio::test]
    async fn closed_queue_drops_feed() {
        let (trades, rx) = feed(EventKind::Trades);
        drop(rx);
        let mut feeds = vec![trades];
        let input = r#"{"kind":"trades","exchange":"X","symbol":"S","side":"buy","amount":"1","price":"1"}"#;
        dispatch(input.as_bytes(), &mut feeds).await.unwrap();
        assert!(feeds.is_empty());
    }

    #[tokio::test]
    async fn drain_is_bounded_once_for_all_queues() {
        // Three queues whose writers never pull: each stays outstanding.
        let mut held = Vec::new();
        let mut feeds = Vec::new();
        for _ in 0..3 {
            let (mut f, rx) = feed(EventKind::Trades);
            let input = r#"{"kind":"trades","exchange":"X","symbol":"S","side":"buy","amount":"1","price":"1"}"#;
            f.on_event(&serde_json::from_str(input).unwrap(), 1.0).await.unwrap();
            feeds.push(f);
            held.push(rx);
        }

        let started = std::time::Instant::now();
        assert!(!drain(&feeds, Duration::from_millis(200)).await);
        assert!(started.elapsed() < Duration::from_millis(500));
        assert!(feeds.iter().all(|f| f.sender().outstanding() == 1));
    }

    #[tokio::test]
    async fn drain_completes_when_writer_goes_away() {
        let (mut f, rx) = feed(EventKind::Trades);
        let input = r#"{"kind":"trades","exchange":"X","symbol":"S","side":"buy","amount":"1","price":"1"}"#;
        f.on_event(&serde_json::from_str(input).unwrap(), 1.0).await.unwrap();
        drop(rx);
        assert!(drain(&[f], Duration::from_secs(1)).await);
    }
}
