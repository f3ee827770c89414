//! Sink feeds: the callback side of a sink.
//!
//! A [`SinkFeed`] turns typed events into records and pushes them onto the
//! sink's queue. Admission depends on the sink's kind:
//!
//! | Kind                    | Admission                                          |
//! |-------------------------|----------------------------------------------------|
//! | funding, open interest  | one update per `snapshot_interval` seconds/symbol  |
//! | book (`snapshots_only`) | full snapshot record for every update              |
//! | book                    | every update, plus a snapshot every N deltas       |
//! | everything else         | every update                                       |
//!
//! Every record gets a `receipt_timestamp`; events without an exchange
//! timestamp get the receipt time as `timestamp` too.

use bson::{Bson, Document};
use tracing::trace;

use crate::config::MongoSinkConfig;
use crate::error::K4Error;
use crate::queue::QueueSender;
use crate::throttle::{IntervalThrottle, SnapshotCounter};
use crate::types::{EventKind, MarketEvent, NumericFormat, OrderBook};

/// Kind-specific admission state.
enum Admission {
    All,
    Interval(IntervalThrottle),
    Book { snapshots_only: bool, counter: SnapshotCounter },
}

/// Converts events of one kind into records and enqueues them.
pub struct SinkFeed {
    label: String,
    kind: EventKind,
    format: NumericFormat,
    admission: Admission,
    tx: QueueSender<Document>,
}

impl SinkFeed {
    pub fn new(
        label: impl Into<String>,
        kind: EventKind,
        format: NumericFormat,
        snapshot_interval: Option<u64>,
        snapshots_only: bool,
        tx: QueueSender<Document>,
    ) -> Self {
        let interval = snapshot_interval.or(kind.default_snapshot_interval()).unwrap_or(0);
        let admission = match kind {
            EventKind::Funding | EventKind::OpenInterest => Admission::Interval(IntervalThrottle::new(interval)),
            EventKind::Book => Admission::Book {
                snapshots_only,
                counter: SnapshotCounter::new(interval),
            },
            _ => Admission::All,
        };
        Self {
            label: label.into(),
            kind,
            format,
            admission,
            tx,
        }
    }

    /// Build a feed from a validated sink config.
    pub fn from_config(label: impl Into<String>, cfg: &MongoSinkConfig, tx: QueueSender<Document>) -> Result<Self, K4Error> {
        Ok(Self::new(
            label,
            cfg.kind,
            cfg.numeric_format()?,
            cfg.effective_snapshot_interval(),
            cfg.snapshots_only,
            tx,
        ))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// The queue this feed writes to.
    pub fn sender(&self) -> &QueueSender<Document> {
        &self.tx
    }

    /// Offer one event received at `receipt_timestamp` (epoch seconds).
    ///
    /// Returns the number of records enqueued (0, 1 or 2).
    pub async fn on_event(&mut self, event: &MarketEvent, receipt_timestamp: f64) -> Result<usize, K4Error> {
        if event.kind() != self.kind {
            return Err(K4Error::KindMismatch {
                expected: self.kind,
                got: event.kind(),
            });
        }

        let records = match (&mut self.admission, event) {
            (Admission::Book { snapshots_only, counter }, MarketEvent::Book(book)) => {
                book_records(book, *snapshots_only, counter, &self.format)
            }
            (Admission::Interval(throttle), _) => {
                if throttle.check_and_update(event.exchange(), event.symbol(), receipt_timestamp) {
                    vec![event.to_document(&self.format)]
                } else {
                    trace!("[{}] throttled {}", self.label, event);
                    Vec::new()
                }
            }
            _ => vec![event.to_document(&self.format)],
        };

        let n = records.len();
        for mut record in records {
            stamp(&mut record, event.timestamp(), receipt_timestamp);
            self.tx.put(record).await?;
        }
        Ok(n)
    }
}

fn book_records(
    book: &OrderBook,
    snapshots_only: bool,
    counter: &mut SnapshotCounter,
    fmt: &NumericFormat,
) -> Vec<Document> {
    if snapshots_only {
        return vec![book.snapshot_document(fmt)];
    }
    let mut out = vec![book.to_document(fmt)];
    if book.is_delta() && counter.record_delta(&book.exchange, &book.symbol) {
        out.push(book.snapshot_document(fmt));
    }
    out
}

fn stamp(record: &mut Document, timestamp: Option<f64>, receipt_timestamp: f64) {
    if timestamp.is_none() {
        record.insert("timestamp", Bson::Double(receipt_timestamp));
    }
    record.insert("receipt_timestamp", Bson::Double(receipt_timestamp));
}
