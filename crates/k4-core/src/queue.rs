//! Bounded record queue with scoped batch acquisition.
//!
//! Feeds push records through a [`QueueSender`]; a sink writer pulls them out
//! in batches via [`BatchReceiver::next_batch`]. A batch is a guard: the
//! records count as outstanding until the [`Batch`] is dropped, whether the
//! write succeeded or not. [`QueueSender::join`] waits for the outstanding
//! count to reach zero, which the runner uses to drain queues on shutdown.
//!
//! ```text
//! feed ──put()──► [mpsc, bounded] ──next_batch()──► Batch guard ──drop──► released
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Notify, mpsc};

use crate::error::K4Error;

/// Default channel capacity (records).
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Default upper bound on records per batch.
pub const DEFAULT_MAX_BATCH: usize = 1_000;

/// Count of records enqueued but not yet released.
#[derive(Default)]
struct Outstanding {
    count: AtomicUsize,
    idle: Notify,
}

impl Outstanding {
    fn release(&self, n: usize) {
        if n == 0 {
            return;
        }
        if self.count.fetch_sub(n, Ordering::AcqRel) == n {
            self.idle.notify_waiters();
        }
    }
}

/// Create a queue holding at most `capacity` records, yielding batches of at
/// most `max_batch` records.
pub fn batch_queue<T>(capacity: usize, max_batch: usize) -> (QueueSender<T>, BatchReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let outstanding = Arc::new(Outstanding::default());
    (
        QueueSender {
            tx,
            outstanding: Arc::clone(&outstanding),
        },
        BatchReceiver {
            rx,
            outstanding,
            max_batch: max_batch.max(1),
        },
    )
}

// ---------------------------------------------------------------------------
// QueueSender
// ---------------------------------------------------------------------------

/// Producer half. Cheap to clone.
pub struct QueueSender<T> {
    tx: mpsc::Sender<T>,
    outstanding: Arc<Outstanding>,
}

impl<T> Clone for QueueSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            outstanding: Arc::clone(&self.outstanding),
        }
    }
}

impl<T> QueueSender<T> {
    /// Enqueue one record, waiting for space if the queue is full.
    ///
    /// The record only counts as outstanding once a slot is reserved, so a
    /// `put` cancelled while waiting for space leaves the count untouched.
    pub async fn put(&self, item: T) -> Result<(), K4Error> {
        let permit = self.tx.reserve().await.map_err(|_| K4Error::QueueClosed)?;
        self.outstanding.count.fetch_add(1, Ordering::AcqRel);
        permit.send(item);
        Ok(())
    }

    /// Records enqueued and not yet released by the writer.
    pub fn outstanding(&self) -> usize {
        self.outstanding.count.load(Ordering::Acquire)
    }

    /// Wait until every enqueued record has been released.
    ///
    /// Returns immediately if nothing is outstanding. Records still queued
    /// when the receiver is dropped are released with it. A live receiver
    /// that stops pulling keeps this pending, so callers should bound it
    /// with a timeout.
    pub async fn join(&self) {
        loop {
            let idle = self.outstanding.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();
            if self.outstanding() == 0 {
                return;
            }
            idle.await;
        }
    }
}

// ---------------------------------------------------------------------------
// BatchReceiver
// ---------------------------------------------------------------------------

/// Consumer half, owned by exactly one writer.
pub struct BatchReceiver<T> {
    rx: mpsc::Receiver<T>,
    outstanding: Arc<Outstanding>,
    max_batch: usize,
}

impl<T> BatchReceiver<T> {
    /// Wait for the next record, then take whatever else is already queued
    /// (up to `max_batch` in total).
    ///
    /// Returns `None` once every sender is dropped and the queue is empty.
    pub async fn next_batch(&mut self) -> Option<Batch<T>> {
        let first = self.rx.recv().await?;
        let mut items = Vec::with_capacity(self.rx.len().min(self.max_batch - 1) + 1);
        items.push(first);
        while items.len() < self.max_batch {
            match self.rx.try_recv() {
                Ok(item) => items.push(item),
                Err(_) => break,
            }
        }
        Some(Batch {
            acquired: items.len(),
            items,
            outstanding: Arc::clone(&self.outstanding),
        })
    }
}

impl<T> Drop for BatchReceiver<T> {
    fn drop(&mut self) {
        self.rx.close();
        let mut unreceived = 0;
        while self.rx.try_recv().is_ok() {
            unreceived += 1;
        }
        self.outstanding.release(unreceived);
    }
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// A batch of records held by the writer. Released on drop.
pub struct Batch<T> {
    items: Vec<T>,
    acquired: usize,
    outstanding: Arc<Outstanding>,
}

impl<T> Batch<T> {
    /// Number of records acquired in this batch.
    pub fn len(&self) -> usize {
        self.acquired
    }

    pub fn is_empty(&self) -> bool {
        self.acquired == 0
    }

    /// Move the records out. The batch stays acquired until dropped.
    pub fn take(&mut self) -> Vec<T> {
        std::mem::take(&mut self.items)
    }
}

impl<T> Drop for Batch<T> {
    fn drop(&mut self) {
        self.outstanding.release(self.acquired);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn drains_everything_available() {
        let (tx, mut rx) = batch_queue::<u32>(16, 100);
        for i in 0..5 {
            tx.put(i).await.unwrap();
        }
        let mut batch = rx.next_batch().await.unwrap();
        assert_eq!(batch.len(), 5);
        assert_eq!(batch.take(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn respects_max_batch() {
        let (tx, mut rx) = batch_queue::<u32>(16, 3);
        for i in 0..5 {
            tx.put(i).await.unwrap();
        }
        assert_eq!(rx.next_batch().await.unwrap().len(), 3);
        assert_eq!(rx.next_batch().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn outstanding_released_on_drop() {
        let (tx, mut rx) = batch_queue::<u32>(16, 100);
        tx.put(1).await.unwrap();
        tx.put(2).await.unwrap();
        assert_eq!(tx.outstanding(), 2);

        let mut batch = rx.next_batch().await.unwrap();
        let _records = batch.take();
        assert_eq!(tx.outstanding(), 2); // still held
        drop(batch);
        assert_eq!(tx.outstanding(), 0);
    }

    #[tokio::test]
    async fn join_waits_for_release() {
        let (tx, mut rx) = batch_queue::<u32>(16, 100);
        tx.put(1).await.unwrap();

        let joiner = {
            let tx = tx.clone();
            tokio::spawn(async move { tx.join().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!joiner.is_finished());

        drop(rx.next_batch().await.unwrap());
        tokio::time::timeout(Duration::from_secs(1), joiner).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn closed_when_senders_dropped() {
        let (tx, mut rx) = batch_queue::<u32>(4, 10);
        tx.put(7).await.unwrap();
        drop(tx);
        assert_eq!(rx.next_batch().await.unwrap().len(), 1);
        assert!(rx.next_batch().await.is_none());
    }

    #[tokio::test]
    async fn cancelled_put_is_not_counted() {
        let (tx, mut rx) = batch_queue::<u32>(1, 10);
        tx.put(1).await.unwrap();
        // Queue full: the second put waits for space and is cancelled.
        assert!(tokio::time::timeout(Duration::from_millis(50), tx.put(2)).await.is_err());
        assert_eq!(tx.outstanding(), 1);

        drop(rx.next_batch().await.unwrap());
        assert_eq!(tx.outstanding(), 0);
        tokio::time::timeout(Duration::from_secs(1), tx.join()).await.unwrap();
    }

    #[tokio::test]
    async fn dropping_receiver_releases_unreceived() {
        let (tx, mut rx) = batch_queue::<u32>(8, 1);
        for i in 0..3 {
            tx.put(i).await.unwrap();
        }
        let batch = rx.next_batch().await.unwrap();
        drop(rx);
        assert_eq!(tx.outstanding(), 1); // only the held batch
        drop(batch);
        tokio::time::timeout(Duration::from_secs(1), tx.join()).await.unwrap();
        assert!(matches!(tx.put(9).await, Err(K4Error::QueueClosed)));
    }

    #[tokio::test]
    async fn put_fails_when_receiver_gone() {
        let (tx, rx) = batch_queue::<u32>(4, 10);
        drop(rx);
        assert!(matches!(tx.put(1).await, Err(K4Error::QueueClosed)));
        assert_eq!(tx.outstanding(), 0);
    }
}
