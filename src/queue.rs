use crate::result::ScrapeResult;
use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// Builds the worker-to-writer FIFO. `None` is unbounded; `Some(n)` makes
/// `enqueue` block once `n` results are waiting.
pub fn result_queue(capacity: Option<usize>) -> (ResultSender, ResultReceiver) {
    let (sender, receiver) = match capacity {
        Some(n) => bounded(n.max(1)),
        None => unbounded(),
    };
    (ResultSender { inner: sender }, ResultReceiver { inner: receiver })
}

#[derive(Debug, Clone)]
pub struct ResultSender {
    inner: Sender<ScrapeResult>,
}

impl ResultSender {
    pub fn enqueue(&self, result: ScrapeResult) -> Result<()> {
        self.inner
            .send(result)
            .map_err(|e| anyhow!("Result queue closed; could not deliver result for '{}'", e.0.name))
    }
}

pub enum Dequeue {
    Item(ScrapeResult),
    TimedOut,
    /// Every sender is gone and nothing is left.
    Closed,
}

#[derive(Debug)]
pub struct ResultReceiver {
    inner: Receiver<ScrapeResult>,
}

impl ResultReceiver {
    pub fn dequeue_timeout(&self, timeout: Duration) -> Dequeue {
        match self.inner.recv_timeout(timeout) {
            Ok(result) => Dequeue::Item(result),
            Err(RecvTimeoutError::Timeout) => Dequeue::TimedOut,
            Err(RecvTimeoutError::Disconnected) => Dequeue::Closed,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
