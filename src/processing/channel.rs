use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender, TryRecvError, TrySendError};
use std::sync::Arc;
use tracing::{debug, warn};

// -----------------------------------------------------------------------------
// SAMPLE CHANNEL
// -----------------------------------------------------------------------------
//
// Single-producer / single-consumer FIFO between the generator thread and the
// coordinator. Neither side ever blocks: `put` either enqueues or drops, and
// `try_take` returns `None` when the queue is empty.

/// Outcome of [`SampleSender::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    /// Bounded channel was full; the newest sample was dropped.
    Dropped,
    /// The consumer side is gone.
    Closed,
}

enum Outbound {
    Unbounded(Sender<f64>),
    Bounded(SyncSender<f64>),
}

pub struct SampleSender {
    outbound: Outbound,
    dropped: Arc<AtomicU64>,
}

pub struct SampleReceiver {
    inbound: Receiver<f64>,
    dropped: Arc<AtomicU64>,
    disconnected: bool,
}

/// Creates a channel. `None` is unbounded; `Some(n)` holds at most `n`
/// samples and drops the newest one when full.
pub fn sample_channel(capacity: Option<usize>) -> (SampleSender, SampleReceiver) {
    let dropped = Arc::new(AtomicU64::new(0));

    let (outbound, inbound) = match capacity {
        Some(capacity) => {
            let (tx, rx) = mpsc::sync_channel(capacity.max(1));
            (Outbound::Bounded(tx), rx)
        }
        None => {
            let (tx, rx) = mpsc::channel();
            (Outbound::Unbounded(tx), rx)
        }
    };

    (
        SampleSender {
            outbound,
            dropped: Arc::clone(&dropped),
        },
        SampleReceiver {
            inbound,
            dropped,
            disconnected: false,
        },
    )
}

impl SampleSender {
    pub fn put(&self, value: f64) -> Delivery {
        let result = match &self.outbound {
            Outbound::Unbounded(tx) => tx.send(value).map_err(|e| TrySendError::Disconnected(e.0)),
            Outbound::Bounded(tx) => tx.try_send(value),
        };

        match result {
            Ok(()) => Delivery::Queued,
            Err(TrySendError::Full(value)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(value, dropped, "sample channel full, dropping newest sample");
                Delivery::Dropped
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!("sample channel consumer disconnected");
                Delivery::Closed
            }
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl SampleReceiver {
    pub fn try_take(&mut self) -> Option<f64> {
        match self.inbound.try_recv() {
            Ok(value) => Some(value),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.disconnected = true;
                None
            }
        }
    }

    /// True once the producer is gone and every queued sample has been taken.
    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
