//! Multi-producer concurrent FIFO of pending transactions.
//!
//! Producers are the inbound transport handlers; the single consumer is the
//! ordering core. The shared length counter is approximate by design and is
//! only ever used in policy decisions, never for correctness.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use citrine_types::Transaction;

/// Creates a linked producer/consumer pair.
pub fn tx_queue() -> (TxSink, TxQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    let len = Arc::new(AtomicUsize::new(0));

    (
        TxSink {
            tx,
            len: Arc::clone(&len),
        },
        TxQueue { rx, len },
    )
}

/// Producer handle; cheap to clone, safe to use from any task.
#[derive(Clone)]
pub struct TxSink {
    tx: mpsc::UnboundedSender<Transaction>,
    len: Arc<AtomicUsize>,
}

impl TxSink {
    /// Enqueues a transaction. Returns false once the consumer is gone.
    pub fn push(&self, transaction: Transaction) -> bool {
        let accepted = self.tx.send(transaction).is_ok();
        if accepted {
            self.len.fetch_add(1, Ordering::Relaxed);
        }
        accepted
    }

    /// Approximate number of pending transactions.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Consumer handle, owned by the ordering core.
pub struct TxQueue {
    rx: mpsc::UnboundedReceiver<Transaction>,
    len: Arc<AtomicUsize>,
}

impl TxQueue {
    /// Non-blocking pop; `None` when the queue is momentarily empty.
    pub fn try_pop(&mut self) -> Option<Transaction> {
        let transaction = self.rx.try_recv().ok()?;
        self.len.fetch_sub(1, Ordering::Relaxed);
        Some(transaction)
    }

    /// Pops up to `max` transactions, stopping at the first miss. The
    /// returned sequence preserves enqueue order.
    pub fn drain(&mut self, max: usize) -> Vec<Transaction> {
        let mut txs = Vec::new();

        while txs.len() < max {
            match self.try_pop() {
                Some(tx) => txs.push(tx),
                None => break,
            }
        }

        txs
    }

    /// Approximate number of pending transactions.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
