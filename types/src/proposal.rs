use core::fmt;

use crate::{Height, Transaction};

/// A numbered, timestamped, ordered batch of transactions produced by the
/// ordering service.
///
/// Construction goes through the proposal factory, which guarantees that the
/// batch is non-empty and within the configured size bound.
#[derive(Clone, PartialEq, Eq)]
pub struct Proposal {
    pub height: Height,
    /// Wall-clock timestamp in milliseconds, captured at construction.
    pub created_at: u64,
    pub transactions: Vec<Transaction>,
}

impl Proposal {
    pub fn new(height: Height, created_at: u64, transactions: Vec<Transaction>) -> Self {
        Self {
            height,
            created_at,
            transactions,
        }
    }

    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }
}

impl fmt::Debug for Proposal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proposal")
            .field("height", &self.height)
            .field("created_at", &self.created_at)
            .field("tx_count", &self.tx_count())
            .finish()
    }
}
