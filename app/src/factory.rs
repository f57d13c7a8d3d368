//! Proposal construction and batch validation.

use thiserror::Error;

use citrine_types::{Height, Proposal, Transaction, TransactionError, TxHash};

#[derive(Debug, Error)]
pub enum ProposalError {
    #[error("no transactions to propose")]
    Empty,

    #[error("batch of {count} transactions exceeds the proposal limit of {limit}")]
    Oversized { count: usize, limit: usize },

    #[error("transaction {hash} is malformed: {source}")]
    Malformed {
        hash: TxHash,
        source: TransactionError,
    },
}

/// Validates a drained batch and constructs a proposal from it.
///
/// A returned [`Proposal`] is guaranteed non-empty and within the size bound.
/// One malformed transaction rejects the whole candidate batch; the caller
/// discards the drained set without advancing the height.
pub trait ProposalFactory: Send + Sync {
    fn create(
        &self,
        height: Height,
        created_at: u64,
        transactions: Vec<Transaction>,
    ) -> Result<Proposal, ProposalError>;
}

pub struct ValidatingFactory {
    max_txs: usize,
}

impl ValidatingFactory {
    pub fn new(max_txs: usize) -> Self {
        Self { max_txs }
    }
}

impl ProposalFactory for ValidatingFactory {
    fn create(
        &self,
        height: Height,
        created_at: u64,
        transactions: Vec<Transaction>,
    ) -> Result<Proposal, ProposalError> {
        if transactions.is_empty() {
            return Err(ProposalError::Empty);
        }

        if transactions.len() > self.max_txs {
            return Err(ProposalError::Oversized {
                count: transactions.len(),
                limit: self.max_txs,
            });
        }

        for tx in &transactions {
            tx.validate().map_err(|source| ProposalError::Malformed {
                hash: tx.hash(),
                source,
            })?;
        }

        Ok(Proposal::new(height, created_at, transactions))
    }
}
