use core::fmt;

use bytes::Bytes;
use sha3::{Digest, Keccak256};
use thiserror::Error;

/// An opaque, immutable, signed payload submitted by a client.
///
/// The ordering service never inspects or mutates the contents; the payload is
/// carried as-is into a proposal. Identity is the keccak256 hash over payload
/// and signature.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Transaction {
    payload: Bytes,
    signature: Bytes,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("transaction payload is empty")]
    EmptyPayload,

    #[error("transaction carries no signature")]
    MissingSignature,
}

impl Transaction {
    pub fn new(payload: impl Into<Bytes>, signature: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            signature: signature.into(),
        }
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn signature(&self) -> &Bytes {
        &self.signature
    }

    /// Stable identity of this transaction.
    pub fn hash(&self) -> TxHash {
        let mut hasher = Keccak256::new();
        hasher.update(&self.payload);
        hasher.update(&self.signature);

        let digest = hasher.finalize();
        let mut bytes = [0u8; TxHash::LENGTH];
        bytes.copy_from_slice(&digest);
        TxHash(bytes)
    }

    /// Well-formedness check applied at the transport boundary and again by
    /// the proposal factory. Signature *verification* is a concern of the
    /// validation library upstream, not of ordering.
    pub fn validate(&self) -> Result<(), TransactionError> {
        if self.payload.is_empty() {
            return Err(TransactionError::EmptyPayload);
        }

        if self.signature.is_empty() {
            return Err(TransactionError::MissingSignature);
        }

        Ok(())
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("hash", &self.hash())
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

/// Keccak256 digest identifying a [`Transaction`].
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxHash([u8; Self::LENGTH]);

impl TxHash {
    pub const LENGTH: usize = 32;

    pub const fn new(bytes: [u8; Self::LENGTH]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; Self::LENGTH] {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({self})")
    }
}
