//! Conversions between domain types and the protobuf wire model.

use bytes::Bytes;
use prost::Message;
use thiserror::Error;

use crate::{proto, Height, Proposal, Transaction};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to decode wire frame: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("envelope carries no message")]
    EmptyEnvelope,
}

impl From<Transaction> for proto::Transaction {
    fn from(tx: Transaction) -> Self {
        Self {
            payload: tx.payload().clone(),
            signature: tx.signature().clone(),
        }
    }
}

impl From<proto::Transaction> for Transaction {
    fn from(tx: proto::Transaction) -> Self {
        Self::new(tx.payload, tx.signature)
    }
}

impl From<Proposal> for proto::Proposal {
    fn from(proposal: Proposal) -> Self {
        Self {
            height: proposal.height.as_u64(),
            created_at: proposal.created_at,
            transactions: proposal
                .transactions
                .into_iter()
                .map(Into::into)
                .collect(),
        }
    }
}

impl From<proto::Proposal> for Proposal {
    fn from(proposal: proto::Proposal) -> Self {
        Self::new(
            Height::new(proposal.height),
            proposal.created_at,
            proposal.transactions.into_iter().map(Into::into).collect(),
        )
    }
}

/// Encodes a wire message into a single transport frame.
pub fn encode_envelope(msg: proto::envelope::Msg) -> Bytes {
    let envelope = proto::Envelope { msg: Some(msg) };
    envelope.encode_to_vec().into()
}

/// Decodes a transport frame into a wire message.
pub fn decode_envelope(frame: &[u8]) -> Result<proto::envelope::Msg, CodecError> {
    let envelope = proto::Envelope::decode(frame)?;
    envelope.msg.ok_or(CodecError::EmptyEnvelope)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proposal_survives_the_wire() {
        let proposal = Proposal::new(
            Height::new(7),
            1_700_000_000_000,
            vec![
                Transaction::new(&b"a"[..], &b"sig-a"[..]),
                Transaction::new(&b"b"[..], &b"sig-b"[..]),
            ],
        );

        let frame = encode_envelope(proto::envelope::Msg::Proposal(proposal.clone().into()));
        let msg = decode_envelope(&frame).unwrap();

        match msg {
            proto::envelope::Msg::Proposal(p) => assert_eq!(Proposal::from(p), proposal),
            other => panic!("expected proposal, got {other:?}"),
        }
    }

    #[test]
    fn garbage_frame_is_a_decode_error() {
        let err = decode_envelope(&[0xff, 0xff, 0xff]).unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }

    #[test]
    fn empty_envelope_is_rejected() {
        let frame = proto::Envelope { msg: None }.encode_to_vec();
        let err = decode_envelope(&frame).unwrap_err();
        assert!(matches!(err, CodecError::EmptyEnvelope));
    }
}
