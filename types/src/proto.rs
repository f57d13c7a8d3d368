//! Protobuf wire messages for the ordering transport.
//!
//! Hand-written prost derives matching the message layout a `.proto` schema
//! would produce, kept in sync with the codec in [`crate::codec`].

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Transaction {
    #[prost(bytes = "bytes", tag = "1")]
    pub payload: ::prost::bytes::Bytes,

    #[prost(bytes = "bytes", tag = "2")]
    pub signature: ::prost::bytes::Bytes,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TxList {
    #[prost(message, repeated, tag = "1")]
    pub transactions: Vec<Transaction>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Proposal {
    #[prost(uint64, tag = "1")]
    pub height: u64,

    #[prost(uint64, tag = "2")]
    pub created_at: u64,

    #[prost(message, repeated, tag = "3")]
    pub transactions: Vec<Transaction>,
}

/// Acknowledgement that a message was received, not that it will be included
/// in any proposal.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Ack {}

/// Top-level frame exchanged on the wire.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Envelope {
    #[prost(oneof = "envelope::Msg", tags = "1, 2, 3, 4")]
    pub msg: Option<envelope::Msg>,
}

pub mod envelope {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Msg {
        /// `OnTransaction`: a single client-submitted transaction.
        #[prost(message, tag = "1")]
        Transaction(super::Transaction),

        /// `OnBatch`: an ordered list of transactions.
        #[prost(message, tag = "2")]
        TxList(super::TxList),

        /// `OnProposal`: a proposal broadcast to a ledger peer.
        #[prost(message, tag = "3")]
        Proposal(super::Proposal),

        /// Receipt acknowledgement.
        #[prost(message, tag = "4")]
        Ack(super::Ack),
    }
}
