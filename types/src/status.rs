use core::fmt;

use crate::Height;

/// Progress of a submitted transaction through the ordering stage.
///
/// Updates are broadcast on the status bus; delivery is best-effort and a
/// slow subscriber may miss intermediate states.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TxStatus {
    /// Accepted by the transport and enqueued for ordering.
    Received,
    /// Failed transport-level validation; not enqueued.
    Rejected,
    /// Packed into the published proposal at the given height.
    InProposal(Height),
    /// Drained from the queue but discarded after a failed emission cycle.
    Dropped,
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Received => write!(f, "received"),
            Self::Rejected => write!(f, "rejected"),
            Self::InProposal(height) => write!(f, "in proposal {height}"),
            Self::Dropped => write!(f, "dropped"),
        }
    }
}
