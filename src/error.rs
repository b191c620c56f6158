//! Transfer-level error taxonomy.
//!
//! Channel, negotiation, and resource failures are fatal to the session;
//! a confirmation mismatch is the one retriable case and is consumed by the
//! sender's whole-file retry loop.

use thiserror::Error;

use crate::channel::ChannelError;

#[derive(Debug, Error)]
pub enum TransferError {
    /// Transport or cryptographic failure reported by the secure channel.
    /// The session is unusable; the caller must build a fresh channel and
    /// handshake again.
    #[error("secure channel failure: {0}")]
    Channel(#[from] ChannelError),

    /// Malformed or missing size payload during negotiation.
    #[error("size negotiation failed: {reason}")]
    Negotiation { reason: String },

    /// The receiver reported failure, or the confirmation payload did not
    /// match the expected success token. Retriable at whole-file granularity.
    #[error("receiver rejected the transfer")]
    ConfirmationMismatch,

    /// More payload bytes arrived than the negotiated total. The receiver
    /// never truncates or overwrites past the expected length.
    #[error("received {received} bytes but only {expected} were negotiated")]
    Overrun { expected: u64, received: u64 },

    /// Allocation or file-I/O failure on either endpoint.
    #[error("file I/O failed")]
    Resource(#[from] std::io::Error),
}

impl TransferError {
    pub(crate) fn negotiation(reason: impl Into<String>) -> Self {
        TransferError::Negotiation {
            reason: reason.into(),
        }
    }

    /// Whether this error terminates the session. Everything except a
    /// confirmation mismatch does.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TransferError::ConfirmationMismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelError, ChannelErrorCode};

    #[test]
    fn test_fatality() {
        assert!(!TransferError::ConfirmationMismatch.is_fatal());
        assert!(TransferError::Channel(ChannelError::new(ChannelErrorCode::Io)).is_fatal());
        assert!(TransferError::negotiation("bad payload").is_fatal());
        assert!(TransferError::Overrun {
            expected: 10,
            received: 12
        }
        .is_fatal());
    }
}
