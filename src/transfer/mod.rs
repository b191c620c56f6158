//! Reliable chunked transfer protocol.
//!
//! The layer between a file and the secure message channel:
//!
//! 1. Bootstrap — one-time handshake, delay-threshold configuration.
//! 2. Negotiation — total size then block size, as decimal text messages.
//! 3. Block loop — sender pushes `min(block_size, remaining)` slices, one
//!    per message; receiver appends them to its sink.
//! 4. Confirmation — one success/failure token for the whole file; a
//!    rejected file is resent in full from offset 0.

pub mod block;
pub mod negotiate;
pub mod receiver;
pub mod sender;
pub mod session;

pub use block::{block_count, residual_size, Block, Blocks};
pub use receiver::{Receiver, ReceiverConfig, RecvOutcome};
pub use sender::{SendOutcome, Sender, SenderConfig};
pub use session::{
    bootstrap, negotiate_as_receiver, negotiate_as_sender, BootstrapConfig, Role, TransferSession,
};

/// Whole-file success token, sent by the receiver once every negotiated
/// byte has been written.
pub const CONFIRM_OK: &[u8] = b"transfer ok";

/// Whole-file failure token, sent best-effort when the receiver abandons a
/// session.
pub const CONFIRM_FAIL: &[u8] = b"transfer failed";

/// Sender-side confirmation check: nothing but an exact match of the
/// success token counts.
pub fn confirmation_matches(payload: &[u8]) -> bool {
    payload == CONFIRM_OK
}
