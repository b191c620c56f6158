//! sling — chunked file transfer over secure, size-limited serial links.
//!
//! A file moves between two endpoints as a sequence of bounded-size blocks,
//! each carried in one message of an already-authenticated, already-encrypted
//! channel. The crate owns the transfer protocol — size negotiation, block
//! arithmetic, the send/confirm and receive/acknowledge drivers, and session
//! bootstrap — and consumes the secure channel and the raw byte transport
//! through the traits in [`channel`].
//!
//! One transfer per process, one driver per channel, one operation in
//! flight: every channel call presents a blocking contract to the drivers,
//! with non-blocking polling handled inside the channel seam.

pub mod channel;
pub mod config;
pub mod error;
pub mod genfile;
pub mod transfer;

pub use config::Config;
pub use error::TransferError;
