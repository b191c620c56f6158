//! The secure message channel seam.
//!
//! The transfer layer never encrypts, frames, or touches raw bytes itself.
//! It consumes an already-authenticated, already-encrypted channel through
//! the narrow [`SecureChannel`] trait: drive the handshake, send one opaque
//! payload per message, receive one message at a time. Channel operations
//! that cannot complete yet report [`ChannelStatus::Pending`] and are retried
//! in caller-side poll loops ([`handshake_ready`], [`recv_ready`]).
//!
//! [`WireTransport`] is the byte-level capability injected into channel
//! implementations; the transfer layer never calls it directly.

pub mod framed;
pub mod memory;
#[cfg(unix)]
pub mod serial;

use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::time::sleep;

/// Error code carried by a failed channel operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelErrorCode {
    /// Underlying transport I/O failed.
    Io,
    /// Handshake could not be completed or the peer spoke a different
    /// protocol.
    Handshake,
    /// A received frame violated the framing rules.
    Framing,
    /// The peer closed the channel.
    Closed,
}

impl ChannelErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelErrorCode::Io => "transport I/O failure",
            ChannelErrorCode::Handshake => "handshake failure",
            ChannelErrorCode::Framing => "malformed frame",
            ChannelErrorCode::Closed => "channel closed by peer",
        }
    }
}

/// Failure surfaced by a channel implementation. Always fatal to the
/// session: there is no reconnect below the transfer layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{}", .code.as_str())]
pub struct ChannelError {
    pub code: ChannelErrorCode,
}

impl ChannelError {
    pub fn new(code: ChannelErrorCode) -> Self {
        Self { code }
    }

    pub fn io() -> Self {
        Self::new(ChannelErrorCode::Io)
    }

    pub fn handshake() -> Self {
        Self::new(ChannelErrorCode::Handshake)
    }

    pub fn framing() -> Self {
        Self::new(ChannelErrorCode::Framing)
    }

    pub fn closed() -> Self {
        Self::new(ChannelErrorCode::Closed)
    }
}

/// Outcome of a pollable channel operation.
#[derive(Debug)]
pub enum ChannelStatus<T> {
    /// The operation completed.
    Ready(T),
    /// Not enough progress yet; retry after a pause.
    Pending,
}

/// One decrypted message handed up by the channel.
///
/// A single encrypted message may coalesce several clear-text fragments;
/// the transfer layer treats the concatenation of all fragments, in order,
/// as the message payload.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    fragments: Vec<Bytes>,
}

impl InboundMessage {
    pub fn single(payload: Bytes) -> Self {
        Self {
            fragments: vec![payload],
        }
    }

    pub fn from_fragments(fragments: Vec<Bytes>) -> Self {
        Self { fragments }
    }

    pub fn fragments(&self) -> &[Bytes] {
        &self.fragments
    }

    /// Total decrypted payload length across all fragments.
    pub fn payload_len(&self) -> usize {
        self.fragments.iter().map(Bytes::len).sum()
    }

    /// The full payload as one contiguous buffer.
    pub fn concat(&self) -> Bytes {
        match self.fragments.as_slice() {
            [single] => single.clone(),
            parts => {
                let mut buf = BytesMut::with_capacity(self.payload_len());
                for part in parts {
                    buf.extend_from_slice(part);
                }
                buf.freeze()
            }
        }
    }
}

/// An established-or-establishing secure session.
///
/// Implementations own authentication, encryption, and framing. The transfer
/// layer only ever sees opaque payload bytes and success/pending/error
/// outcomes.
#[async_trait]
pub trait SecureChannel: Send {
    /// Configure the delay-attack threshold, in milliseconds. The value is
    /// passed through to the protection machinery, never interpreted here.
    fn set_delay_threshold(&mut self, millis: u32);

    /// Drive the session handshake one step.
    async fn handshake(&mut self) -> Result<ChannelStatus<()>, ChannelError>;

    /// Encrypt and send one message carrying `payload` as a single
    /// clear-text fragment.
    async fn send(&mut self, payload: &[u8]) -> Result<(), ChannelError>;

    /// Attempt to receive one message.
    async fn recv(&mut self) -> Result<ChannelStatus<InboundMessage>, ChannelError>;
}

/// Poll the handshake until it completes, pausing `poll_interval` between
/// pending steps.
pub async fn handshake_ready<C>(
    channel: &mut C,
    poll_interval: Duration,
) -> Result<(), ChannelError>
where
    C: SecureChannel + ?Sized,
{
    loop {
        match channel.handshake().await? {
            ChannelStatus::Ready(()) => return Ok(()),
            ChannelStatus::Pending => sleep(poll_interval).await,
        }
    }
}

/// Poll `recv` until a full message arrives, pausing `poll_interval` between
/// pending attempts.
pub async fn recv_ready<C>(
    channel: &mut C,
    poll_interval: Duration,
) -> Result<InboundMessage, ChannelError>
where
    C: SecureChannel + ?Sized,
{
    loop {
        match channel.recv().await? {
            ChannelStatus::Ready(msg) => return Ok(msg),
            ChannelStatus::Pending => sleep(poll_interval).await,
        }
    }
}

/// Reliable byte transport injected into channel implementations.
///
/// `poll_read` is non-blocking and may legitimately return 0; accumulation
/// up to an expected byte count is the channel implementation's job.
pub trait WireTransport: Send {
    fn write(&mut self, bytes: &[u8]) -> std::io::Result<usize>;
    fn poll_read(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;
}

/// Millisecond clock, injected where wall time is needed so nothing in the
/// crate reaches for a process-wide singleton.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// [`Clock`] backed by the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_concat_single_is_cheap() {
        let msg = InboundMessage::single(Bytes::from_static(b"hello"));
        assert_eq!(msg.payload_len(), 5);
        assert_eq!(msg.concat().as_ref(), b"hello");
    }

    #[test]
    fn test_message_concat_joins_fragments_in_order() {
        let msg = InboundMessage::from_fragments(vec![
            Bytes::from_static(b"ab"),
            Bytes::from_static(b""),
            Bytes::from_static(b"cde"),
        ]);
        assert_eq!(msg.payload_len(), 5);
        assert_eq!(msg.concat().as_ref(), b"abcde");
        assert_eq!(msg.fragments().len(), 3);
    }

    #[test]
    fn test_channel_error_display() {
        assert_eq!(ChannelError::closed().to_string(), "channel closed by peer");
    }
}
