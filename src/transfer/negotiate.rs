//! Size negotiation control messages.
//!
//! Each value travels as the decimal ASCII text of a `u32` in exactly one
//! secure message — no padding, no terminator; the channel's own framing
//! supplies the length. No type tag distinguishes the two integers of a
//! session: both sides rely on the fixed order, total file size first, then
//! block size.

use std::time::Duration;

use tracing::trace;

use crate::channel::{recv_ready, SecureChannel};
use crate::error::TransferError;

/// Encode `value` and send it as one secure message.
pub async fn send_size<C>(channel: &mut C, value: u32) -> Result<(), TransferError>
where
    C: SecureChannel + ?Sized,
{
    let text = value.to_string();
    trace!(value, "sending size message");
    channel.send(text.as_bytes()).await?;
    Ok(())
}

/// Block until one secure message arrives and parse its full payload as an
/// unsigned decimal integer. Anything that does not parse is a negotiation
/// error, never a silently-defaulted zero.
pub async fn recv_size<C>(channel: &mut C, poll_interval: Duration) -> Result<u32, TransferError>
where
    C: SecureChannel + ?Sized,
{
    let msg = recv_ready(channel, poll_interval).await?;
    let payload = msg.concat();
    let text = std::str::from_utf8(&payload)
        .map_err(|_| TransferError::negotiation("size payload is not ASCII text"))?;
    let value = text.parse::<u32>().map_err(|_| {
        TransferError::negotiation(format!("size payload {text:?} is not an unsigned decimal"))
    })?;
    trace!(value, "size message received");
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::memory;

    const POLL: Duration = Duration::from_millis(1);

    async fn connected() -> (memory::MemoryChannel, memory::MemoryChannel) {
        let (mut a, mut b) = memory::pair();
        let (ra, rb) = tokio::join!(
            crate::channel::handshake_ready(&mut a, POLL),
            crate::channel::handshake_ready(&mut b, POLL),
        );
        ra.unwrap();
        rb.unwrap();
        (a, b)
    }

    #[tokio::test]
    async fn test_size_roundtrip_boundaries() {
        let (mut a, mut b) = connected().await;
        for value in [0u32, 1, u32::MAX] {
            send_size(&mut a, value).await.unwrap();
            assert_eq!(recv_size(&mut b, POLL).await.unwrap(), value);
        }
    }

    #[tokio::test]
    async fn test_malformed_payload_is_rejected() {
        let (mut a, mut b) = connected().await;
        a.send(b"12x34").await.unwrap();
        let err = recv_size(&mut b, POLL).await.unwrap_err();
        assert!(matches!(err, TransferError::Negotiation { .. }));
    }

    #[tokio::test]
    async fn test_empty_payload_is_rejected() {
        let (mut a, mut b) = connected().await;
        a.send(b"").await.unwrap();
        assert!(matches!(
            recv_size(&mut b, POLL).await.unwrap_err(),
            TransferError::Negotiation { .. }
        ));
    }

    #[tokio::test]
    async fn test_out_of_range_payload_is_rejected() {
        let (mut a, mut b) = connected().await;
        a.send(b"4294967296").await.unwrap();
        assert!(matches!(
            recv_size(&mut b, POLL).await.unwrap_err(),
            TransferError::Negotiation { .. }
        ));
    }
}
