//! Session bootstrap and the per-transfer state record.
//!
//! One session moves one file. The bootstrap runs exactly once before
//! anything else: it hands the delay-attack threshold to the channel
//! (without interpreting it) and drives the handshake poll loop to
//! completion. Negotiation then fixes the wire contract — total file size
//! first, then block size, both as decimal text messages — after which the
//! drivers own the channel.

use std::time::Duration;

use tracing::{debug, info};

use crate::channel::{handshake_ready, Clock, SecureChannel};
use crate::error::TransferError;
use crate::transfer::{block, negotiate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Sender,
    Receiver,
}

/// The unit of one file exchange. Created after handshake and negotiation,
/// mutated once per block, discarded when the drivers return.
#[derive(Debug)]
pub struct TransferSession {
    pub role: Role,
    /// Total byte length of the file being moved.
    pub total_size: u32,
    /// Nominal block length before encryption overhead; identical on both
    /// sides.
    pub block_size: u32,
    /// Bytes sent (sender) or written (receiver) so far.
    pub bytes_processed: u32,
}

impl TransferSession {
    pub fn new(role: Role, total_size: u32, block_size: u32) -> Result<Self, TransferError> {
        if block_size == 0 {
            return Err(TransferError::negotiation("block size must be non-zero"));
        }
        Ok(Self {
            role,
            total_size,
            block_size,
            bytes_processed: 0,
        })
    }

    pub fn is_complete(&self) -> bool {
        self.bytes_processed == self.total_size
    }

    pub fn remaining(&self) -> u32 {
        self.total_size - self.bytes_processed
    }

    /// Restart the session from offset 0 for a whole-file retry.
    pub fn reset(&mut self) {
        self.bytes_processed = 0;
    }

    /// Block count for buffer sizing. The wire lengths themselves always
    /// come from the live `min(block_size, remaining)` computation.
    pub fn block_count(&self) -> u32 {
        block::block_count(self.total_size, self.block_size)
    }
}

/// Bootstrap tuning.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    /// Delay-attack threshold handed to the channel, in milliseconds.
    pub delay_threshold_ms: u32,
    /// Pause between handshake polls.
    pub poll_interval: Duration,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            delay_threshold_ms: 3000,
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Run the one-time session establishment. Failure is fatal: the caller
/// must build an entirely new channel and handshake again.
pub async fn bootstrap<C>(
    channel: &mut C,
    clock: &dyn Clock,
    config: &BootstrapConfig,
) -> Result<(), TransferError>
where
    C: SecureChannel + ?Sized,
{
    channel.set_delay_threshold(config.delay_threshold_ms);
    let started = clock.now_millis();
    handshake_ready(channel, config.poll_interval).await?;
    let elapsed_ms = clock.now_millis().saturating_sub(started);
    info!(elapsed_ms, "handshake complete");
    Ok(())
}

/// Sender-side negotiation: announce total size, then block size.
pub async fn negotiate_as_sender<C>(
    channel: &mut C,
    total_size: u32,
    block_size: u32,
) -> Result<TransferSession, TransferError>
where
    C: SecureChannel + ?Sized,
{
    let session = TransferSession::new(Role::Sender, total_size, block_size)?;
    negotiate::send_size(channel, total_size).await?;
    negotiate::send_size(channel, block_size).await?;
    debug!(total_size, block_size, "negotiation sent");
    Ok(session)
}

/// Receiver-side negotiation: learn total size, then block size, in the
/// same fixed order the sender uses.
pub async fn negotiate_as_receiver<C>(
    channel: &mut C,
    poll_interval: Duration,
) -> Result<TransferSession, TransferError>
where
    C: SecureChannel + ?Sized,
{
    let total_size = negotiate::recv_size(channel, poll_interval).await?;
    let block_size = negotiate::recv_size(channel, poll_interval).await?;
    debug!(total_size, block_size, "negotiation received");
    TransferSession::new(Role::Receiver, total_size, block_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::memory;
    use crate::channel::SystemClock;

    const POLL: Duration = Duration::from_millis(1);

    #[test]
    fn test_session_rejects_zero_block_size() {
        let err = TransferSession::new(Role::Sender, 100, 0).unwrap_err();
        assert!(matches!(err, TransferError::Negotiation { .. }));
    }

    #[test]
    fn test_session_completion() {
        let mut session = TransferSession::new(Role::Receiver, 10, 4).unwrap();
        assert!(!session.is_complete());
        assert_eq!(session.remaining(), 10);
        session.bytes_processed = 10;
        assert!(session.is_complete());
        session.reset();
        assert_eq!(session.bytes_processed, 0);
    }

    #[test]
    fn test_empty_session_is_complete_immediately() {
        let session = TransferSession::new(Role::Receiver, 0, 4096).unwrap();
        assert!(session.is_complete());
        assert_eq!(session.block_count(), 0);
    }

    #[tokio::test]
    async fn test_bootstrap_sets_threshold_and_handshakes() {
        let (mut a, mut b) = memory::pair();
        let config = BootstrapConfig {
            delay_threshold_ms: 1234,
            poll_interval: POLL,
        };
        let (ra, rb) = tokio::join!(
            bootstrap(&mut a, &SystemClock, &config),
            bootstrap(&mut b, &SystemClock, &config),
        );
        ra.unwrap();
        rb.unwrap();
        assert_eq!(a.delay_threshold_ms(), 1234);
        assert_eq!(b.delay_threshold_ms(), 1234);
    }

    #[tokio::test]
    async fn test_negotiation_order_is_size_then_block() {
        let (mut a, mut b) = memory::pair();
        let config = BootstrapConfig {
            delay_threshold_ms: 0,
            poll_interval: POLL,
        };
        let (ra, rb) = tokio::join!(
            bootstrap(&mut a, &SystemClock, &config),
            bootstrap(&mut b, &SystemClock, &config),
        );
        ra.unwrap();
        rb.unwrap();

        let (sent, received) = tokio::join!(
            negotiate_as_sender(&mut a, 10_000, 4067),
            negotiate_as_receiver(&mut b, POLL),
        );
        let sent = sent.unwrap();
        let received = received.unwrap();
        assert_eq!(sent.role, Role::Sender);
        assert_eq!(received.role, Role::Receiver);
        assert_eq!(received.total_size, 10_000);
        assert_eq!(received.block_size, 4067);
        assert_eq!(received.block_count(), 3);
    }

    #[tokio::test]
    async fn test_receiver_rejects_zero_block_size_from_peer() {
        let (mut a, mut b) = memory::pair();
        let config = BootstrapConfig::default();
        let cfg = BootstrapConfig {
            poll_interval: POLL,
            ..config
        };
        let (ra, rb) = tokio::join!(
            bootstrap(&mut a, &SystemClock, &cfg),
            bootstrap(&mut b, &SystemClock, &cfg),
        );
        ra.unwrap();
        rb.unwrap();

        negotiate::send_size(&mut a, 100).await.unwrap();
        negotiate::send_size(&mut a, 0).await.unwrap();
        let err = negotiate_as_receiver(&mut b, POLL).await.unwrap_err();
        assert!(matches!(err, TransferError::Negotiation { .. }));
    }
}
