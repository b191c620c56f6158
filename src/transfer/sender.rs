//! Sender driver.
//!
//! Walks the file in wire order, one block per secure message, with a fixed
//! pacing delay between sends to respect the link's throughput. After the
//! final block it waits for a single whole-file confirmation; anything but
//! the exact success token restarts the entire file from offset 0. A channel
//! failure while sending is fatal — there is no reconnect below this layer.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, trace, warn};

use crate::channel::{recv_ready, SecureChannel};
use crate::error::TransferError;
use crate::transfer::block::Blocks;
use crate::transfer::confirmation_matches;
use crate::transfer::session::TransferSession;

/// Sender tuning.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Pause inserted between consecutive block sends. Flow pacing for a
    /// constrained link, not a correctness requirement.
    pub pacing: Duration,
    /// Pause between polls while waiting on the channel.
    pub poll_interval: Duration,
    /// Cap on whole-file attempts; `None` retries until the receiver
    /// confirms.
    pub max_attempts: Option<u32>,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            pacing: Duration::from_millis(750),
            poll_interval: Duration::from_millis(100),
            max_attempts: None,
        }
    }
}

/// What a completed send looked like.
#[derive(Debug, Clone, Copy)]
pub struct SendOutcome {
    /// Whole-file attempts, including the confirmed one.
    pub attempts: u32,
    /// Payload bytes pushed onto the wire across all attempts.
    pub wire_bytes: u64,
}

pub struct Sender {
    config: SenderConfig,
}

impl Sender {
    pub fn new(config: SenderConfig) -> Self {
        Self { config }
    }

    /// Send `data` through `channel` and block until the receiver confirms
    /// the whole file. `session` must come from a completed negotiation for
    /// exactly `data.len()` bytes.
    pub async fn send_file<C>(
        &self,
        channel: &mut C,
        session: &mut TransferSession,
        data: &[u8],
    ) -> Result<SendOutcome, TransferError>
    where
        C: SecureChannel + ?Sized,
    {
        if data.len() as u64 != u64::from(session.total_size) {
            return Err(TransferError::negotiation(format!(
                "file is {} bytes but {} were negotiated",
                data.len(),
                session.total_size
            )));
        }

        let mut attempts = 0u32;
        let mut wire_bytes = 0u64;
        loop {
            attempts += 1;
            session.reset();
            self.send_blocks(channel, session, data, &mut wire_bytes)
                .await?;

            match self.await_confirmation(channel).await {
                Ok(()) => {
                    info!(
                        bytes = session.bytes_processed,
                        attempts, "transfer confirmed by receiver"
                    );
                    return Ok(SendOutcome {
                        attempts,
                        wire_bytes,
                    });
                }
                Err(err @ TransferError::ConfirmationMismatch) => {
                    if let Some(cap) = self.config.max_attempts {
                        if attempts >= cap {
                            warn!(attempts, "attempt cap reached, giving up");
                            return Err(err);
                        }
                    }
                    warn!(
                        attempt = attempts,
                        "receiver rejected the transfer, resending from the start"
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn send_blocks<C>(
        &self,
        channel: &mut C,
        session: &mut TransferSession,
        data: &[u8],
        wire_bytes: &mut u64,
    ) -> Result<(), TransferError>
    where
        C: SecureChannel + ?Sized,
    {
        debug!(
            total_size = session.total_size,
            block_size = session.block_size,
            blocks = session.block_count(),
            "sending blocks"
        );
        let mut first = true;
        for block in Blocks::new(session.total_size, session.block_size) {
            if !first && !self.config.pacing.is_zero() {
                sleep(self.config.pacing).await;
            }
            first = false;

            let start = block.offset as usize;
            let end = start + block.len as usize;
            channel.send(&data[start..end]).await?;
            session.bytes_processed += block.len;
            *wire_bytes += u64::from(block.len);
            trace!(
                offset = block.offset,
                len = block.len,
                sent = session.bytes_processed,
                "block sent"
            );
        }
        Ok(())
    }

    /// Wait for the whole-file confirmation. A read failure here is treated
    /// like a garbled token: the file is resent in full, and a genuinely
    /// dead channel then fails fatally on the next block send.
    async fn await_confirmation<C>(&self, channel: &mut C) -> Result<(), TransferError>
    where
        C: SecureChannel + ?Sized,
    {
        debug!("waiting for receiver confirmation");
        let msg = match recv_ready(channel, self.config.poll_interval).await {
            Ok(msg) => msg,
            Err(err) => {
                warn!(%err, "confirmation read failed, treating as rejection");
                return Err(TransferError::ConfirmationMismatch);
            }
        };
        if confirmation_matches(&msg.concat()) {
            Ok(())
        } else {
            Err(TransferError::ConfirmationMismatch)
        }
    }
}
