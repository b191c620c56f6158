//! Receiver driver.
//!
//! Receives one secure message at a time, appends every decrypted fragment
//! to the sink in arrival order, and counts bytes until the negotiated total
//! is reached — then sends exactly one success token. Any failure before
//! that point sends a failure token best-effort, so the sender observes a
//! rejection and can retry the whole file, and then surfaces the error.

use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, trace};

use crate::channel::{recv_ready, SecureChannel};
use crate::error::TransferError;
use crate::transfer::session::TransferSession;
use crate::transfer::{CONFIRM_FAIL, CONFIRM_OK};

/// Receiver tuning.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Pause between polls while waiting on the channel.
    pub poll_interval: Duration,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// What a completed receive looked like.
#[derive(Debug, Clone, Copy)]
pub struct RecvOutcome {
    pub bytes_written: u64,
    /// Secure messages consumed, which can be fewer than blocks when the
    /// channel coalesces fragments.
    pub messages: u64,
}

pub struct Receiver {
    config: ReceiverConfig,
}

impl Receiver {
    pub fn new(config: ReceiverConfig) -> Self {
        Self { config }
    }

    /// Receive a whole file into `sink`. `session` must come from a
    /// completed negotiation; `sink` is append-only and written in arrival
    /// order, no seeking, no overwrite.
    pub async fn receive_file<C, W>(
        &self,
        channel: &mut C,
        session: &mut TransferSession,
        sink: &mut W,
    ) -> Result<RecvOutcome, TransferError>
    where
        C: SecureChannel + ?Sized,
        W: AsyncWrite + Unpin,
    {
        debug!(
            total_size = session.total_size,
            block_size = session.block_size,
            "receiving blocks"
        );
        let mut messages = 0u64;
        while !session.is_complete() {
            let msg = match recv_ready(channel, self.config.poll_interval).await {
                Ok(msg) => msg,
                Err(err) => {
                    self.reject(channel).await;
                    return Err(err.into());
                }
            };
            messages += 1;

            for fragment in msg.fragments() {
                let len = fragment.len() as u64;
                if len > u64::from(session.remaining()) {
                    // Payload past the negotiated total is a protocol
                    // violation, never truncated into place.
                    self.reject(channel).await;
                    return Err(TransferError::Overrun {
                        expected: u64::from(session.total_size),
                        received: u64::from(session.bytes_processed) + len,
                    });
                }
                if let Err(err) = sink.write_all(fragment).await {
                    self.reject(channel).await;
                    return Err(err.into());
                }
                session.bytes_processed += fragment.len() as u32;
                trace!(
                    len = fragment.len(),
                    received = session.bytes_processed,
                    "fragment written"
                );
            }
        }

        if let Err(err) = sink.flush().await {
            self.reject(channel).await;
            return Err(err.into());
        }
        channel.send(CONFIRM_OK).await?;
        info!(
            bytes = session.bytes_processed,
            messages, "transfer complete, confirmation sent"
        );
        Ok(RecvOutcome {
            bytes_written: u64::from(session.bytes_processed),
            messages,
        })
    }

    /// Best-effort failure token; the session is already lost if this does
    /// not get through.
    async fn reject<C>(&self, channel: &mut C)
    where
        C: SecureChannel + ?Sized,
    {
        if channel.send(CONFIRM_FAIL).await.is_err() {
            debug!("failure notice could not be delivered");
        }
    }
}
