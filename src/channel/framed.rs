//! Length-framed channel over a [`WireTransport`].
//!
//! Wire format: every message is `{len:u32 BE}{payload}`, written in one
//! step and read in two (the 4 length bytes first, then the package).
//! Reads accumulate across non-blocking `poll_read` calls with an explicit
//! bytes-remaining counter and report [`ChannelStatus::Pending`] until a
//! frame completes.
//!
//! This implementation carries no payload protection. It is the slot where
//! an external authenticated-encryption engine sits behind the same
//! [`SecureChannel`] interface, and it is what the CLI and loopback tests
//! run over.

use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::time::sleep;
use tracing::{debug, trace};

use super::{ChannelError, ChannelStatus, InboundMessage, SecureChannel, WireTransport};

/// Upper bound on a single frame, guarding allocation against a corrupted
/// length prefix.
pub const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

/// Hello frame payload: magic plus protocol version.
const HELLO: &[u8; 6] = b"SLNG\x00\x01";

const HEADER_LEN: usize = 4;

/// Pause between write attempts when the transport accepts nothing.
const WRITE_RETRY: Duration = Duration::from_millis(5);

pub struct FramedChannel<T> {
    transport: T,
    delay_threshold_ms: u32,
    hello_sent: bool,
    peer_ready: bool,
    header: [u8; HEADER_LEN],
    header_filled: usize,
    payload: BytesMut,
    payload_expected: Option<usize>,
}

impl<T: WireTransport> FramedChannel<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            delay_threshold_ms: 0,
            hello_sent: false,
            peer_ready: false,
            header: [0; HEADER_LEN],
            header_filled: 0,
            payload: BytesMut::new(),
            payload_expected: None,
        }
    }

    /// Drain whatever bytes the transport has available into the current
    /// frame. Returns the frame payload once complete, `None` when the
    /// transport runs dry first.
    fn pump(&mut self) -> Result<Option<Bytes>, ChannelError> {
        loop {
            match self.payload_expected {
                None => {
                    let n = self
                        .transport
                        .poll_read(&mut self.header[self.header_filled..])
                        .map_err(|_| ChannelError::io())?;
                    if n == 0 {
                        return Ok(None);
                    }
                    self.header_filled += n;
                    if self.header_filled < HEADER_LEN {
                        continue;
                    }
                    let len = u32::from_be_bytes(self.header);
                    if len > MAX_FRAME_LEN {
                        return Err(ChannelError::framing());
                    }
                    self.header_filled = 0;
                    self.payload_expected = Some(len as usize);
                    self.payload.reserve(len as usize);
                }
                Some(expected) => {
                    let remaining = expected - self.payload.len();
                    if remaining == 0 {
                        self.payload_expected = None;
                        return Ok(Some(self.payload.split().freeze()));
                    }
                    let mut buf = [0u8; 4096];
                    let want = remaining.min(buf.len());
                    let n = self
                        .transport
                        .poll_read(&mut buf[..want])
                        .map_err(|_| ChannelError::io())?;
                    if n == 0 {
                        return Ok(None);
                    }
                    self.payload.extend_from_slice(&buf[..n]);
                }
            }
        }
    }

    async fn write_frame(&mut self, payload: &[u8]) -> Result<(), ChannelError> {
        let mut frame = BytesMut::with_capacity(HEADER_LEN + payload.len());
        frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        frame.extend_from_slice(payload);

        let mut rest: &[u8] = &frame;
        while !rest.is_empty() {
            match self.transport.write(rest) {
                Ok(0) => sleep(WRITE_RETRY).await,
                Ok(n) => rest = &rest[n..],
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => sleep(WRITE_RETRY).await,
                Err(_) => return Err(ChannelError::io()),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<T: WireTransport> SecureChannel for FramedChannel<T> {
    fn set_delay_threshold(&mut self, millis: u32) {
        // Held for the protection engine slotted behind this channel; the
        // framing layer itself performs no timestamp checks.
        self.delay_threshold_ms = millis;
    }

    async fn handshake(&mut self) -> Result<ChannelStatus<()>, ChannelError> {
        if !self.hello_sent {
            debug!(
                delay_threshold_ms = self.delay_threshold_ms,
                "sending channel hello"
            );
            self.write_frame(HELLO).await?;
            self.hello_sent = true;
        }
        if self.peer_ready {
            return Ok(ChannelStatus::Ready(()));
        }
        match self.pump()? {
            Some(frame) if frame.as_ref() == HELLO => {
                debug!("peer hello received, channel ready");
                self.peer_ready = true;
                Ok(ChannelStatus::Ready(()))
            }
            Some(_) => Err(ChannelError::handshake()),
            None => Ok(ChannelStatus::Pending),
        }
    }

    async fn send(&mut self, payload: &[u8]) -> Result<(), ChannelError> {
        if !self.peer_ready {
            return Err(ChannelError::handshake());
        }
        trace!(len = payload.len(), "sending frame");
        self.write_frame(payload).await
    }

    async fn recv(&mut self) -> Result<ChannelStatus<InboundMessage>, ChannelError> {
        if !self.peer_ready {
            return Err(ChannelError::handshake());
        }
        match self.pump()? {
            Some(frame) => {
                trace!(len = frame.len(), "frame received");
                Ok(ChannelStatus::Ready(InboundMessage::single(frame)))
            }
            None => Ok(ChannelStatus::Pending),
        }
    }
}
