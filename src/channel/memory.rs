//! In-process loopback channel pair.
//!
//! Backs the driver tests and end-to-end scenarios without a real link.
//! Messages pass through unbounded queues; `recv` reports Pending while the
//! queue is empty, so the poll loops behave exactly as they do over a wire.
//! Fault injection lets a test kill the channel after a chosen number of
//! operations.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use super::{ChannelError, ChannelStatus, InboundMessage, SecureChannel};

#[derive(Debug)]
enum Frame {
    Hello,
    Message(Vec<Bytes>),
}

pub struct MemoryChannel {
    tx: mpsc::UnboundedSender<Frame>,
    rx: mpsc::UnboundedReceiver<Frame>,
    hello_sent: bool,
    peer_ready: bool,
    delay_threshold_ms: u32,
    sends_left: Option<u32>,
    recvs_left: Option<u32>,
}

/// Build a connected pair of loopback channels.
pub fn pair() -> (MemoryChannel, MemoryChannel) {
    let (a_tx, a_rx) = mpsc::unbounded_channel();
    let (b_tx, b_rx) = mpsc::unbounded_channel();
    (
        MemoryChannel::new(a_tx, b_rx),
        MemoryChannel::new(b_tx, a_rx),
    )
}

impl MemoryChannel {
    fn new(tx: mpsc::UnboundedSender<Frame>, rx: mpsc::UnboundedReceiver<Frame>) -> Self {
        Self {
            tx,
            rx,
            hello_sent: false,
            peer_ready: false,
            delay_threshold_ms: 0,
            sends_left: None,
            recvs_left: None,
        }
    }

    /// Let the next `n` sends succeed, then fail every send with an I/O
    /// error. Handshake traffic is not counted.
    pub fn fail_send_after(&mut self, n: u32) {
        self.sends_left = Some(n);
    }

    /// Let the next `n` receives succeed, then fail every receive.
    pub fn fail_recv_after(&mut self, n: u32) {
        self.recvs_left = Some(n);
    }

    /// Configured delay-attack threshold, for assertions.
    pub fn delay_threshold_ms(&self) -> u32 {
        self.delay_threshold_ms
    }

    /// Send one message made of several clear-text fragments, emulating an
    /// engine that coalesces fragments into a single encrypted message.
    pub fn send_fragments(&mut self, fragments: Vec<Bytes>) -> Result<(), ChannelError> {
        self.tx
            .send(Frame::Message(fragments))
            .map_err(|_| ChannelError::closed())
    }

    fn countdown(left: &mut Option<u32>) -> Result<(), ChannelError> {
        if let Some(left) = left {
            if *left == 0 {
                return Err(ChannelError::io());
            }
            *left -= 1;
        }
        Ok(())
    }
}

#[async_trait]
impl SecureChannel for MemoryChannel {
    fn set_delay_threshold(&mut self, millis: u32) {
        self.delay_threshold_ms = millis;
    }

    async fn handshake(&mut self) -> Result<ChannelStatus<()>, ChannelError> {
        if !self.hello_sent {
            self.tx
                .send(Frame::Hello)
                .map_err(|_| ChannelError::closed())?;
            self.hello_sent = true;
        }
        if self.peer_ready {
            return Ok(ChannelStatus::Ready(()));
        }
        match self.rx.try_recv() {
            Ok(Frame::Hello) => {
                self.peer_ready = true;
                Ok(ChannelStatus::Ready(()))
            }
            Ok(Frame::Message(_)) => Err(ChannelError::handshake()),
            Err(mpsc::error::TryRecvError::Empty) => Ok(ChannelStatus::Pending),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(ChannelError::closed()),
        }
    }

    async fn send(&mut self, payload: &[u8]) -> Result<(), ChannelError> {
        Self::countdown(&mut self.sends_left)?;
        self.send_fragments(vec![Bytes::copy_from_slice(payload)])
    }

    async fn recv(&mut self) -> Result<ChannelStatus<InboundMessage>, ChannelError> {
        Self::countdown(&mut self.recvs_left)?;
        loop {
            match self.rx.try_recv() {
                Ok(Frame::Message(fragments)) => {
                    return Ok(ChannelStatus::Ready(InboundMessage::from_fragments(
                        fragments,
                    )))
                }
                // A late hello is handshake residue, not payload.
                Ok(Frame::Hello) => continue,
                Err(mpsc::error::TryRecvError::Empty) => return Ok(ChannelStatus::Pending),
                Err(mpsc::error::TryRecvError::Disconnected) => return Err(ChannelError::closed()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::channel::{handshake_ready, recv_ready};

    const POLL: Duration = Duration::from_millis(1);

    #[tokio::test]
    async fn test_pair_handshake_and_roundtrip() {
        let (mut a, mut b) = pair();
        let (ra, rb) = tokio::join!(handshake_ready(&mut a, POLL), handshake_ready(&mut b, POLL));
        ra.unwrap();
        rb.unwrap();

        a.send(b"ping").await.unwrap();
        let msg = recv_ready(&mut b, POLL).await.unwrap();
        assert_eq!(msg.concat().as_ref(), b"ping");
    }

    #[tokio::test]
    async fn test_recv_pending_when_idle() {
        let (mut a, mut b) = pair();
        let (ra, rb) = tokio::join!(handshake_ready(&mut a, POLL), handshake_ready(&mut b, POLL));
        ra.unwrap();
        rb.unwrap();
        assert!(matches!(b.recv().await.unwrap(), ChannelStatus::Pending));
        drop(a);
    }

    #[tokio::test]
    async fn test_fault_injection_on_send() {
        let (mut a, _b) = pair();
        a.fail_send_after(2);
        a.send(b"one").await.unwrap();
        a.send(b"two").await.unwrap();
        assert_eq!(a.send(b"three").await.unwrap_err(), ChannelError::io());
    }

    #[tokio::test]
    async fn test_disconnected_peer_is_closed() {
        let (mut a, b) = pair();
        drop(b);
        assert_eq!(a.send(b"x").await.unwrap_err(), ChannelError::closed());
    }

    #[tokio::test]
    async fn test_multi_fragment_message() {
        let (mut a, mut b) = pair();
        let (ra, rb) = tokio::join!(handshake_ready(&mut a, POLL), handshake_ready(&mut b, POLL));
        ra.unwrap();
        rb.unwrap();

        a.send_fragments(vec![Bytes::from_static(b"ab"), Bytes::from_static(b"cd")])
            .unwrap();
        let msg = recv_ready(&mut b, POLL).await.unwrap();
        assert_eq!(msg.fragments().len(), 2);
        assert_eq!(msg.concat().as_ref(), b"abcd");
    }
}
