//! Mock transport for testing the engine without a bus.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{Transport, TransportError, TransportFrame};

const QUEUE_DEPTH: usize = 64;

/// A scripted transport: every `send` pops one reply batch and feeds it
/// to the inbound queue, so tests control exactly which frames the
/// dispatch loop sees and in which order. Frames can also be injected
/// directly (unsolicited traffic, pending responses), sends can be made
/// to fail, and `close` ends the inbound stream the orderly way.
pub struct MockTransport {
    inbound_rx: tokio::sync::Mutex<mpsc::Receiver<TransportFrame>>,
    inbound_tx: Mutex<Option<mpsc::Sender<TransportFrame>>>,
    replies: Mutex<VecDeque<Vec<TransportFrame>>>,
    sent: Mutex<Vec<TransportFrame>>,
    fail_sends: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(QUEUE_DEPTH);
        Self {
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
            inbound_tx: Mutex::new(Some(inbound_tx)),
            replies: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
        }
    }

    /// Script the reply batch delivered after the next unscripted `send`.
    /// Batches are consumed in FIFO order, one per send.
    pub fn enqueue_reply(&self, frames: Vec<TransportFrame>) {
        self.replies.lock().push_back(frames);
    }

    /// Push a frame into the inbound queue immediately.
    pub fn inject(&self, frame: TransportFrame) {
        if let Some(tx) = self.inbound_tx.lock().as_ref() {
            tx.try_send(frame).expect("mock inbound queue full");
        }
    }

    /// End the inbound stream; the dispatch loop sees `Ok(None)`.
    pub fn close(&self) {
        self.inbound_tx.lock().take();
    }

    /// Make subsequent sends fail with a transport error.
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Everything written to the transport so far.
    pub fn sent(&self) -> Vec<TransportFrame> {
        self.sent.lock().clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn recv(&self) -> Result<Option<TransportFrame>, TransportError> {
        Ok(self.inbound_rx.lock().await.recv().await)
    }

    async fn send(&self, address: u32, data: &[u8]) -> Result<(), TransportError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::SendFailed(
                "mock transport configured to fail".to_string(),
            ));
        }

        self.sent.lock().push(TransportFrame::new(address, data.to_vec()));

        let batch = self.replies.lock().pop_front();
        if let Some(frames) = batch {
            for frame in frames {
                self.inject(frame);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_replies_follow_sends() {
        let transport = MockTransport::new();
        transport.enqueue_reply(vec![TransportFrame::new(0x7E8, vec![0x50, 0x03])]);

        transport.send(0x7E0, &[0x10, 0x03]).await.unwrap();
        let frame = transport.recv().await.unwrap().unwrap();
        assert_eq!(frame.data, vec![0x50, 0x03]);
        assert_eq!(transport.sent()[0].data, vec![0x10, 0x03]);
    }

    #[tokio::test]
    async fn close_ends_the_stream() {
        let transport = MockTransport::new();
        transport.close();
        assert!(transport.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failing_sends_surface_errors() {
        let transport = MockTransport::new();
        transport.fail_sends(true);
        assert!(transport.send(0x7E0, &[0x3E, 0x00]).await.is_err());
        assert!(transport.sent().is_empty());
    }
}
