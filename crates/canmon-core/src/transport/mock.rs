//! Mock transceiver for testing

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Mutex as AsyncMutex};

use super::{BusError, BusTransceiver};
use crate::classifier::RESPONSE_ID;
use crate::config::MockConfig;
use crate::frame::Frame;
use crate::sequencer::REQUEST_ID;

/// Single-frame PCI byte carried by the request frames the mock answers
const SINGLE_FRAME_PCI: u8 = 0x02;

/// In-memory bus
///
/// Inbound frames (or errors) are queued with [`MockBus::inject_frame`] and
/// handed out by `receive` in order. Transmitted frames are recorded.
pub struct MockBus {
    config: MockConfig,
    connected: AtomicBool,
    inbound_tx: mpsc::UnboundedSender<Result<Frame, BusError>>,
    inbound_rx: AsyncMutex<mpsc::UnboundedReceiver<Result<Frame, BusError>>>,
    transmitted: Mutex<Vec<Frame>>,
    transmit_attempts: AtomicUsize,
    /// Zero-based transmit attempt that should fail
    fail_transmit_at: Mutex<Option<usize>>,
    replies: AtomicUsize,
}

impl MockBus {
    pub fn new(config: &MockConfig) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            config: config.clone(),
            connected: AtomicBool::new(true),
            inbound_tx,
            inbound_rx: AsyncMutex::new(inbound_rx),
            transmitted: Mutex::new(Vec::new()),
            transmit_attempts: AtomicUsize::new(0),
            fail_transmit_at: Mutex::new(None),
            replies: AtomicUsize::new(0),
        }
    }

    /// Queue a frame for a later `receive`
    pub fn inject_frame(&self, frame: Frame) {
        let _ = self.inbound_tx.send(Ok(frame));
    }

    /// Queue a receive error (e.g. a bus-off report)
    pub fn inject_error(&self, error: BusError) {
        let _ = self.inbound_tx.send(Err(error));
    }

    /// Make the `attempt`-th transmit (zero-based) fail, or clear with `None`
    pub fn fail_transmit_at(&self, attempt: Option<usize>) {
        *self.fail_transmit_at.lock() = attempt;
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Frames successfully transmitted so far
    pub fn transmitted(&self) -> Vec<Frame> {
        self.transmitted.lock().clone()
    }

    /// Transmit calls so far, failed ones included
    pub fn transmit_attempts(&self) -> usize {
        self.transmit_attempts.load(Ordering::SeqCst)
    }

    /// Synthetic ECU reply to a request frame; alternates status 3 and 4
    fn reply_to(&self, request: &Frame) -> Option<Frame> {
        if request.id() != REQUEST_ID || request.data().first() != Some(&SINGLE_FRAME_PCI) {
            return None;
        }
        let n = self.replies.fetch_add(1, Ordering::SeqCst);
        let marker = if n % 2 == 0 { 0x05 } else { 0x88 };
        Frame::new(RESPONSE_ID, &[0x23, 0x00, marker, n as u8, 0x00, 0x00, 0x00, 0x00]).ok()
    }
}

#[async_trait]
impl BusTransceiver for MockBus {
    async fn transmit(&self, frame: &Frame, _timeout: Duration) -> Result<(), BusError> {
        let attempt = self.transmit_attempts.fetch_add(1, Ordering::SeqCst);

        if !self.connected.load(Ordering::SeqCst) {
            return Err(BusError::ConnectionClosed);
        }

        if *self.fail_transmit_at.lock() == Some(attempt) {
            return Err(BusError::SendFailed(format!(
                "injected failure on attempt {}",
                attempt
            )));
        }

        // Simulate latency
        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }

        tracing::debug!(%frame, "Mock bus: frame transmitted");
        self.transmitted.lock().push(*frame);

        if self.config.simulate_responses {
            if let Some(reply) = self.reply_to(frame) {
                self.inject_frame(reply);
            }
        }

        Ok(())
    }

    async fn receive(&self, timeout: Duration) -> Result<Frame, BusError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(BusError::ConnectionClosed);
        }

        let mut rx = self.inbound_rx.lock().await;
        match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(Some(result)) => result,
            Ok(None) => Err(BusError::ConnectionClosed),
            Err(_) => Err(BusError::Timeout(timeout.as_millis() as u64)),
        }
    }

    fn interface(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bus(simulate_responses: bool) -> MockBus {
        MockBus::new(&MockConfig {
            latency_ms: 0,
            simulate_responses,
        })
    }

    #[tokio::test]
    async fn test_receive_returns_injected_frames_in_order() {
        let bus = bus(false);
        let a = Frame::new(0x762, &[0x23, 0x00, 0x88]).unwrap();
        let b = Frame::new(0x123, &[0x01]).unwrap();
        bus.inject_frame(a);
        bus.inject_frame(b);

        let timeout = Duration::from_millis(50);
        assert_eq!(bus.receive(timeout).await.unwrap(), a);
        assert_eq!(bus.receive(timeout).await.unwrap(), b);
    }

    #[tokio::test]
    async fn test_receive_times_out_when_idle() {
        let bus = bus(false);
        let err = bus.receive(Duration::from_millis(10)).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_injected_failure_is_reported_once() {
        let bus = bus(false);
        bus.fail_transmit_at(Some(1));
        let frame = Frame::new(0x742, &[0x30]).unwrap();
        let timeout = Duration::from_millis(10);

        assert!(bus.transmit(&frame, timeout).await.is_ok());
        assert!(matches!(
            bus.transmit(&frame, timeout).await,
            Err(BusError::SendFailed(_))
        ));
        assert!(bus.transmit(&frame, timeout).await.is_ok());
        assert_eq!(bus.transmit_attempts(), 3);
        assert_eq!(bus.transmitted().len(), 2);
    }

    #[tokio::test]
    async fn test_disconnected_bus_rejects_calls() {
        let bus = bus(false);
        bus.set_connected(false);
        let frame = Frame::new(0x742, &[0x30]).unwrap();
        assert_eq!(
            bus.transmit(&frame, Duration::from_millis(10)).await,
            Err(BusError::ConnectionClosed)
        );
        assert_eq!(
            bus.receive(Duration::from_millis(10)).await,
            Err(BusError::ConnectionClosed)
        );
    }

    #[tokio::test]
    async fn test_simulated_replies_only_for_single_frame_requests() {
        let bus = bus(true);
        let timeout = Duration::from_millis(10);
        bus.transmit(&Frame::new(0x742, &[0x30, 0x00]).unwrap(), timeout)
            .await
            .unwrap();
        assert!(bus.receive(timeout).await.unwrap_err().is_timeout());

        bus.transmit(&Frame::new(0x742, &[0x02, 0x21, 0x80]).unwrap(), timeout)
            .await
            .unwrap();
        let reply = bus.receive(timeout).await.unwrap();
        assert_eq!(reply.id(), RESPONSE_ID);
        assert_eq!(&reply.data()[..3], &[0x23, 0x00, 0x05]);
    }
}
