//! Receive loop: bus → classifier → message store

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::classifier::{classify, FilterPolicy};
use crate::shutdown::ShutdownSignal;
use crate::store::MessageStore;
use crate::transport::{BusError, BusTransceiver};

/// Default receive timeout per poll
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Pause after a transport fault before polling again
const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Result of a single poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A frame was accepted and stored under this sequence number
    Stored(u64),
    /// A frame arrived but the filter dropped it
    Filtered,
    /// No frame within the receive timeout
    Idle,
}

/// Counters reported when the loop stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiveStats {
    pub frames: u64,
    pub stored: u64,
    pub idle_polls: u64,
    pub errors: u64,
}

/// Producer side of the pipeline
///
/// The only writer of the [`MessageStore`]. Timeouts and transport faults
/// never end the loop; only the shutdown signal does.
pub struct ReceiveLoop {
    bus: Arc<dyn BusTransceiver>,
    store: Arc<MessageStore>,
    policy: FilterPolicy,
    timeout: Duration,
    error_backoff: Duration,
}

impl ReceiveLoop {
    pub fn new(bus: Arc<dyn BusTransceiver>, store: Arc<MessageStore>, policy: FilterPolicy) -> Self {
        Self {
            bus,
            store,
            policy,
            timeout: DEFAULT_RECEIVE_TIMEOUT,
            error_backoff: ERROR_BACKOFF,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff = backoff;
        self
    }

    /// Receive at most one frame and store it if the filter accepts it
    ///
    /// # Errors
    /// Transport faults other than a timeout.
    pub async fn poll_once(&self) -> Result<PollOutcome, BusError> {
        let frame = match self.bus.receive(self.timeout).await {
            Ok(frame) => frame,
            Err(e) if e.is_timeout() => return Ok(PollOutcome::Idle),
            Err(e) => return Err(e),
        };

        debug!(%frame, "Frame received");

        let Some(record) = classify(self.policy, &frame) else {
            return Ok(PollOutcome::Filtered);
        };

        let seq = self.store.push(record);
        info!(
            seq,
            id = format!("0x{:03X}", frame.id()),
            dlc = frame.dlc(),
            data = %frame.spaced_hex(),
            status = record.status().map(|s| s.as_str()).unwrap_or("-"),
            "Filtered message stored"
        );
        Ok(PollOutcome::Stored(seq))
    }

    /// Poll until `shutdown` fires
    pub async fn run(self, mut shutdown: ShutdownSignal) -> ReceiveStats {
        let mut stats = ReceiveStats::default();

        info!(
            interface = self.bus.interface(),
            policy = %self.policy,
            capacity = self.store.capacity(),
            "Receive loop started"
        );

        loop {
            let outcome = tokio::select! {
                _ = shutdown.wait() => break,
                outcome = self.poll_once() => outcome,
            };

            match outcome {
                Ok(PollOutcome::Stored(_)) => {
                    stats.frames += 1;
                    stats.stored += 1;
                }
                Ok(PollOutcome::Filtered) => stats.frames += 1,
                Ok(PollOutcome::Idle) => stats.idle_polls += 1,
                Err(e) => {
                    stats.errors += 1;
                    warn!(error = %e, "Bus receive failed, continuing");
                    tokio::select! {
                        _ = shutdown.wait() => break,
                        _ = tokio::time::sleep(self.error_backoff) => {}
                    }
                }
            }
        }

        info!(?stats, "Receive loop stopped");
        stats
    }

    /// Run on a dedicated task
    pub fn spawn(self, shutdown: ShutdownSignal) -> JoinHandle<ReceiveStats> {
        tokio::spawn(self.run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::classifier::StatusLabel;
    use crate::config::MockConfig;
    use crate::frame::Frame;
    use crate::shutdown::Shutdown;
    use crate::transport::mock::MockBus;

    fn setup(policy: FilterPolicy) -> (Arc<MockBus>, Arc<MessageStore>, ReceiveLoop) {
        let bus = Arc::new(MockBus::new(&MockConfig::default()));
        let store = Arc::new(MessageStore::default());
        let receiver = ReceiveLoop::new(bus.clone(), store.clone(), policy)
            .with_timeout(Duration::from_millis(20))
            .with_error_backoff(Duration::from_millis(1));
        (bus, store, receiver)
    }

    fn frame(id: u32, payload: &[u8]) -> Frame {
        Frame::new(id, payload).unwrap()
    }

    #[tokio::test]
    async fn test_poll_outcomes() {
        let (bus, store, receiver) = setup(FilterPolicy::Gated);

        assert_eq!(receiver.poll_once().await, Ok(PollOutcome::Idle));

        bus.inject_frame(frame(0x123, &[0x23, 0x00, 0x88]));
        assert_eq!(receiver.poll_once().await, Ok(PollOutcome::Filtered));

        bus.inject_frame(frame(0x762, &[0x23, 0x00, 0x88]));
        assert_eq!(receiver.poll_once().await, Ok(PollOutcome::Stored(0)));

        bus.inject_error(BusError::ReceiveFailed("bus-off".into()));
        assert!(receiver.poll_once().await.is_err());

        assert_eq!(store.len(), 1);
        assert_eq!(
            store.snapshot()[0].record.status(),
            Some(StatusLabel::Status4)
        );
    }

    #[tokio::test]
    async fn test_loop_survives_errors_and_stops_on_signal() {
        let (bus, store, receiver) = setup(FilterPolicy::Gated);
        let shutdown = Shutdown::new();
        let handle = receiver.spawn(shutdown.signal());

        bus.inject_frame(frame(0x762, &[0x23, 0x00, 0x05]));
        bus.inject_error(BusError::ReceiveFailed("arbitration lost".into()));
        bus.inject_frame(frame(0x762, &[0x01, 0x00, 0x05]));
        bus.inject_frame(frame(0x762, &[0x23, 0x00, 0x88]));

        wait_for_len(&store, 2).await;
        shutdown.trigger();

        let stats = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.frames, 3);
        assert_eq!(stats.stored, 2);

        let statuses: Vec<_> = store
            .snapshot()
            .iter()
            .map(|e| e.record.status())
            .collect();
        assert_eq!(
            statuses,
            vec![Some(StatusLabel::Status3), Some(StatusLabel::Status4)]
        );
    }

    #[tokio::test]
    async fn test_accept_all_stores_every_response_frame() {
        let (bus, store, receiver) = setup(FilterPolicy::AcceptAll);
        let shutdown = Shutdown::new();
        let handle = receiver.spawn(shutdown.signal());

        bus.inject_frame(frame(0x762, &[0x01]));
        bus.inject_frame(frame(0x742, &[0x02, 0x10, 0xC0]));
        bus.inject_frame(frame(0x762, &[0x23, 0x00, 0x88]));

        wait_for_len(&store, 2).await;
        shutdown.trigger();
        handle.await.unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.iter().all(|e| e.record.status().is_none()));
        assert_eq!(snapshot[0].record.frame().data(), &[0x01]);
    }

    #[tokio::test]
    async fn test_idle_loop_stops_promptly() {
        let (_bus, _store, receiver) = setup(FilterPolicy::Gated);
        let receiver = receiver.with_timeout(Duration::from_secs(30));
        let shutdown = Shutdown::new();
        let handle = receiver.spawn(shutdown.signal());

        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.trigger();

        let stats = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats, ReceiveStats::default());
    }

    async fn wait_for_len(store: &MessageStore, len: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while store.len() < len {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("store did not fill in time");
    }
}
