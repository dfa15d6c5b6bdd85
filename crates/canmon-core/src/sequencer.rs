//! Diagnostic request sequencer
//!
//! Sends the fixed 7-frame request / flow-control exchange on the tester
//! identifier. No response is awaited between frames; the pacing delay is
//! the only coupling to the ECU.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::frame::Frame;
use crate::shutdown::ShutdownSignal;
use crate::transport::{BusError, BusTransceiver};

/// Identifier the tester sends on
pub const REQUEST_ID: u32 = 0x742;

/// Flow-control frame: continue to send, no block limit, no separation time
const FLOW_CONTROL: [u8; 8] = [0x30, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];

/// The request exchange, in transmission order
pub static DIAGNOSTIC_SEQUENCE: [Frame; 7] = [
    Frame::from_parts(REQUEST_ID, [0x02, 0x10, 0xC0, 0x00, 0x00, 0x00, 0x00, 0x00]),
    Frame::from_parts(REQUEST_ID, [0x02, 0x21, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00]),
    Frame::from_parts(REQUEST_ID, FLOW_CONTROL),
    Frame::from_parts(REQUEST_ID, [0x02, 0x21, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00]),
    Frame::from_parts(REQUEST_ID, [0x02, 0x21, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00]),
    Frame::from_parts(REQUEST_ID, [0x02, 0x21, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00]),
    Frame::from_parts(REQUEST_ID, FLOW_CONTROL),
];

/// Default per-frame transmit timeout
pub const DEFAULT_TRANSMIT_TIMEOUT: Duration = Duration::from_millis(1000);

/// How the sequence is triggered in a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequencerMode {
    /// Once per control request
    #[default]
    OnDemand,
    /// Forever, on its own task, with a pause between passes
    FreeRunning,
}

impl SequencerMode {
    /// Reference pacing between frames for this mode
    pub fn default_frame_delay(&self) -> Duration {
        match self {
            SequencerMode::OnDemand => Duration::from_millis(100),
            SequencerMode::FreeRunning => Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SequenceError {
    /// Frame `step` (1-based) was not accepted by the bus; later frames were not sent
    #[error("Transmit of frame {step}/{total} failed: {source}")]
    Transmit {
        step: usize,
        total: usize,
        #[source]
        source: BusError,
    },
}

impl SequenceError {
    pub fn step(&self) -> usize {
        match self {
            SequenceError::Transmit { step, .. } => *step,
        }
    }

    pub fn bus_error(&self) -> &BusError {
        match self {
            SequenceError::Transmit { source, .. } => source,
        }
    }
}

/// Outcome of a completed pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceReport {
    pub frames_sent: usize,
    pub elapsed: Duration,
}

/// Sends [`DIAGNOSTIC_SEQUENCE`] over a bus
///
/// Passes never interleave: a second caller waits until the running pass
/// has finished.
pub struct DiagnosticSequencer {
    bus: Arc<dyn BusTransceiver>,
    frames: &'static [Frame],
    transmit_timeout: Duration,
    frame_delay: Duration,
    exchange: Mutex<()>,
}

impl DiagnosticSequencer {
    pub fn new(bus: Arc<dyn BusTransceiver>) -> Self {
        Self {
            bus,
            frames: &DIAGNOSTIC_SEQUENCE,
            transmit_timeout: DEFAULT_TRANSMIT_TIMEOUT,
            frame_delay: SequencerMode::OnDemand.default_frame_delay(),
            exchange: Mutex::new(()),
        }
    }

    pub fn with_timing(mut self, transmit_timeout: Duration, frame_delay: Duration) -> Self {
        self.transmit_timeout = transmit_timeout;
        self.frame_delay = frame_delay;
        self
    }

    pub fn frames(&self) -> &[Frame] {
        self.frames
    }

    pub fn frame_delay(&self) -> Duration {
        self.frame_delay
    }

    /// Transmit every frame in order, pausing `frame_delay` after each
    ///
    /// # Errors
    /// The first transmit failure, timeouts included, aborts the pass. The
    /// error names the failing step.
    pub async fn send_sequence(&self) -> Result<SequenceReport, SequenceError> {
        let _exchange = self.exchange.lock().await;
        let started = Instant::now();
        let total = self.frames.len();

        for (index, frame) in self.frames.iter().enumerate() {
            let step = index + 1;
            if let Err(source) = self.bus.transmit(frame, self.transmit_timeout).await {
                warn!(step, total, error = %source, "Diagnostic sequence aborted");
                return Err(SequenceError::Transmit {
                    step,
                    total,
                    source,
                });
            }
            debug!(
                step,
                id = format!("0x{:03X}", frame.id()),
                dlc = frame.dlc(),
                "Message sent"
            );
            tokio::time::sleep(self.frame_delay).await;
        }

        let report = SequenceReport {
            frames_sent: total,
            elapsed: started.elapsed(),
        };
        info!(
            frames = report.frames_sent,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Diagnostic sequence sent"
        );
        Ok(report)
    }

    /// Send passes back to back with `cycle_pause` in between until `shutdown`
    ///
    /// Failed passes are logged and the next pass starts on schedule.
    /// Returns the number of passes that completed.
    pub async fn run_periodic(&self, cycle_pause: Duration, mut shutdown: ShutdownSignal) -> u64 {
        let mut completed = 0u64;

        info!(
            interface = self.bus.interface(),
            frame_delay_ms = self.frame_delay.as_millis() as u64,
            cycle_pause_ms = cycle_pause.as_millis() as u64,
            "Free-running sequencer started"
        );

        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                result = self.send_sequence() => {
                    if result.is_ok() {
                        completed += 1;
                    }
                }
            }

            tokio::select! {
                _ = shutdown.wait() => break,
                _ = tokio::time::sleep(cycle_pause) => {}
            }
        }

        info!(completed, "Free-running sequencer stopped");
        completed
    }

    /// Run [`Self::run_periodic`] on a dedicated task
    pub fn spawn_periodic(
        self: Arc<Self>,
        cycle_pause: Duration,
        shutdown: ShutdownSignal,
    ) -> JoinHandle<u64> {
        tokio::spawn(async move { self.run_periodic(cycle_pause, shutdown).await })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::MockConfig;
    use crate::shutdown::Shutdown;
    use crate::transport::mock::MockBus;

    fn setup() -> (Arc<MockBus>, DiagnosticSequencer) {
        let bus = Arc::new(MockBus::new(&MockConfig::default()));
        let sequencer = DiagnosticSequencer::new(bus.clone())
            .with_timing(Duration::from_millis(10), Duration::ZERO);
        (bus, sequencer)
    }

    #[test]
    fn test_sequence_literal() {
        let payloads: Vec<String> = DIAGNOSTIC_SEQUENCE.iter().map(|f| f.compact_hex()).collect();
        assert_eq!(
            payloads,
            vec![
                "0210C00000000000",
                "0221800000000000",
                "3000000000000000",
                "0221030000000000",
                "0221040000000000",
                "0221010000000000",
                "3000000000000000",
            ]
        );
        assert!(DIAGNOSTIC_SEQUENCE
            .iter()
            .all(|f| f.id() == REQUEST_ID && f.dlc() == 8));
    }

    #[tokio::test]
    async fn test_sends_all_frames_in_order() {
        let (bus, sequencer) = setup();
        let report = sequencer.send_sequence().await.unwrap();

        assert_eq!(report.frames_sent, 7);
        assert_eq!(bus.transmit_attempts(), 7);
        assert_eq!(bus.transmitted(), DIAGNOSTIC_SEQUENCE.to_vec());
    }

    #[tokio::test]
    async fn test_third_frame_failure_aborts() {
        let (bus, sequencer) = setup();
        bus.fail_transmit_at(Some(2));

        let err = sequencer.send_sequence().await.unwrap_err();
        assert_eq!(err.step(), 3);
        assert!(matches!(err.bus_error(), BusError::SendFailed(_)));
        assert_eq!(bus.transmit_attempts(), 3);
        assert_eq!(bus.transmitted(), DIAGNOSTIC_SEQUENCE[..2].to_vec());
    }

    #[tokio::test]
    async fn test_disconnected_bus_fails_first_step() {
        let (bus, sequencer) = setup();
        bus.set_connected(false);

        let err = sequencer.send_sequence().await.unwrap_err();
        assert_eq!(
            err,
            SequenceError::Transmit {
                step: 1,
                total: 7,
                source: BusError::ConnectionClosed,
            }
        );
        assert_eq!(bus.transmit_attempts(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_passes_do_not_interleave() {
        let bus = Arc::new(MockBus::new(&MockConfig::default()));
        let sequencer = Arc::new(
            DiagnosticSequencer::new(bus.clone())
                .with_timing(Duration::from_millis(10), Duration::from_millis(1)),
        );

        let a = tokio::spawn({
            let sequencer = sequencer.clone();
            async move { sequencer.send_sequence().await }
        });
        let b = tokio::spawn({
            let sequencer = sequencer.clone();
            async move { sequencer.send_sequence().await }
        });
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let mut expected = DIAGNOSTIC_SEQUENCE.to_vec();
        expected.extend_from_slice(&DIAGNOSTIC_SEQUENCE);
        assert_eq!(bus.transmitted(), expected);
    }

    #[tokio::test]
    async fn test_periodic_runs_until_shutdown() {
        let (bus, sequencer) = setup();
        let sequencer = Arc::new(sequencer);
        let shutdown = Shutdown::new();
        let handle = sequencer
            .clone()
            .spawn_periodic(Duration::from_millis(5), shutdown.signal());

        tokio::time::timeout(Duration::from_secs(2), async {
            while bus.transmitted().len() < 14 {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .unwrap();
        shutdown.trigger();

        let completed = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(completed >= 2);
        assert_eq!(&bus.transmitted()[..7], &DIAGNOSTIC_SEQUENCE[..]);
    }

    #[tokio::test]
    async fn test_periodic_continues_after_failed_pass() {
        let (bus, sequencer) = setup();
        bus.fail_transmit_at(Some(0));
        let sequencer = Arc::new(sequencer);
        let shutdown = Shutdown::new();
        let handle = sequencer
            .clone()
            .spawn_periodic(Duration::from_millis(1), shutdown.signal());

        tokio::time::timeout(Duration::from_secs(2), async {
            while bus.transmitted().len() < 7 {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .unwrap();
        shutdown.trigger();
        handle.await.unwrap();

        assert_eq!(&bus.transmitted()[..7], &DIAGNOSTIC_SEQUENCE[..]);
    }
}
