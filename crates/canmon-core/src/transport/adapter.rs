//! Bus transceiver trait

use std::time::Duration;

use async_trait::async_trait;

use super::BusError;
use crate::frame::Frame;

/// Frame-level access to a CAN bus
///
/// Both calls suspend the caller for at most `timeout`. Implementations
/// must allow one `receive` to run alongside one `transmit`, and must
/// serialize concurrent `transmit` calls.
#[async_trait]
pub trait BusTransceiver: Send + Sync {
    /// Queue a frame for transmission
    ///
    /// # Errors
    /// [`BusError::Timeout`] when the frame could not be queued in time,
    /// any other variant for bus faults.
    async fn transmit(&self, frame: &Frame, timeout: Duration) -> Result<(), BusError>;

    /// Wait for the next frame on the bus
    ///
    /// # Errors
    /// [`BusError::Timeout`] when no frame arrived in time. Callers treat
    /// that as "no event".
    async fn receive(&self, timeout: Duration) -> Result<Frame, BusError>;

    /// Human-readable name of the underlying interface
    fn interface(&self) -> &str;
}
