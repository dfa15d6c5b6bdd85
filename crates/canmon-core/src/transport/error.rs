//! Bus transceiver errors

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// Nothing happened within the allotted time
    #[error("Timeout after {0} ms")]
    Timeout(u64),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Transport not supported: {0}")]
    Unsupported(String),
}

impl BusError {
    /// Timeouts are "no event", everything else is a transport fault
    pub fn is_timeout(&self) -> bool {
        matches!(self, BusError::Timeout(_))
    }
}
