//! Transport layer for raw CAN frames
//!
//! This module provides the transceivers the pipeline runs on:
//! - SocketCAN adapter for raw CAN (Linux only)
//! - Mock adapter for testing and hardware-free demos
//!
//! # Example
//!
//! ```ignore
//! use canmon_core::config::TransportConfig;
//! use canmon_core::transport::create_transport;
//!
//! let bus = create_transport(&TransportConfig::default())?;
//! let frame = bus.receive(Duration::from_millis(1000)).await?;
//! ```

mod adapter;
pub mod error;
pub mod mock;

#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub mod socketcan;

pub use adapter::BusTransceiver;
pub use error::BusError;

use std::sync::Arc;

use crate::config::TransportConfig;

/// Create a bus transceiver based on configuration
pub fn create_transport(config: &TransportConfig) -> Result<Arc<dyn BusTransceiver>, BusError> {
    match config {
        #[cfg(all(target_os = "linux", feature = "socketcan"))]
        TransportConfig::SocketCan(cfg) => {
            let adapter = socketcan::SocketCanBus::open(cfg)?;
            Ok(Arc::new(adapter))
        }
        #[cfg(not(all(target_os = "linux", feature = "socketcan")))]
        TransportConfig::SocketCan(_) => Err(BusError::Unsupported(
            "SocketCAN requires Linux and the 'socketcan' feature".to_string(),
        )),
        TransportConfig::Mock(cfg) => Ok(Arc::new(mock::MockBus::new(cfg))),
    }
}
