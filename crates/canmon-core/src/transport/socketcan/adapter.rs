//! SocketCAN transceiver on a raw CAN socket

use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use socketcan::{
    CanFrame, CanSocket, EmbeddedFrame, ExtendedId, Frame as _, Id, Socket, StandardId,
};
use tokio::sync::Mutex;

use crate::config::SocketCanConfig;
use crate::frame::Frame;
use crate::transport::{BusError, BusTransceiver};

/// Raw CAN socket bound to one interface
///
/// Reads and writes go through the same socket from blocking worker
/// threads. Writes are serialized by `tx_lock`; a read may run alongside.
pub struct SocketCanBus {
    interface: String,
    socket: Arc<CanSocket>,
    tx_lock: Mutex<()>,
}

impl SocketCanBus {
    pub fn open(config: &SocketCanConfig) -> Result<Self, BusError> {
        let socket = CanSocket::open(&config.interface).map_err(|e| {
            BusError::ConnectionFailed(format!(
                "Failed to open CAN socket on {}: {}",
                config.interface, e
            ))
        })?;

        tracing::info!(
            interface = %config.interface,
            bitrate = config.bitrate,
            "SocketCAN interface opened"
        );

        Ok(Self {
            interface: config.interface.clone(),
            socket: Arc::new(socket),
            tx_lock: Mutex::new(()),
        })
    }
}

fn to_socketcan(frame: &Frame) -> Result<CanFrame, BusError> {
    let id: Id = if frame.is_extended() {
        ExtendedId::new(frame.id()).map(Id::Extended)
    } else {
        StandardId::new(frame.id() as u16).map(Id::Standard)
    }
    .ok_or_else(|| BusError::SendFailed(format!("Invalid CAN ID: 0x{:X}", frame.id())))?;

    CanFrame::new(id, frame.data())
        .ok_or_else(|| BusError::SendFailed(format!("Invalid CAN frame: {}", frame)))
}

fn from_socketcan(frame: CanFrame) -> Result<Frame, BusError> {
    match frame {
        CanFrame::Data(data) => Frame::new(data.raw_id(), data.data())
            .map_err(|e| BusError::ReceiveFailed(e.to_string())),
        CanFrame::Remote(remote) => {
            Frame::new(remote.raw_id(), &[]).map_err(|e| BusError::ReceiveFailed(e.to_string()))
        }
        CanFrame::Error(err) => Err(BusError::ReceiveFailed(format!(
            "Bus error frame 0x{:08X}",
            err.raw_id()
        ))),
    }
}

fn is_timeout(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

#[async_trait]
impl BusTransceiver for SocketCanBus {
    async fn transmit(&self, frame: &Frame, timeout: Duration) -> Result<(), BusError> {
        let can_frame = to_socketcan(frame)?;
        let socket = self.socket.clone();
        let timeout_ms = timeout.as_millis() as u64;

        let _guard = self.tx_lock.lock().await;
        tokio::task::spawn_blocking(move || {
            socket
                .set_write_timeout(timeout)
                .map_err(|e| BusError::SendFailed(format!("Failed to set write timeout: {}", e)))?;
            socket.write_frame(&can_frame).map_err(|e| {
                if is_timeout(e.kind()) {
                    BusError::Timeout(timeout_ms)
                } else {
                    BusError::SendFailed(e.to_string())
                }
            })
        })
        .await
        .map_err(|e| BusError::SendFailed(format!("Task join error: {}", e)))?
    }

    async fn receive(&self, timeout: Duration) -> Result<Frame, BusError> {
        let socket = self.socket.clone();
        let timeout_ms = timeout.as_millis() as u64;

        let frame = tokio::task::spawn_blocking(move || {
            socket.read_frame_timeout(timeout).map_err(|e| {
                if is_timeout(e.kind()) {
                    BusError::Timeout(timeout_ms)
                } else {
                    BusError::ReceiveFailed(e.to_string())
                }
            })
        })
        .await
        .map_err(|e| BusError::ReceiveFailed(format!("Task join error: {}", e)))??;

        from_socketcan(frame)
    }

    fn interface(&self) -> &str {
        &self.interface
    }
}
