//! Classic CAN frame model

use std::fmt;

use thiserror::Error;

/// Highest 11-bit (standard) identifier
pub const STANDARD_ID_MAX: u32 = 0x7FF;

/// Highest 29-bit (extended) identifier
pub const EXTENDED_ID_MAX: u32 = 0x1FFF_FFFF;

/// Errors raised when building a frame
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("CAN identifier 0x{0:X} exceeds 29 bits")]
    InvalidId(u32),

    #[error("payload of {0} bytes exceeds the 8-byte classic CAN limit")]
    PayloadTooLong(usize),
}

/// A classic CAN data frame
///
/// The payload is stored inline; bytes past `dlc` are always zero so two
/// frames with the same visible payload compare equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Frame {
    id: u32,
    dlc: u8,
    data: [u8; Frame::MAX_DLC],
}

impl Frame {
    /// Maximum payload length of a classic CAN frame
    pub const MAX_DLC: usize = 8;

    /// Build a full 8-byte frame at compile time
    ///
    /// Used for the static request table; the identifier is not range
    /// checked, callers pass known-good constants.
    pub const fn from_parts(id: u32, data: [u8; Frame::MAX_DLC]) -> Self {
        Self {
            id,
            dlc: Frame::MAX_DLC as u8,
            data,
        }
    }

    /// Build a frame from an identifier and up to 8 payload bytes
    pub fn new(id: u32, payload: &[u8]) -> Result<Self, FrameError> {
        if id > EXTENDED_ID_MAX {
            return Err(FrameError::InvalidId(id));
        }
        if payload.len() > Self::MAX_DLC {
            return Err(FrameError::PayloadTooLong(payload.len()));
        }

        let mut data = [0u8; Self::MAX_DLC];
        data[..payload.len()].copy_from_slice(payload);

        Ok(Self {
            id,
            dlc: payload.len() as u8,
            data,
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn dlc(&self) -> u8 {
        self.dlc
    }

    /// Payload bytes, exactly `dlc` long
    pub fn data(&self) -> &[u8] {
        &self.data[..self.dlc as usize]
    }

    /// Whether the identifier needs the 29-bit format
    pub fn is_extended(&self) -> bool {
        self.id > STANDARD_ID_MAX
    }

    /// Payload as space separated upper-case hex, e.g. `23 00 88`
    pub fn spaced_hex(&self) -> String {
        self.data()
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Payload as compact upper-case hex, e.g. `230088`
    pub fn compact_hex(&self) -> String {
        hex::encode_upper(self.data())
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("id", &format_args!("0x{:03X}", self.id))
            .field("dlc", &self.dlc)
            .field("data", &format_args!("[{}]", self.spaced_hex()))
            .finish()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:03X} [{}] {}", self.id, self.dlc, self.spaced_hex())
    }
}
