//! Response frame filter and status classification

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::frame::Frame;

/// Identifier the ECU answers on (tester listens here)
pub const RESPONSE_ID: u32 = 0x762;

/// Leading payload bytes a response must carry under [`FilterPolicy::Gated`]
const GATE_PREFIX: [u8; 2] = [0x23, 0x00];

/// Discriminating value of payload byte 2
const STATUS_4_MARKER: u8 = 0x88;

/// Which response frames make it into the history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterPolicy {
    /// Keep every frame on the response identifier, without a status
    AcceptAll,
    /// Keep only `23 00 ..` responses and label them
    #[default]
    Gated,
}

impl FilterPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterPolicy::AcceptAll => "accept_all",
            FilterPolicy::Gated => "gated",
        }
    }
}

impl fmt::Display for FilterPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status derived from a gated response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StatusLabel {
    #[serde(rename = "Status 3")]
    Status3,
    #[serde(rename = "Status 4")]
    Status4,
}

impl StatusLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusLabel::Status3 => "Status 3",
            StatusLabel::Status4 => "Status 4",
        }
    }

    /// Byte 2 equal to 0x88 means status 4, anything else status 3
    fn from_marker(byte: Option<u8>) -> Self {
        if byte == Some(STATUS_4_MARKER) {
            StatusLabel::Status4
        } else {
            StatusLabel::Status3
        }
    }
}

impl fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A response frame accepted by the filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifiedRecord {
    frame: Frame,
    status: Option<StatusLabel>,
}

impl ClassifiedRecord {
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// `None` under [`FilterPolicy::AcceptAll`]
    pub fn status(&self) -> Option<StatusLabel> {
        self.status
    }
}

/// Filter and label an inbound frame
///
/// Returns `None` for frames that do not belong in the history. This is
/// ordinary filtering and never an error.
pub fn classify(policy: FilterPolicy, frame: &Frame) -> Option<ClassifiedRecord> {
    if frame.id() != RESPONSE_ID {
        return None;
    }

    match policy {
        FilterPolicy::AcceptAll => Some(ClassifiedRecord {
            frame: *frame,
            status: None,
        }),
        FilterPolicy::Gated => {
            let data = frame.data();
            if !data.starts_with(&GATE_PREFIX) {
                return None;
            }
            Some(ClassifiedRecord {
                frame: *frame,
                status: Some(StatusLabel::from_marker(data.get(2).copied())),
            })
        }
    }
}
