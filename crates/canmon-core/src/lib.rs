//! canmon-core - CAN diagnostic pipeline
//!
//! This crate holds everything between the CAN transceiver and the HTTP
//! monitor: the frame model, the response filter, the bounded message
//! history and the fixed diagnostic request sequence.
//!
//! # Architecture
//!
//! ```text
//!        ┌──────────────────┐   snapshot()   ┌────────────────────┐
//!        │   MessageStore   │◄───────────────│  HTTP (canmon-api) │
//!        │  (ring, cap N)   │                └─────────┬──────────┘
//!        └────────▲─────────┘                          │ send now
//!                 │ push()                             ▼
//!        ┌────────┴─────────┐               ┌────────────────────┐
//!        │   ReceiveLoop    │               │DiagnosticSequencer │
//!        │ classify(0x762)  │               │  7 frames on 0x742 │
//!        └────────▲─────────┘               └─────────┬──────────┘
//!                 │ receive()                         │ transmit()
//!        ┌────────┴───────────────────────────────────▼──────────┐
//!        │                 BusTransceiver                         │
//!        │              (SocketCAN / mock)                        │
//!        └────────────────────────────────────────────────────────┘
//! ```

pub mod classifier;
pub mod config;
pub mod frame;
pub mod receiver;
pub mod sequencer;
pub mod shutdown;
pub mod store;
pub mod transport;

pub use classifier::{classify, ClassifiedRecord, FilterPolicy, StatusLabel, RESPONSE_ID};
pub use config::{BridgeConfig, ConfigError};
pub use frame::{Frame, FrameError};
pub use receiver::{PollOutcome, ReceiveLoop, ReceiveStats};
pub use sequencer::{
    DiagnosticSequencer, SequenceError, SequenceReport, SequencerMode, DIAGNOSTIC_SEQUENCE,
    REQUEST_ID,
};
pub use shutdown::{Shutdown, ShutdownSignal};
pub use store::{HistoryEntry, MessageStore};
pub use transport::{create_transport, BusError, BusTransceiver};
