//! Bridge configuration
//!
//! Every section is optional; an empty file yields the reference
//! deployment (gated filter, 20-entry history, on-demand sequencer).

use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classifier::FilterPolicy;
use crate::sequencer::SequencerMode;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub receive: ReceiveConfig,
    #[serde(default)]
    pub sequencer: SequencerConfig,
}

impl BridgeConfig {
    /// Load and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history.capacity == 0 {
            return Err(ConfigError::Invalid(
                "history.capacity must be at least 1".to_string(),
            ));
        }
        if self.receive.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "receive.timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.sequencer.transmit_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "sequencer.transmit_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if let TransportConfig::SocketCan(cfg) = &self.transport {
            if cfg.interface.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "transport.interface must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

// =============================================================================
// HTTP
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the monitor listens on
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

// =============================================================================
// Transport Configuration
// =============================================================================

/// Transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConfig {
    /// Raw SocketCAN (Linux only)
    SocketCan(SocketCanConfig),
    /// In-memory bus for testing and demos
    Mock(MockConfig),
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::Mock(MockConfig {
            latency_ms: 0,
            simulate_responses: true,
        })
    }
}

/// SocketCAN configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketCanConfig {
    /// CAN interface name (e.g., "can0")
    #[serde(default = "default_interface")]
    pub interface: String,
    /// CAN bus bitrate; the interface itself is brought up outside the bridge
    #[serde(default = "default_bitrate")]
    pub bitrate: u32,
}

fn default_interface() -> String {
    "can0".to_string()
}

fn default_bitrate() -> u32 {
    500000
}

impl Default for SocketCanConfig {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            bitrate: default_bitrate(),
        }
    }
}

/// Mock transport configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MockConfig {
    /// Simulated transmit latency in milliseconds
    #[serde(default)]
    pub latency_ms: u64,
    /// Answer request frames with synthetic 0x762 responses
    #[serde(default)]
    pub simulate_responses: bool,
}

// =============================================================================
// Pipeline
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub policy: FilterPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Number of records kept before the oldest is evicted
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_capacity() -> usize {
    20
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

impl HistoryConfig {
    pub fn capacity(&self) -> Result<NonZeroUsize, ConfigError> {
        NonZeroUsize::new(self.capacity).ok_or_else(|| {
            ConfigError::Invalid("history.capacity must be at least 1".to_string())
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiveConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    1000
}

impl Default for ReceiveConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl ReceiveConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequencerConfig {
    #[serde(default)]
    pub mode: SequencerMode,
    #[serde(default = "default_timeout_ms")]
    pub transmit_timeout_ms: u64,
    /// Pause after each frame; defaults per mode when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_delay_ms: Option<u64>,
    /// Pause between passes in free-running mode
    #[serde(default = "default_cycle_pause_ms")]
    pub cycle_pause_ms: u64,
}

fn default_cycle_pause_ms() -> u64 {
    5000
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            mode: SequencerMode::default(),
            transmit_timeout_ms: default_timeout_ms(),
            frame_delay_ms: None,
            cycle_pause_ms: default_cycle_pause_ms(),
        }
    }
}

impl SequencerConfig {
    pub fn transmit_timeout(&self) -> Duration {
        Duration::from_millis(self.transmit_timeout_ms)
    }

    pub fn frame_delay(&self) -> Duration {
        self.frame_delay_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.mode.default_frame_delay())
    }

    pub fn cycle_pause(&self) -> Duration {
        Duration::from_millis(self.cycle_pause_ms)
    }
}
