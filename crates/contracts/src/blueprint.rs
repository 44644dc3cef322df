//! BroadcastBlueprint - Config Loader output
//!
//! Describes the complete session configuration: serial line settings, framing,
//! dispatch concurrency and device auto-detection.

use serde::{Deserialize, Serialize};

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete session configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BroadcastBlueprint {
    /// Config version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Serial line settings applied to every opened port
    #[serde(default)]
    pub serial: SerialConfig,

    /// Message framing
    #[serde(default)]
    pub framing: FramingConfig,

    /// Handler dispatch
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Device auto-detection
    #[serde(default)]
    pub detection: DetectionConfig,
}

/// Serial line settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Bit rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Character size, one of 5, 6, 7, 8
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,

    #[serde(default)]
    pub parity: Parity,

    #[serde(default)]
    pub stop_bits: StopBits,

    /// Initial DTR/RTS state (None = DTR and RTS asserted)
    #[serde(default)]
    pub initial_modem_bits: Option<ModemBits>,

    /// Backend read poll interval in milliseconds
    #[serde(default = "default_read_poll_ms")]
    pub read_poll_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            parity: Parity::default(),
            stop_bits: StopBits::default(),
            initial_modem_bits: None,
            read_poll_ms: default_read_poll_ms(),
        }
    }
}

impl SerialConfig {
    /// Effective modem output bits
    pub fn modem_bits(&self) -> ModemBits {
        self.initial_modem_bits.unwrap_or_default()
    }
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_data_bits() -> u8 {
    8
}

fn default_read_poll_ms() -> u64 {
    100
}

/// Parity mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
    Mark,
    Space,
}

/// Stop bits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopBits {
    #[default]
    #[serde(rename = "1")]
    One,
    #[serde(rename = "1.5")]
    OnePointFive,
    #[serde(rename = "2")]
    Two,
}

/// Modem output line state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModemBits {
    /// Data Terminal Ready
    pub dtr: bool,
    /// Request To Send
    pub rts: bool,
}

impl Default for ModemBits {
    fn default() -> Self {
        Self {
            dtr: true,
            rts: true,
        }
    }
}

/// Framing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FramingConfig {
    /// Message boundary byte
    #[serde(default = "default_delimiter")]
    pub delimiter: u8,

    /// Size of each transport read
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,

    /// Capacity of the frame queue between reader and dispatcher
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// End-of-stream handling of an undelimited remainder
    #[serde(default)]
    pub trailing: TrailingPolicy,
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            read_buffer_size: default_read_buffer_size(),
            channel_capacity: default_channel_capacity(),
            trailing: TrailingPolicy::default(),
        }
    }
}

fn default_delimiter() -> u8 {
    b'\n'
}

fn default_read_buffer_size() -> usize {
    1024
}

fn default_channel_capacity() -> usize {
    100
}

/// What happens to undelimited bytes when the stream ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrailingPolicy {
    /// Keep the remainder in the buffer, never emit it
    #[default]
    Retain,
    /// Emit the remainder as a final frame marked `unterminated`
    Flush,
}

/// Dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Maximum concurrently running handlers
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    /// Handler failure delivery
    #[serde(default)]
    pub failure_mode: FailureMode,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
            failure_mode: FailureMode::default(),
        }
    }
}

fn default_parallelism() -> usize {
    4
}

/// Upper bound on `dispatch.parallelism`
pub const MAX_PARALLELISM: usize = 4096;

/// Delivery of handler failures and unroutable messages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Discard silently
    Drop,
    /// Log via tracing
    #[default]
    Log,
    /// Forward to an error-reporting channel
    Forward,
}

/// Auto-detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Regular expression matched against incoming chunks
    #[serde(default = "default_pattern")]
    pub pattern: String,

    /// Device key, bookkeeping only
    #[serde(default)]
    pub device_key: String,

    /// Per-candidate read deadline in milliseconds
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Delay between failed rounds in milliseconds
    #[serde(default = "default_probe_backoff_ms")]
    pub probe_backoff_ms: u64,

    /// Maximum rounds (0 = until cancelled)
    #[serde(default)]
    pub max_rounds: u32,

    /// Explicit candidate list; empty = enumerate ports every round
    #[serde(default)]
    pub candidates: Vec<String>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            pattern: default_pattern(),
            device_key: String::new(),
            probe_timeout_ms: default_probe_timeout_ms(),
            probe_backoff_ms: default_probe_backoff_ms(),
            max_rounds: 0,
            candidates: Vec::new(),
        }
    }
}

fn default_pattern() -> String {
    ".+".to_string()
}

fn default_probe_timeout_ms() -> u64 {
    2000
}

fn default_probe_backoff_ms() -> u64 {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let bp = BroadcastBlueprint::default();
        assert_eq!(bp.serial.baud_rate, 9600);
        assert_eq!(bp.serial.data_bits, 8);
        assert_eq!(bp.framing.delimiter, b'\n');
        assert_eq!(bp.framing.trailing, TrailingPolicy::Retain);
        assert_eq!(bp.dispatch.parallelism, 4);
        assert_eq!(bp.dispatch.failure_mode, FailureMode::Log);
        assert_eq!(bp.serial.modem_bits(), ModemBits { dtr: true, rts: true });
    }

    #[test]
    fn test_stop_bits_serde_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            stop_bits: StopBits,
        }
        let w: Wrapper = toml::from_str(r#"stop_bits = "1.5""#).unwrap();
        assert_eq!(w.stop_bits, StopBits::OnePointFive);

        let json = serde_json::to_string(&StopBits::Two).unwrap();
        assert_eq!(json, "\"2\"");
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let bp: BroadcastBlueprint = serde_json::from_str("{}").unwrap();
        assert_eq!(bp.detection.probe_timeout_ms, 2000);
        assert_eq!(bp.detection.probe_backoff_ms, 1000);
        assert!(bp.detection.candidates.is_empty());
    }
}
