//! # Config Loader
//!
//! Reads a `BroadcastBlueprint` from TOML or JSON.
//!
//! The document is split into its top-level sections (`[serial]`, `[framing]`,
//! `[dispatch]`, `[detection]`) and each is read on its own, so a bad value is
//! reported against the section it sits in. Missing sections take their
//! defaults. A blueprint that validates can still carry [`ConfigWarning`]s
//! (unknown sections, line settings the serial backend refuses, ...), which
//! come back alongside it from [`ConfigLoader::inspect_path`].
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let loaded = ConfigLoader::inspect_path(Path::new("broadcast.toml")).unwrap();
//! for warning in &loaded.warnings {
//!     eprintln!("warning: {warning}");
//! }
//! println!("Baud rate: {}", loaded.blueprint.serial.baud_rate);
//! ```

mod validator;
mod warnings;

pub use contracts::BroadcastBlueprint;
pub use validator::validate;
pub use warnings::ConfigWarning;

use std::path::Path;

use contracts::ContractError;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Format named by a file extension, case-insensitive
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    fn of_path(path: &Path) -> Result<Self, ContractError> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
            .ok_or_else(|| {
                ContractError::config_parse(format!(
                    "unsupported config format: {} (expected .toml or .json)",
                    path.display()
                ))
            })
    }
}

/// A validated blueprint and the findings that did not stop it loading
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub blueprint: BroadcastBlueprint,
    pub warnings: Vec<ConfigWarning>,
}

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate a configuration file, discarding warnings
    ///
    /// # Errors
    /// - `ConfigParse` for an unknown extension, unreadable file or bad section
    /// - `ConfigValidation` for the first out-of-range value
    pub fn load_from_path(path: &Path) -> Result<BroadcastBlueprint, ContractError> {
        Ok(Self::inspect_path(path)?.blueprint)
    }

    /// Load and validate a configuration file, keeping warnings
    pub fn inspect_path(path: &Path) -> Result<LoadedConfig, ContractError> {
        let format = ConfigFormat::of_path(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::inspect_str(&content, format)
    }

    /// Load and validate configuration text, discarding warnings
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<BroadcastBlueprint, ContractError> {
        Ok(Self::inspect_str(content, format)?.blueprint)
    }

    /// Load and validate configuration text, keeping warnings
    pub fn inspect_str(content: &str, format: ConfigFormat) -> Result<LoadedConfig, ContractError> {
        let mut document = document(content, format)?;

        let blueprint = BroadcastBlueprint {
            version: section(&mut document, "version")?,
            serial: section(&mut document, "serial")?,
            framing: section(&mut document, "framing")?,
            dispatch: section(&mut document, "dispatch")?,
            detection: section(&mut document, "detection")?,
        };
        validate(&blueprint)?;

        let mut warnings: Vec<ConfigWarning> = document
            .into_iter()
            .map(|(name, _)| ConfigWarning::UnknownSection(name))
            .collect();
        warnings.extend(warnings::blueprint_warnings(&blueprint));

        Ok(LoadedConfig {
            blueprint,
            warnings,
        })
    }

    /// Serialize a blueprint as TOML
    pub fn to_toml(blueprint: &BroadcastBlueprint) -> Result<String, ContractError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize a blueprint as pretty JSON
    pub fn to_json(blueprint: &BroadcastBlueprint) -> Result<String, ContractError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

/// Parse the whole document into its top-level key/value map
fn document(content: &str, format: ConfigFormat) -> Result<Map<String, Value>, ContractError> {
    let root = match format {
        ConfigFormat::Toml => {
            let table: toml::Table = toml::from_str(content).map_err(|e| parse_error("TOML", e))?;
            serde_json::to_value(table).map_err(|e| parse_error("TOML", e))?
        }
        ConfigFormat::Json => serde_json::from_str(content).map_err(|e| parse_error("JSON", e))?,
    };

    match root {
        Value::Object(map) => Ok(map),
        other => Err(ContractError::config_parse(format!(
            "configuration root must be a table of sections, found {}",
            json_kind(&other)
        ))),
    }
}

/// Take one section out of the document; absent sections use their default
fn section<T: DeserializeOwned + Default>(
    document: &mut Map<String, Value>,
    name: &str,
) -> Result<T, ContractError> {
    match document.remove(name) {
        None => Ok(T::default()),
        Some(value) => serde_json::from_value(value).map_err(|e| ContractError::ConfigParse {
            message: format!("invalid [{name}] section: {e}"),
            source: Some(Box::new(e)),
        }),
    }
}

fn parse_error(
    format: &str,
    e: impl std::error::Error + Send + Sync + 'static,
) -> ContractError {
    ContractError::ConfigParse {
        message: format!("{format} parse error: {e}"),
        source: Some(Box::new(e)),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "a table",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{FailureMode, Parity, StopBits, TrailingPolicy};
    use std::io::Write;

    const MINIMAL_TOML: &str = r#"
[serial]
baud_rate = 115200
parity = "even"
stop_bits = "2"
initial_modem_bits = { dtr = true, rts = false }

[framing]
delimiter = 13
trailing = "flush"

[dispatch]
parallelism = 8
failure_mode = "forward"

[detection]
pattern = "^DEV-"
device_key = "sn-001"
probe_timeout_ms = 500
probe_backoff_ms = 250
candidates = ["/dev/ttyUSB0", "/dev/ttyUSB1"]
"#;

    fn parse_message(err: ContractError) -> String {
        match err {
            ContractError::ConfigParse { message, .. } => message,
            other => panic!("expected ConfigParse, got {other:?}"),
        }
    }

    #[test]
    fn test_load_from_str_toml() {
        let loaded = ConfigLoader::inspect_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let bp = loaded.blueprint;
        assert_eq!(bp.serial.baud_rate, 115200);
        assert_eq!(bp.serial.parity, Parity::Even);
        assert_eq!(bp.framing.delimiter, b'\r');
        assert_eq!(bp.framing.trailing, TrailingPolicy::Flush);
        assert_eq!(bp.dispatch.parallelism, 8);
        assert_eq!(bp.detection.candidates.len(), 2);
        assert!(loaded.warnings.is_empty());
    }

    #[test]
    fn test_load_from_str_json() {
        let content = r#"{
            "serial": { "data_bits": 7, "parity": "odd", "stop_bits": "1" },
            "dispatch": { "failure_mode": "log" },
            "detection": { "pattern": "^OK" }
        }"#;
        let bp = ConfigLoader::load_from_str(content, ConfigFormat::Json).unwrap();
        assert_eq!(bp.serial.data_bits, 7);
        assert_eq!(bp.serial.parity, Parity::Odd);
        assert_eq!(bp.dispatch.failure_mode, FailureMode::Log);
        assert_eq!(bp.framing.delimiter, b'\n');
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let bp = ConfigLoader::load_from_str("", ConfigFormat::Toml).unwrap();
        assert_eq!(bp.serial.baud_rate, 9600);
        assert_eq!(bp.dispatch.parallelism, 4);
    }

    #[test]
    fn test_bad_value_names_its_section() {
        let content = "[serial]\nparity = \"sideways\"\n";
        let message = parse_message(
            ConfigLoader::load_from_str(content, ConfigFormat::Toml).unwrap_err(),
        );
        assert!(message.starts_with("invalid [serial] section"), "{message}");
        assert!(message.contains("sideways"), "{message}");

        let content = r#"{ "detection": { "probe_timeout_ms": "soon" } }"#;
        let message = parse_message(
            ConfigLoader::load_from_str(content, ConfigFormat::Json).unwrap_err(),
        );
        assert!(message.starts_with("invalid [detection] section"), "{message}");
    }

    #[test]
    fn test_syntax_error_is_parse_error() {
        let message = parse_message(
            ConfigLoader::load_from_str("[serial\nbaud_rate = 1", ConfigFormat::Toml).unwrap_err(),
        );
        assert!(message.starts_with("TOML parse error"), "{message}");
    }

    #[test]
    fn test_json_root_must_be_object() {
        let message = parse_message(
            ConfigLoader::load_from_str("[1, 2]", ConfigFormat::Json).unwrap_err(),
        );
        assert!(message.contains("found an array"), "{message}");
    }

    #[test]
    fn test_unknown_section_and_line_settings_warn() {
        let content = r#"
[seriall]
baud_rate = 19200

[serial]
parity = "mark"
stop_bits = "1.5"

[detection]
pattern = "^DEV-"
"#;
        let loaded = ConfigLoader::inspect_str(content, ConfigFormat::Toml).unwrap();
        assert_eq!(loaded.blueprint.serial.stop_bits, StopBits::OnePointFive);
        assert_eq!(
            loaded.warnings,
            vec![
                ConfigWarning::UnknownSection("seriall".to_string()),
                ConfigWarning::UnsupportedParity(Parity::Mark),
                ConfigWarning::UnsupportedStopBits,
            ]
        );
    }

    #[test]
    fn test_round_trip_toml() {
        let bp = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&bp).unwrap();
        let bp2 = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(bp.serial.parity, bp2.serial.parity);
        assert_eq!(bp.serial.stop_bits, bp2.serial.stop_bits);
        assert_eq!(bp.detection.pattern, bp2.detection.pattern);
    }

    #[test]
    fn test_round_trip_json() {
        let bp = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&bp).unwrap();
        let bp2 = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(bp.framing.trailing, bp2.framing.trailing);
        assert_eq!(bp.serial.initial_modem_bits, bp2.serial.initial_modem_bits);
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let content = "[dispatch]\nparallelism = 0\n";
        let err = ConfigLoader::load_from_str(content, ConfigFormat::Toml).unwrap_err();
        assert!(matches!(err, ContractError::ConfigValidation { .. }));
        assert!(err.to_string().contains("parallelism"));
    }

    #[test]
    fn test_inspect_path_detects_format() {
        let mut file = tempfile::Builder::new().suffix(".TOML").tempfile().unwrap();
        file.write_all(MINIMAL_TOML.as_bytes()).unwrap();

        let loaded = ConfigLoader::inspect_path(file.path()).unwrap();
        assert_eq!(loaded.blueprint.detection.device_key, "sn-001");
        assert_eq!(
            ConfigLoader::load_from_path(file.path()).unwrap().serial.baud_rate,
            115200
        );
    }

    #[test]
    fn test_load_from_path_rejects_unknown_extension() {
        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        let err = ConfigLoader::load_from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }
}
