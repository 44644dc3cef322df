//! Non-fatal configuration findings
//!
//! A blueprint can pass validation and still describe a session that will not
//! behave as intended, for example line settings the serial backend refuses at
//! open time. These are reported next to the blueprint instead of failing the
//! load.

use std::fmt;

use contracts::{BroadcastBlueprint, FailureMode, Parity, StopBits};

/// A configuration that loads but is likely to misbehave
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// Top-level section the blueprint does not read
    UnknownSection(String),
    /// Mark or space parity; ports will fail to open
    UnsupportedParity(Parity),
    /// 1.5 stop bits; ports will fail to open
    UnsupportedStopBits,
    /// Detection pattern accepts any non-empty reply
    PatternMatchesAnything(String),
    /// Handler failures are discarded
    FailuresDropped,
    /// Delimiter is a letter or digit and will split ordinary text
    TextDelimiter(u8),
}

impl ConfigWarning {
    /// Dotted path of the setting the warning is about
    pub fn field(&self) -> String {
        match self {
            Self::UnknownSection(name) => name.clone(),
            Self::UnsupportedParity(_) => "serial.parity".to_string(),
            Self::UnsupportedStopBits => "serial.stop_bits".to_string(),
            Self::PatternMatchesAnything(_) => "detection.pattern".to_string(),
            Self::FailuresDropped => "dispatch.failure_mode".to_string(),
            Self::TextDelimiter(_) => "framing.delimiter".to_string(),
        }
    }
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownSection(name) => write!(f, "unknown section [{name}] is ignored"),
            Self::UnsupportedParity(parity) => write!(
                f,
                "serial.parity {parity:?} is not supported by the serial backend; ports will fail to open"
            ),
            Self::UnsupportedStopBits => write!(
                f,
                "serial.stop_bits 1.5 is not supported by the serial backend; ports will fail to open"
            ),
            Self::PatternMatchesAnything(pattern) => write!(
                f,
                "detection.pattern {pattern:?} matches any data; the first port that replies wins"
            ),
            Self::FailuresDropped => {
                write!(f, "dispatch.failure_mode is drop; handler failures are discarded")
            }
            Self::TextDelimiter(byte) => write!(
                f,
                "framing.delimiter is {:?}; messages containing it will be split",
                char::from(*byte)
            ),
        }
    }
}

/// Findings that depend only on the blueprint's values
pub(crate) fn blueprint_warnings(blueprint: &BroadcastBlueprint) -> Vec<ConfigWarning> {
    let mut warnings = Vec::new();

    let serial = &blueprint.serial;
    if matches!(serial.parity, Parity::Mark | Parity::Space) {
        warnings.push(ConfigWarning::UnsupportedParity(serial.parity));
    }
    if serial.stop_bits == StopBits::OnePointFive {
        warnings.push(ConfigWarning::UnsupportedStopBits);
    }

    if blueprint.framing.delimiter.is_ascii_alphanumeric() {
        warnings.push(ConfigWarning::TextDelimiter(blueprint.framing.delimiter));
    }

    if blueprint.dispatch.failure_mode == FailureMode::Drop {
        warnings.push(ConfigWarning::FailuresDropped);
    }

    let pattern = blueprint.detection.pattern.as_str();
    if matches!(pattern, ".+" | ".*" | "^.+" | "^.*") {
        warnings.push(ConfigWarning::PatternMatchesAnything(pattern.to_string()));
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_blueprint_only_flags_open_pattern() {
        let warnings = blueprint_warnings(&BroadcastBlueprint::default());
        assert_eq!(
            warnings,
            vec![ConfigWarning::PatternMatchesAnything(".+".to_string())]
        );
        assert_eq!(warnings[0].field(), "detection.pattern");
    }

    #[test]
    fn test_unsupported_line_settings() {
        let mut blueprint = BroadcastBlueprint::default();
        blueprint.detection.pattern = "^DEV-".to_string();
        blueprint.serial.parity = Parity::Space;
        blueprint.serial.stop_bits = StopBits::OnePointFive;

        let warnings = blueprint_warnings(&blueprint);
        assert_eq!(
            warnings,
            vec![
                ConfigWarning::UnsupportedParity(Parity::Space),
                ConfigWarning::UnsupportedStopBits,
            ]
        );
        assert!(warnings[0].to_string().contains("Space"));
    }

    #[test]
    fn test_text_delimiter_and_dropped_failures() {
        let mut blueprint = BroadcastBlueprint::default();
        blueprint.detection.pattern = "^DEV-".to_string();
        blueprint.framing.delimiter = b'x';
        blueprint.dispatch.failure_mode = FailureMode::Drop;

        let warnings = blueprint_warnings(&blueprint);
        assert_eq!(
            warnings,
            vec![ConfigWarning::TextDelimiter(b'x'), ConfigWarning::FailuresDropped]
        );
        assert!(warnings[0].to_string().contains("'x'"));
    }
}
