//! MaskVerifier - regular expression match on incoming chunks

use contracts::{DetectionConfig, Verifier};
use regex::bytes::Regex;

use crate::error::{DetectorError, Result};

/// Matches a chunk against a pattern; carries the device key for bookkeeping
#[derive(Debug, Clone)]
pub struct MaskVerifier {
    key: Vec<u8>,
    pattern: Regex,
}

impl MaskVerifier {
    /// Compile `pattern`
    ///
    /// # Errors
    /// `InvalidPattern` if the pattern does not compile
    pub fn new(key: impl Into<Vec<u8>>, pattern: &str) -> Result<Self> {
        let pattern =
            Regex::new(pattern).map_err(|e| DetectorError::invalid_pattern(pattern, e.to_string()))?;
        Ok(Self {
            key: key.into(),
            pattern,
        })
    }

    /// Build from detection settings
    pub fn from_config(config: &DetectionConfig) -> Result<Self> {
        Self::new(config.device_key.as_bytes(), &config.pattern)
    }

    /// Source pattern
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }
}

impl Verifier for MaskVerifier {
    fn check(&self, chunk: &[u8]) -> bool {
        self.pattern.is_match(chunk)
    }

    fn key(&self) -> &[u8] {
        &self.key
    }
}
