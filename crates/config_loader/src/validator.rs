//! Configuration validation
//!
//! Rules:
//! - baud_rate > 0, data_bits in 5..=8
//! - read_buffer_size, channel_capacity, parallelism >= 1
//! - parallelism <= MAX_PARALLELISM
//! - probe_timeout_ms > 0
//! - detection pattern non-empty and compiles
//! - explicit candidates non-empty and unique

use std::collections::HashSet;

use contracts::{BroadcastBlueprint, ContractError, MAX_PARALLELISM};
use regex::bytes::Regex;

/// Validate a BroadcastBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &BroadcastBlueprint) -> Result<(), ContractError> {
    validate_serial(blueprint)?;
    validate_framing(blueprint)?;
    validate_dispatch(blueprint)?;
    validate_detection(blueprint)?;
    validate_candidates(blueprint)?;
    Ok(())
}

fn validate_serial(blueprint: &BroadcastBlueprint) -> Result<(), ContractError> {
    let serial = &blueprint.serial;
    if serial.baud_rate == 0 {
        return Err(ContractError::config_validation(
            "serial.baud_rate",
            "baud_rate must be > 0",
        ));
    }
    if !(5..=8).contains(&serial.data_bits) {
        return Err(ContractError::config_validation(
            "serial.data_bits",
            format!("data_bits must be 5, 6, 7 or 8, got {}", serial.data_bits),
        ));
    }
    if serial.read_poll_ms == 0 {
        return Err(ContractError::config_validation(
            "serial.read_poll_ms",
            "read_poll_ms must be > 0",
        ));
    }
    Ok(())
}

fn validate_framing(blueprint: &BroadcastBlueprint) -> Result<(), ContractError> {
    let framing = &blueprint.framing;
    if framing.read_buffer_size == 0 {
        return Err(ContractError::config_validation(
            "framing.read_buffer_size",
            "read_buffer_size must be >= 1",
        ));
    }
    if framing.channel_capacity == 0 {
        return Err(ContractError::config_validation(
            "framing.channel_capacity",
            "channel_capacity must be >= 1",
        ));
    }
    Ok(())
}

fn validate_dispatch(blueprint: &BroadcastBlueprint) -> Result<(), ContractError> {
    let parallelism = blueprint.dispatch.parallelism;
    if parallelism == 0 {
        return Err(ContractError::config_validation(
            "dispatch.parallelism",
            "parallelism must be >= 1",
        ));
    }
    if parallelism > MAX_PARALLELISM {
        return Err(ContractError::config_validation(
            "dispatch.parallelism",
            format!("parallelism must be <= {MAX_PARALLELISM}, got {parallelism}"),
        ));
    }
    Ok(())
}

fn validate_detection(blueprint: &BroadcastBlueprint) -> Result<(), ContractError> {
    let detection = &blueprint.detection;
    if detection.probe_timeout_ms == 0 {
        return Err(ContractError::config_validation(
            "detection.probe_timeout_ms",
            "probe_timeout_ms must be > 0",
        ));
    }
    if detection.pattern.is_empty() {
        return Err(ContractError::config_validation(
            "detection.pattern",
            "pattern cannot be empty",
        ));
    }
    if let Err(e) = Regex::new(&detection.pattern) {
        return Err(ContractError::config_validation(
            "detection.pattern",
            format!("invalid pattern: {e}"),
        ));
    }
    Ok(())
}

/// Explicit candidate names must be unique
fn validate_candidates(blueprint: &BroadcastBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, candidate) in blueprint.detection.candidates.iter().enumerate() {
        if candidate.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("detection.candidates[{idx}]"),
                "candidate name cannot be empty",
            ));
        }
        if !seen.insert(candidate) {
            return Err(ContractError::config_validation(
                format!("detection.candidates[{idx}]"),
                format!("duplicate candidate '{candidate}'"),
            ));
        }
    }
    Ok(())
}
