//! Loading and validating planner configuration

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{PlanningError, Result};

/// Parse a configuration from a JSON string
pub fn from_json_str<T: DeserializeOwned>(json: &str) -> Result<T> {
    Ok(serde_json::from_str(json)?)
}

/// Load a configuration from a JSON file
pub fn load_config<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)?;
    tracing::debug!("Loaded configuration from {}", path.display());
    from_json_str(&contents)
}

/// Write a configuration to a JSON file
pub fn save_config<T: Serialize>(config: &T, path: impl AsRef<Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Check that a discount factor lies in `[0, 1]`
pub fn check_discount(gamma: f64) -> Result<()> {
    if (0.0..=1.0).contains(&gamma) {
        Ok(())
    } else {
        Err(PlanningError::Configuration(format!(
            "discount factor must be in [0, 1], got {gamma}"
        )))
    }
}

/// Check that a tolerance or threshold is finite and non-negative
pub fn check_non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(PlanningError::Configuration(format!(
            "{name} must be a non-negative number, got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        gamma: f64,
        rollouts: usize,
    }

    #[test]
    fn test_from_json_str() {
        let parsed: Sample = from_json_str(r#"{"gamma": 0.9, "rollouts": 20}"#).unwrap();
        assert_eq!(parsed, Sample { gamma: 0.9, rollouts: 20 });
        assert!(from_json_str::<Sample>("{").is_err());
    }

    #[test]
    fn test_save_and_load_config() {
        let path = std::env::temp_dir().join(format!("dynaplan-config-{}.json", std::process::id()));
        let config = Sample { gamma: 0.5, rollouts: 3 };
        save_config(&config, &path).unwrap();
        let loaded: Sample = load_config(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_check_discount() {
        assert!(check_discount(0.0).is_ok());
        assert!(check_discount(1.0).is_ok());
        assert!(check_discount(1.5).is_err());
        assert!(check_discount(f64::NAN).is_err());
        assert!(check_non_negative("max_delta", -0.1).is_err());
    }
}
