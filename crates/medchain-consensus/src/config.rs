use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Leading hex zeros a proof hash must carry unless configured otherwise.
pub const DEFAULT_DIFFICULTY: usize = 2;

/// Upper bound on nonces tried per worker and round (prevents infinite loops).
pub const DEFAULT_MAX_ATTEMPTS: u64 = 1_000_000;

pub const DEFAULT_STALL_TIMEOUT_MS: u64 = 30_000;

/// Decimal places kept when crediting fees.
pub const DEFAULT_FEE_PRECISION: u32 = 2;

/// Largest difficulty accepted: every hex digit of a SHA-256 digest.
const MAX_DIFFICULTY: usize = 64;

const MAX_FEE_PRECISION: u32 = 12;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse consensus config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid consensus config: {0}")]
    Invalid(String),
}

/// Fixed for the lifetime of an engine; difficulty is never re-targeted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    pub difficulty: usize,
    pub max_attempts: u64,
    pub stall_timeout_ms: u64,
    pub fee_precision: u32,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            stall_timeout_ms: DEFAULT_STALL_TIMEOUT_MS,
            fee_precision: DEFAULT_FEE_PRECISION,
        }
    }
}

impl ConsensusConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.difficulty > MAX_DIFFICULTY {
            return Err(ConfigError::Invalid(format!(
                "difficulty {} exceeds {} hex digits",
                self.difficulty, MAX_DIFFICULTY
            )));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts must be positive".to_string()));
        }
        if self.stall_timeout_ms == 0 {
            return Err(ConfigError::Invalid("stall_timeout_ms must be positive".to_string()));
        }
        if self.fee_precision > MAX_FEE_PRECISION {
            return Err(ConfigError::Invalid(format!(
                "fee_precision {} exceeds {}",
                self.fee_precision, MAX_FEE_PRECISION
            )));
        }
        Ok(())
    }

    /// Parse and validate a YAML document; missing keys take their defaults.
    pub fn from_yaml(source: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ConsensusConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.difficulty, 2);
        assert_eq!(config.fee_precision, 2);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = ConsensusConfig::from_yaml("difficulty: 3\n").unwrap();
        assert_eq!(config.difficulty, 3);
        assert_eq!(config.max_attempts, DEFAULT_MAX_ATTEMPTS);
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        assert!(matches!(
            ConsensusConfig::from_yaml("difficulty: 65\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ConsensusConfig::from_yaml("max_attempts: 0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ConsensusConfig::from_yaml("difficulty: [1]\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = ConsensusConfig {
            difficulty: 1,
            ..ConsensusConfig::default()
        };
        let yaml = config.to_yaml().unwrap();
        assert_eq!(ConsensusConfig::from_yaml(&yaml).unwrap(), config);
    }
}
