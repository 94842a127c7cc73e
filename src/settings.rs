//! Layered runtime settings: built-in defaults, an optional config file
//! (YAML, TOML or JSON by extension), then `MEDCHAIN__*` environment
//! variables, e.g. `MEDCHAIN__CONSENSUS__DIFFICULTY=3`.

use config::{Config, ConfigError, Environment, File};
use medchain_consensus::ConsensusConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub consensus: ConsensusConfig,
    pub miners: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            consensus: ConsensusConfig::default(),
            miners: 4,
        }
    }
}

impl Settings {
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Settings::default())?);
        if let Some(path) = file {
            builder = builder.add_source(File::from(path));
        }
        let settings: Settings = builder
            .add_source(
                Environment::with_prefix("MEDCHAIN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings
            .consensus
            .validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;
        if settings.miners == 0 {
            return Err(ConfigError::Message("at least one miner is required".to_string()));
        }
        Ok(settings)
    }
}
