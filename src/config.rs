use std::{fs::read_to_string, path::{Path, PathBuf}};

use serde::{Deserialize, Serialize};

use crate::{beliefsystem::ForkStrategy, error::FabricError};

/// Runtime configuration for the fabric. Loaded from a TOML file with
/// environment-variable overrides and passed by value; there is no global
/// configuration state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FabricConfig {
    /// SQLite database location for the `service` persistence adapter.
    pub db_path: PathBuf,
    /// Strategy assigned to newly created root belief systems.
    pub default_strategy: ForkStrategy,
    /// Context-rule expansion bound for the tension probe.
    pub tension_hops: u8,
}

impl Default for FabricConfig {
    fn default() -> FabricConfig {
        FabricConfig {
            db_path: PathBuf::from("fabric.db"),
            default_strategy: ForkStrategy::Coexist,
            tension_hops: 1,
        }
    }
}

impl FabricConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<FabricConfig, FabricError> {
        tracing::debug!("Reading config from {:?}", path.as_ref());
        let content = read_to_string(path.as_ref())?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration: the file (when present), then environment
    /// overrides `FABRICATOR_DB_PATH`, `FABRICATOR_STRATEGY`, and
    /// `FABRICATOR_TENSION_HOPS`.
    pub fn load(path: Option<&Path>) -> Result<FabricConfig, FabricError> {
        let mut config = match path {
            Some(path) if path.exists() => FabricConfig::from_file(path)?,
            Some(path) => {
                return Err(FabricError::NotFound(format!(
                    "config file {} does not exist",
                    path.display()
                )))
            }
            None => FabricConfig::default(),
        };
        if let Ok(db_path) = std::env::var("FABRICATOR_DB_PATH") {
            config.db_path = PathBuf::from(db_path);
        }
        if let Ok(strategy) = std::env::var("FABRICATOR_STRATEGY") {
            config.default_strategy = strategy.parse()?;
        }
        if let Ok(hops) = std::env::var("FABRICATOR_TENSION_HOPS") {
            config.tension_hops = hops.parse().map_err(|e| {
                FabricError::Config(format!("FABRICATOR_TENSION_HOPS must be an integer: {e}"))
            })?;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = FabricConfig::default();
        assert_eq!(config.default_strategy, ForkStrategy::Coexist);
        assert_eq!(config.tension_hops, 1);
    }

    #[test]
    fn toml_round_trip() {
        let config = FabricConfig {
            db_path: PathBuf::from("/tmp/fabric.db"),
            default_strategy: ForkStrategy::Preserve,
            tension_hops: 2,
        };
        let text = toml::to_string(&config).unwrap();
        let parsed: FabricConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn partial_files_fall_back_to_defaults() {
        let parsed: FabricConfig = toml::from_str("tension_hops = 3\n").unwrap();
        assert_eq!(parsed.tension_hops, 3);
        assert_eq!(parsed.default_strategy, ForkStrategy::Coexist);
    }
}
