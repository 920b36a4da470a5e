// src/config/mod.rs
use crate::errors::ConfigError;
use crate::processing::coordinator::StreamConfig;
use crate::processing::detectors::z_score::ZScoreDetectorConfig;
use crate::processing::generator::GeneratorConfig;
use crate::utils::log::LoggingConfig;
use crate::visualization::DisplayConfig;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level configuration. Every section falls back to its defaults, so a
/// YAML file only needs the keys it changes.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub generator: GeneratorConfig,
    pub detector: ZScoreDetectorConfig,
    pub stream: StreamConfig,
    pub display: DisplayConfig,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.generator.validate()?;
        self.detector.validate()?;
        self.stream.validate()?;
        self.display.validate()?;
        Ok(())
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let config_str = fs::read_to_string(path)?;
    let config: Config = serde_yaml::from_str(&config_str)?;
    config.validate()?;
    Ok(config)
}

pub fn save_config<P: AsRef<Path>>(config: &Config, path: P) -> Result<(), ConfigError> {
    let yaml = serde_yaml::to_string(config)?;
    fs::write(path, yaml)?;
    Ok(())
}
