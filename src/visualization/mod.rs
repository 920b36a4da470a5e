// src/visualization/mod.rs

pub mod plotter;
pub mod terminal;

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DisplayConfig {
    /// Most recent points kept for plotting.
    pub display_cap: usize,
    /// Most recent anomalous points kept for plotting.
    pub anomaly_cap: usize,
    /// Padding added above and below the plotted value range.
    pub y_margin: f64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            display_cap: 200,
            anomaly_cap: 200,
            y_margin: 10.0,
        }
    }
}

impl DisplayConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.display_cap == 0 {
            return Err(ConfigError::invalid("display_cap", "must be at least 1"));
        }
        if self.anomaly_cap == 0 {
            return Err(ConfigError::invalid("anomaly_cap", "must be at least 1"));
        }
        if !self.y_margin.is_finite() || self.y_margin < 0.0 {
            return Err(ConfigError::invalid(
                "y_margin",
                "must be a finite, non-negative number",
            ));
        }
        Ok(())
    }
}
