use super::{DetectorInstance, RollingWindow, Score};
use crate::errors::ConfigError;
use crate::processing::validate_sample;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Substituted for a zero standard deviation.
pub const STD_DEV_EPSILON: f64 = 1e-6;

/// A z-score needs at least this many values in the baseline.
pub const MIN_BASELINE_LEN: usize = 2;

/// Which values the candidate is scored against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaselineMode {
    /// The candidate is appended first and is part of its own baseline.
    #[default]
    Inclusive,
    /// The candidate is scored against the prior window, then appended.
    Exclusive,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ZScoreDetectorConfig {
    pub id: String,
    pub window_size: usize,
    pub z_score_threshold: f64,
    pub baseline: BaselineMode,
}

impl Default for ZScoreDetectorConfig {
    fn default() -> Self {
        Self {
            id: "zscore".to_string(),
            window_size: 30,
            z_score_threshold: 3.0,
            baseline: BaselineMode::Inclusive,
        }
    }
}

impl ZScoreDetectorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size < MIN_BASELINE_LEN {
            return Err(ConfigError::invalid(
                "window_size",
                format!("must be at least {MIN_BASELINE_LEN}, got {}", self.window_size),
            ));
        }
        if !self.z_score_threshold.is_finite() || self.z_score_threshold <= 0.0 {
            return Err(ConfigError::invalid(
                "z_score_threshold",
                format!("must be a finite number greater than 0, got {}", self.z_score_threshold),
            ));
        }
        Ok(())
    }
}

pub struct ZScoreDetector {
    config: ZScoreDetectorConfig,
    window: RollingWindow,
}

impl ZScoreDetector {
    pub fn new(config: ZScoreDetectorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let window = RollingWindow::new(config.window_size);
        Ok(Self { config, window })
    }

    pub fn window(&self) -> &RollingWindow {
        &self.window
    }

    pub fn threshold(&self) -> f64 {
        self.config.z_score_threshold
    }

    pub fn config(&self) -> &ZScoreDetectorConfig {
        &self.config
    }
}

fn z_score_against(baseline: &RollingWindow, value: f64) -> Option<f64> {
    if baseline.len() < MIN_BASELINE_LEN {
        return None;
    }
    let (mean, std_dev) = baseline.statistics()?;
    let std_dev = if std_dev == 0.0 { STD_DEV_EPSILON } else { std_dev };
    Some((value - mean) / std_dev).filter(|z| z.is_finite())
}

impl DetectorInstance for ZScoreDetector {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn evaluate(&mut self, value: f64) -> Score {
        let value = match validate_sample(value) {
            Ok(value) => value,
            Err(e) => {
                warn!(detector = %self.config.id, stage = "detector", error = %e, "rejecting sample");
                return Score::UNSCORED;
            }
        };

        let z_score = match self.config.baseline {
            BaselineMode::Inclusive => {
                self.window.push(value);
                z_score_against(&self.window, value)
            }
            BaselineMode::Exclusive => {
                let z_score = z_score_against(&self.window, value);
                self.window.push(value);
                z_score
            }
        };

        let Some(z_score) = z_score else {
            return Score::UNSCORED;
        };

        let is_anomaly = z_score.abs() > self.config.z_score_threshold;
        if is_anomaly {
            debug!(detector = %self.config.id, value, z_score, "anomaly detected");
        }

        Score {
            z_score: Some(z_score),
            is_anomaly,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector(window_size: usize, threshold: f64) -> ZScoreDetector {
        ZScoreDetector::new(ZScoreDetectorConfig {
            window_size,
            z_score_threshold: threshold,
            ..ZScoreDetectorConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn single_sample_is_never_anomalous() {
        let mut detector = detector(30, 3.0);
        assert!(!detector.update_and_detect(1_000_000.0));
        assert_eq!(detector.window().len(), 1);
    }

    #[test]
    fn outlier_after_flat_baseline_is_flagged() {
        let mut detector = detector(30, 3.0);
        for _ in 0..29 {
            assert!(!detector.update_and_detect(10.0));
        }
        assert!(detector.update_and_detect(1000.0));
    }

    #[test]
    fn outlier_score_matches_self_inclusive_statistics() {
        let mut detector = detector(30, 3.0);
        for _ in 0..29 {
            detector.evaluate(10.0);
        }
        let score = detector.evaluate(1000.0);
        // mean 43, population std dev sqrt(31581); z = 957 / 177.7...
        let expected = 957.0 / 31_581f64.sqrt();
        assert!((score.z_score.unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn constant_stream_stays_normal() {
        let mut detector = detector(30, 3.0);
        for _ in 0..30 {
            assert!(!detector.update_and_detect(42.0));
        }
        let score = detector.evaluate(42.0);
        assert!(!score.is_anomaly);
        assert_eq!(score.z_score, Some(0.0));
    }

    #[test]
    fn invalid_sample_leaves_window_untouched() {
        let mut detector = detector(5, 3.0);
        detector.update_and_detect(1.0);
        detector.update_and_detect(2.0);

        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert_eq!(detector.evaluate(value), Score::UNSCORED);
        }
        assert_eq!(detector.window().iter().collect::<Vec<_>>(), vec![1.0, 2.0]);
    }

    #[test]
    fn replaying_a_sequence_gives_identical_flags() {
        let values: Vec<f64> = (0..300)
            .map(|i| if i % 37 == 0 { 500.0 } else { (i % 7) as f64 })
            .collect();

        let run = |values: &[f64]| {
            let mut detector = detector(20, 3.0);
            values
                .iter()
                .map(|v| detector.update_and_detect(*v))
                .collect::<Vec<_>>()
        };

        let first = run(&values);
        assert_eq!(first, run(&values));
        assert!(first.iter().any(|flag| *flag));
    }

    #[test]
    fn exclusive_baseline_scores_against_prior_window() {
        let mut detector = ZScoreDetector::new(ZScoreDetectorConfig {
            window_size: 4,
            z_score_threshold: 3.0,
            baseline: BaselineMode::Exclusive,
            ..ZScoreDetectorConfig::default()
        })
        .unwrap();

        // Two prior values are required before anything is scored.
        assert_eq!(detector.evaluate(1.0), Score::UNSCORED);
        assert_eq!(detector.evaluate(3.0), Score::UNSCORED);

        // Baseline [1, 3]: mean 2, std dev 1.
        let score = detector.evaluate(10.0);
        assert_eq!(score.z_score, Some(8.0));
        assert!(score.is_anomaly);
        assert_eq!(detector.window().len(), 3);
    }

    #[test]
    fn small_windows_cap_the_inclusive_score() {
        // With the candidate inside its own baseline, |z| <= sqrt(n - 1).
        let mut detector = detector(5, 3.0);
        for _ in 0..4 {
            detector.update_and_detect(0.0);
        }
        let score = detector.evaluate(1e9);
        assert!((score.z_score.unwrap() - 2.0).abs() < 1e-9);
        assert!(!score.is_anomaly);
    }

    #[test]
    fn config_bounds_are_enforced() {
        let too_small = ZScoreDetectorConfig {
            window_size: 1,
            ..ZScoreDetectorConfig::default()
        };
        assert!(ZScoreDetector::new(too_small).is_err());

        for threshold in [0.0, -1.0, f64::NAN] {
            let config = ZScoreDetectorConfig {
                z_score_threshold: threshold,
                ..ZScoreDetectorConfig::default()
            };
            assert!(config.validate().is_err());
        }
    }
}
