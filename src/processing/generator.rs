use super::validate_sample;
use crate::errors::{ConfigError, StreamResult};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::time::Duration;
use tracing::{error, warn};

// -----------------------------------------------------------------------------
// SIGNAL SOURCE
// -----------------------------------------------------------------------------

/// Pull-based lazy sequence of raw samples.
///
/// `None` ends the stream. `Some(Err(_))` is a rejected sample: the caller logs
/// it and asks again.
pub trait SignalSource: Send {
    fn next_sample(&mut self) -> Option<StreamResult<f64>>;
}

/// Consecutive rejected samples after which the [`Iterator`] impl of
/// [`SignalGenerator`] gives up.
pub const MAX_CONSECUTIVE_REJECTS: u32 = 1_000;

// CONFIG COMPONENT ------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct GeneratorConfig {
    pub base_level: f64,
    pub seasonal_amplitude: f64,
    pub seasonal_period: f64,
    pub base_noise_stddev: f64,
    pub anomaly_probability: f64,
    pub anomaly_impulse_mean: f64,
    pub anomaly_impulse_stddev: f64,
    pub pacing_delay_ms: u64,
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_level: 50.0,
            seasonal_amplitude: 10.0,
            seasonal_period: 50.0,
            base_noise_stddev: 2.0,
            anomaly_probability: 0.05,
            anomaly_impulse_mean: 30.0,
            anomaly_impulse_stddev: 10.0,
            pacing_delay_ms: 100,
            seed: None,
        }
    }
}

impl GeneratorConfig {
    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("base_level", self.base_level),
            ("seasonal_amplitude", self.seasonal_amplitude),
            ("anomaly_impulse_mean", self.anomaly_impulse_mean),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::invalid(field, "must be a finite number"));
            }
        }

        for (field, value) in [
            ("base_noise_stddev", self.base_noise_stddev),
            ("anomaly_impulse_stddev", self.anomaly_impulse_stddev),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::invalid(
                    field,
                    "must be a finite, non-negative number",
                ));
            }
        }

        if !self.seasonal_period.is_finite() || self.seasonal_period <= 0.0 {
            return Err(ConfigError::invalid(
                "seasonal_period",
                "must be a finite number greater than 0",
            ));
        }

        let peak = self.base_level.abs()
            + self.seasonal_amplitude.abs()
            + self.anomaly_impulse_mean.abs();
        if !peak.is_finite() {
            return Err(ConfigError::invalid(
                "base_level",
                "base level, seasonal amplitude and impulse mean overflow when combined",
            ));
        }

        if !(0.0..=1.0).contains(&self.anomaly_probability) {
            return Err(ConfigError::invalid(
                "anomaly_probability",
                "must be within [0, 1]",
            ));
        }

        Ok(())
    }
}

// -----------------------------------------------------------------------------
// SIGNAL GENERATOR
// -----------------------------------------------------------------------------

/// Synthetic signal: `base + amplitude * sin(2πt / period) + noise`, with an
/// occasional Gaussian impulse on top.
///
/// The time step only advances when a sample is emitted, so a rejected sample
/// is retried at the same step.
pub struct SignalGenerator {
    config: GeneratorConfig,
    rng: StdRng,
    noise: Normal<f64>,
    impulse: Normal<f64>,
    t: u64,
}

impl SignalGenerator {
    pub fn from_config(config: &GeneratorConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let noise = Normal::new(0.0, config.base_noise_stddev)
            .map_err(|e| ConfigError::invalid("base_noise_stddev", e.to_string()))?;
        let impulse = Normal::new(config.anomaly_impulse_mean, config.anomaly_impulse_stddev)
            .map_err(|e| ConfigError::invalid("anomaly_impulse_stddev", e.to_string()))?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            config: config.clone(),
            rng,
            noise,
            impulse,
            t: 0,
        })
    }

    /// Time step of the next sample to be emitted.
    pub fn step(&self) -> u64 {
        self.t
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    fn seasonal(&self) -> f64 {
        self.config.seasonal_amplitude
            * (2.0 * PI * self.t as f64 / self.config.seasonal_period).sin()
    }

    /// Produces the sample for the current step, advancing the step only on
    /// success.
    pub fn try_next(&mut self) -> StreamResult<f64> {
        let mut value = self.config.base_level + self.seasonal() + self.noise.sample(&mut self.rng);

        if self.rng.gen::<f64>() < self.config.anomaly_probability {
            value += self.impulse.sample(&mut self.rng);
        }

        let value = validate_sample(value)?;
        self.t += 1;
        Ok(value)
    }
}

impl SignalSource for SignalGenerator {
    fn next_sample(&mut self) -> Option<StreamResult<f64>> {
        Some(self.try_next())
    }
}

impl Iterator for SignalGenerator {
    type Item = f64;

    /// Skips rejected samples. Ends the sequence if
    /// [`MAX_CONSECUTIVE_REJECTS`] samples in a row are rejected.
    fn next(&mut self) -> Option<f64> {
        for _ in 0..MAX_CONSECUTIVE_REJECTS {
            match self.try_next() {
                Ok(value) => return Some(value),
                Err(e) => warn!(stage = "generator", step = self.t, error = %e, "discarding sample"),
            }
        }
        error!(
            step = self.t,
            rejected = MAX_CONSECUTIVE_REJECTS,
            "generator keeps producing invalid samples, ending sequence"
        );
        None
    }
}

// -----------------------------------------------------------------------------
// REPLAY SOURCE
// -----------------------------------------------------------------------------

/// Finite source over a fixed list of values. Non-finite entries are
/// reported as rejected samples, the same way the generator reports them.
pub struct ReplaySource {
    values: std::vec::IntoIter<f64>,
}

impl ReplaySource {
    pub fn new(values: impl IntoIterator<Item = f64>) -> Self {
        let values: Vec<f64> = values.into_iter().collect();
        Self {
            values: values.into_iter(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

impl SignalSource for ReplaySource {
    fn next_sample(&mut self) -> Option<StreamResult<f64>> {
        self.values.next().map(validate_sample)
    }
}
