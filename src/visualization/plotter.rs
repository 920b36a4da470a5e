// src/visualization/plotter.rs

use super::DisplayConfig;
use crate::processing::coordinator::DetectionResult;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Bounded plot buffers fed from `drain_batch` output. Only the consumer
/// writes to them; a renderer reads them through [`SharedDisplay`].
pub struct DisplayBuffers {
    config: DisplayConfig,
    points: VecDeque<(u64, f64)>,    // (index, value)
    anomalies: VecDeque<(u64, f64)>, // (index, value)
    last_index: u64,
}

impl DisplayBuffers {
    pub fn new(config: DisplayConfig) -> Self {
        Self {
            points: VecDeque::with_capacity(config.display_cap),
            anomalies: VecDeque::with_capacity(config.anomaly_cap.min(config.display_cap)),
            config,
            last_index: 0,
        }
    }

    pub fn add_result(&mut self, result: &DetectionResult) {
        let point = (result.index(), result.value());
        self.last_index = result.index();

        self.points.push_back(point);
        if self.points.len() > self.config.display_cap {
            self.points.pop_front();
        }

        if result.is_anomaly {
            self.anomalies.push_back(point);
            if self.anomalies.len() > self.config.anomaly_cap {
                self.anomalies.pop_front();
            }
        }
    }

    pub fn add_results(&mut self, results: &[DetectionResult]) {
        for result in results {
            self.add_result(result);
        }
    }

    pub fn points(&self) -> Vec<(u64, f64)> {
        self.points.iter().copied().collect()
    }

    pub fn anomalies(&self) -> Vec<(u64, f64)> {
        self.anomalies.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn anomaly_count(&self) -> usize {
        self.anomalies.len()
    }

    /// `[last_index - display_cap, last_index]`, floored at 0.
    pub fn x_range(&self) -> Option<(u64, u64)> {
        if self.points.is_empty() {
            return None;
        }
        let cap = self.config.display_cap as u64;
        Some((self.last_index.saturating_sub(cap), self.last_index))
    }

    /// Plotted value range padded by `y_margin` on both sides.
    pub fn y_range(&self) -> Option<(f64, f64)> {
        let (min, max) = self
            .points
            .iter()
            .map(|(_, v)| *v)
            .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })?;
        Some((min - self.config.y_margin, max + self.config.y_margin))
    }

    /// Empties both buffers and forgets the last plotted index.
    pub fn clear(&mut self) {
        self.points.clear();
        self.anomalies.clear();
        self.last_index = 0;
    }
}

pub type SharedDisplay = Arc<Mutex<DisplayBuffers>>;

pub fn create_shared_display(config: DisplayConfig) -> SharedDisplay {
    Arc::new(Mutex::new(DisplayBuffers::new(config)))
}
