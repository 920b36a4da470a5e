pub mod z_score;

// DETECTOR COMPONENT ----------------------------------------------------------

/// Outcome of scoring one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    /// `None` when the sample was rejected or the baseline was too small.
    pub z_score: Option<f64>,
    pub is_anomaly: bool,
}

impl Score {
    pub const UNSCORED: Score = Score {
        z_score: None,
        is_anomaly: false,
    };
}

pub trait DetectorInstance: Send {
    fn id(&self) -> &str;

    /// Scores `value` and folds it into the detector's state.
    fn evaluate(&mut self, value: f64) -> Score;

    fn update_and_detect(&mut self, value: f64) -> bool {
        self.evaluate(value).is_anomaly
    }
}

// BUFFER COMPONENT ------------------------------------------------------------

/// Fixed-capacity ring of the most recent values, oldest evicted first.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    buffer: Vec<f64>,
    capacity: usize,
    start: usize,
    len: usize,
}

impl RollingWindow {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: vec![0.0; capacity],
            capacity,
            start: 0,
            len: 0,
        }
    }

    /// Appends `value`, returning the evicted oldest value when full.
    pub fn push(&mut self, value: f64) -> Option<f64> {
        if self.len < self.capacity {
            let end = (self.start + self.len) % self.capacity;
            self.buffer[end] = value;
            self.len += 1;
            None
        } else {
            let evicted = std::mem::replace(&mut self.buffer[self.start], value);
            self.start = (self.start + 1) % self.capacity;
            Some(evicted)
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Index 0 is the oldest value.
    pub fn get(&self, index: usize) -> Option<f64> {
        if index >= self.len {
            return None;
        }
        Some(self.buffer[(self.start + index) % self.capacity])
    }

    /// Values in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.len).map(move |i| self.buffer[(self.start + i) % self.capacity])
    }

    pub fn mean(&self) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        Some(self.iter().sum::<f64>() / self.len as f64)
    }

    /// Population standard deviation, two-pass over the window.
    pub fn population_std_dev(&self) -> Option<f64> {
        self.statistics().map(|(_, std_dev)| std_dev)
    }

    /// `(mean, population std dev)`.
    pub fn statistics(&self) -> Option<(f64, f64)> {
        let mean = self.mean()?;
        let variance = self.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / self.len as f64;
        Some((mean, variance.sqrt()))
    }
}
