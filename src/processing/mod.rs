pub mod channel;
pub mod coordinator;
pub mod detectors;
pub mod generator;

use crate::errors::{StreamError, StreamResult};

/// A sample is valid iff it is a finite real number.
pub fn validate_sample(value: f64) -> StreamResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(StreamError::InvalidSample { value })
    }
}
