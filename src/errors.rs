use thiserror::Error;

/// Errors raised on the sample path. All of them are recoverable: the
/// offending sample is logged and skipped, and the stream carries on.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StreamError {
    #[error("invalid sample: {value} is not a finite number")]
    InvalidSample { value: f64 },
}

/// Errors raised while loading, saving or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

pub type StreamResult<T> = Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_sample_message_carries_value() {
        let e = StreamError::InvalidSample { value: f64::NAN };
        assert!(e.to_string().contains("NaN"));
    }

    #[test]
    fn invalid_config_message_names_field() {
        let e = ConfigError::invalid("window_size", "must be at least 2");
        let msg = e.to_string();
        assert!(msg.contains("window_size"));
        assert!(msg.contains("at least 2"));
    }

    #[test]
    fn io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "config missing");
        let err: ConfigError = io_err.into();
        assert!(err.to_string().contains("config missing"));
    }
}
