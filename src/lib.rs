//! Real-time anomaly detection over a streamed scalar signal.
//!
//! A [`SignalGenerator`] runs on its own thread and pushes samples into a
//! non-blocking channel. A [`StreamCoordinator`] drains that channel on the
//! caller's cadence, indexes each sample and scores it with a rolling-window
//! [`ZScoreDetector`]. The resulting [`DetectionResult`]s feed a bounded
//! [`DisplayBuffers`] sink.

pub mod config;
pub mod errors;
pub mod processing;
pub mod utils;
pub mod visualization;

pub use config::{load_config, save_config, Config};
pub use errors::{ConfigError, StreamError, StreamResult};
pub use processing::channel::{sample_channel, Delivery, SampleReceiver, SampleSender};
pub use processing::coordinator::{
    spawn_producer, DetectionResult, ProducerHandle, Sample, StreamConfig, StreamCoordinator,
};
pub use processing::detectors::z_score::{BaselineMode, ZScoreDetector, ZScoreDetectorConfig};
pub use processing::detectors::{DetectorInstance, RollingWindow, Score};
pub use processing::generator::{GeneratorConfig, ReplaySource, SignalGenerator, SignalSource};
pub use processing::validate_sample;
pub use utils::log::{init_logging, LoggingConfig};
pub use visualization::plotter::{create_shared_display, DisplayBuffers, SharedDisplay};
pub use visualization::DisplayConfig;
