use super::channel::{sample_channel, Delivery, SampleReceiver, SampleSender};
use super::detectors::z_score::ZScoreDetector;
use super::detectors::DetectorInstance;
use super::generator::{SignalGenerator, SignalSource};
use crate::config::Config;
use crate::errors::ConfigError;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{info, warn};

// -----------------------------------------------------------------------------
// STREAM DATA
// -----------------------------------------------------------------------------

/// A consumed measurement. The index is assigned when the coordinator takes
/// the value off the channel, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub index: u64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    #[serde(flatten)]
    pub sample: Sample,
    pub is_anomaly: bool,
    pub z_score: Option<f64>,
    pub detected_at: DateTime<Utc>,
}

impl DetectionResult {
    pub fn index(&self) -> u64 {
        self.sample.index
    }

    pub fn value(&self) -> f64 {
        self.sample.value
    }
}

// CONFIG COMPONENT ------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct StreamConfig {
    pub batch_size: usize,
    pub poll_interval_ms: u64,
    /// `None` keeps the channel unbounded.
    pub channel_capacity: Option<usize>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            poll_interval_ms: 500,
            channel_capacity: None,
        }
    }
}

impl StreamConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::invalid("batch_size", "must be at least 1"));
        }
        if self.channel_capacity == Some(0) {
            return Err(ConfigError::invalid(
                "channel_capacity",
                "must be at least 1 when set",
            ));
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// PRODUCER
// -----------------------------------------------------------------------------

/// Owns the producer thread. Stopping is cooperative: the flag is checked once
/// per iteration. Dropping the handle stops and joins the thread.
pub struct ProducerHandle {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<u64>>,
}

impl ProducerHandle {
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Signals the producer to stop and waits for it. Returns the number of
    /// samples it enqueued.
    pub fn stop(mut self) -> u64 {
        self.request_stop();
        self.wait()
    }

    /// Waits for the source to run dry without signalling a stop.
    pub fn join(mut self) -> u64 {
        self.wait()
    }

    fn wait(&mut self) -> u64 {
        match self.handle.take().map(JoinHandle::join) {
            Some(Ok(produced)) => produced,
            Some(Err(_)) => {
                warn!("producer thread panicked");
                0
            }
            None => 0,
        }
    }
}

impl Drop for ProducerHandle {
    fn drop(&mut self) {
        self.request_stop();
        self.wait();
    }
}

/// Runs `source` on its own thread, pushing every valid sample into `sender`
/// and pausing `pacing` after each one. Rejected samples are logged and
/// retried immediately. The loop ends on a stop request, when the source runs
/// dry, or when the consumer goes away.
pub fn spawn_producer<S>(mut source: S, sender: SampleSender, pacing: Duration) -> ProducerHandle
where
    S: SignalSource + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);

    let handle = thread::spawn(move || {
        info!(pacing_ms = pacing.as_millis() as u64, "producer started");
        let mut produced = 0u64;

        while !stop_flag.load(Ordering::Acquire) {
            let value = match source.next_sample() {
                Some(Ok(value)) => value,
                Some(Err(e)) => {
                    warn!(stage = "generator", error = %e, "discarding sample");
                    continue;
                }
                None => break,
            };

            match sender.put(value) {
                Delivery::Queued => produced += 1,
                Delivery::Dropped => {}
                Delivery::Closed => break,
            }

            if !pacing.is_zero() {
                thread::sleep(pacing);
            }
        }

        info!(produced, dropped = sender.dropped(), "producer stopped");
        produced
    });

    ProducerHandle {
        stop,
        handle: Some(handle),
    }
}

// -----------------------------------------------------------------------------
// STREAM COORDINATOR
// -----------------------------------------------------------------------------

/// Consumer side of the pipeline. Everything it owns (receiver, detector,
/// index counter) is touched only by the thread that calls `drain_batch`.
pub struct StreamCoordinator {
    receiver: SampleReceiver,
    detector: Box<dyn DetectorInstance>,
    last_index: u64,
    producer: Option<ProducerHandle>,
}

impl StreamCoordinator {
    /// Coordinator over an externally driven channel.
    pub fn new(receiver: SampleReceiver, detector: Box<dyn DetectorInstance>) -> Self {
        Self {
            receiver,
            detector,
            last_index: 0,
            producer: None,
        }
    }

    /// Builds the generator, channel and detector from `config` and starts
    /// the producer thread.
    pub fn spawn(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;

        let generator = SignalGenerator::from_config(&config.generator)?;
        let detector = ZScoreDetector::new(config.detector.clone())?;
        let (sender, receiver) = sample_channel(config.stream.channel_capacity);
        let producer = spawn_producer(generator, sender, config.generator.pacing_delay());

        Ok(Self::new(receiver, Box::new(detector)).with_producer(producer))
    }

    /// Ties a producer's lifetime to this coordinator.
    pub fn with_producer(mut self, producer: ProducerHandle) -> Self {
        self.producer = Some(producer);
        self
    }

    /// Takes up to `max_count` queued samples without blocking, indexes them
    /// and runs each through the detector, in channel order.
    pub fn drain_batch(&mut self, max_count: usize) -> Vec<DetectionResult> {
        let mut results = Vec::new();

        while results.len() < max_count {
            let Some(value) = self.receiver.try_take() else {
                break;
            };

            self.last_index += 1;
            let score = self.detector.evaluate(value);

            results.push(DetectionResult {
                sample: Sample {
                    index: self.last_index,
                    value,
                },
                is_anomaly: score.is_anomaly,
                z_score: score.z_score,
                detected_at: Utc::now(),
            });
        }

        results
    }

    /// Index of the most recently consumed sample; 0 before the first one.
    pub fn last_index(&self) -> u64 {
        self.last_index
    }

    pub fn detector_id(&self) -> &str {
        self.detector.id()
    }

    /// True once the producer is gone and the channel is drained.
    pub fn is_exhausted(&self) -> bool {
        self.receiver.is_disconnected()
    }

    pub fn dropped_samples(&self) -> u64 {
        self.receiver.dropped()
    }

    /// Stops the owned producer, if any. Samples already queued stay
    /// available to `drain_batch`.
    pub fn shutdown(&mut self) {
        if let Some(producer) = self.producer.take() {
            let produced = producer.stop();
            info!(produced, consumed = self.last_index, "stream coordinator shut down");
        }
    }
}

impl Drop for StreamCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::detectors::z_score::ZScoreDetectorConfig;
    use crate::processing::generator::ReplaySource;

    fn manual_coordinator() -> (SampleSender, StreamCoordinator) {
        let (sender, receiver) = sample_channel(None);
        let detector = ZScoreDetector::new(ZScoreDetectorConfig::default()).unwrap();
        (sender, StreamCoordinator::new(receiver, Box::new(detector)))
    }

    #[test]
    fn drain_on_empty_channel_returns_nothing() {
        let (_sender, mut coordinator) = manual_coordinator();
        assert!(coordinator.drain_batch(5).is_empty());
        assert_eq!(coordinator.last_index(), 0);
    }

    #[test]
    fn drain_respects_max_count_and_keeps_the_rest() {
        let (sender, mut coordinator) = manual_coordinator();
        for i in 0..7 {
            sender.put(i as f64);
        }

        let first = coordinator.drain_batch(5);
        assert_eq!(first.len(), 5);
        let second = coordinator.drain_batch(5);
        assert_eq!(second.len(), 2);

        let values: Vec<f64> = first.iter().chain(&second).map(|r| r.value()).collect();
        assert_eq!(values, (0..7).map(|i| i as f64).collect::<Vec<_>>());
    }

    #[test]
    fn indices_continue_across_calls_without_gaps() {
        let (sender, mut coordinator) = manual_coordinator();
        let mut indices = Vec::new();

        for burst in [3, 0, 1, 8, 2] {
            for _ in 0..burst {
                sender.put(1.0);
            }
            indices.extend(coordinator.drain_batch(5).iter().map(|r| r.index()));
        }
        indices.extend(coordinator.drain_batch(100).iter().map(|r| r.index()));

        assert_eq!(indices, (1..=14).collect::<Vec<u64>>());
        assert_eq!(coordinator.last_index(), 14);
    }

    #[test]
    fn drain_flags_outlier() {
        let (sender, mut coordinator) = manual_coordinator();
        for _ in 0..29 {
            sender.put(10.0);
        }
        sender.put(1000.0);

        let results = coordinator.drain_batch(30);
        let flagged: Vec<u64> = results.iter().filter(|r| r.is_anomaly).map(|r| r.index()).collect();
        assert_eq!(flagged, vec![30]);
        assert_eq!(results[0].z_score, None);
    }

    #[test]
    fn replay_producer_delivers_everything_in_order() {
        let (sender, receiver) = sample_channel(None);
        let detector = ZScoreDetector::new(ZScoreDetectorConfig::default()).unwrap();
        let values: Vec<f64> = (0..200).map(|i| i as f64 * 0.5).collect();

        let producer = spawn_producer(ReplaySource::new(values.clone()), sender, Duration::ZERO);
        assert_eq!(producer.join(), 200);

        let mut coordinator = StreamCoordinator::new(receiver, Box::new(detector));
        let mut taken = Vec::new();
        loop {
            let batch = coordinator.drain_batch(5);
            if batch.is_empty() {
                break;
            }
            taken.extend(batch.into_iter().map(|r| r.value()));
        }

        assert_eq!(taken, values);
        assert!(coordinator.is_exhausted());
    }

    #[test]
    fn producer_skips_invalid_samples() {
        let (sender, mut receiver) = sample_channel(None);
        let source = ReplaySource::new([1.0, f64::NAN, 2.0, f64::INFINITY, 3.0]);
        assert_eq!(spawn_producer(source, sender, Duration::ZERO).join(), 3);

        let taken: Vec<f64> = std::iter::from_fn(|| receiver.try_take()).collect();
        assert_eq!(taken, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn stop_ends_an_endless_producer() {
        let mut config = Config::default();
        config.generator.pacing_delay_ms = 1;
        config.generator.seed = Some(3);

        let mut coordinator = StreamCoordinator::spawn(&config).unwrap();
        while coordinator.last_index() < 10 {
            coordinator.drain_batch(5);
            thread::sleep(Duration::from_millis(1));
        }
        coordinator.shutdown();

        // Whatever was queued before the stop is still delivered, then the
        // channel reports the producer gone.
        while !coordinator.drain_batch(64).is_empty() {}
        assert!(coordinator.drain_batch(5).is_empty());
        assert!(coordinator.is_exhausted());
    }

    #[test]
    fn finite_producer_reports_finished() {
        let (sender, mut receiver) = sample_channel(None);
        let producer = spawn_producer(ReplaySource::new([4.0, 5.0]), sender, Duration::ZERO);
        while !producer.is_finished() {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(producer.join(), 2);
        assert_eq!(receiver.try_take(), Some(4.0));
    }

    #[test]
    fn coordinator_reports_its_detector() {
        let (_sender, coordinator) = manual_coordinator();
        assert_eq!(coordinator.detector_id(), "zscore");
    }

    #[test]
    fn spawn_rejects_invalid_config() {
        let mut config = Config::default();
        config.detector.window_size = 1;
        assert!(StreamCoordinator::spawn(&config).is_err());
    }
}
