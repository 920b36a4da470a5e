use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{info, warn};

use zscore_stream::visualization::terminal::render_line;
use zscore_stream::{
    init_logging, load_config, save_config, Config, DisplayBuffers, StreamConfig,
    StreamCoordinator,
};

#[derive(Parser)]
#[command(name = "zscore-stream")]
#[command(version)]
#[command(about = "Streams a synthetic signal and flags rolling z-score outliers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the generator and detector, printing every scored sample
    Run {
        /// YAML config file; defaults are used when absent
        #[arg(short, long, env = "ZSCORE_STREAM_CONFIG")]
        config: Option<PathBuf>,

        /// Stop after this many polls instead of running forever
        #[arg(short, long)]
        polls: Option<u64>,

        /// Seed the generator for a reproducible stream
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Write the default configuration to a YAML file
    InitConfig { path: PathBuf },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            polls,
            seed,
        } => run(config, polls, seed),
        Commands::InitConfig { path } => {
            save_config(&Config::default(), &path)?;
            println!("Wrote default config to {}", path.display());
            Ok(())
        }
    }
}

fn run(
    config_path: Option<PathBuf>,
    polls: Option<u64>,
    seed: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &config_path {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    if seed.is_some() {
        config.generator.seed = seed;
    }

    init_logging(&config.logging);
    info!(
        window_size = config.detector.window_size,
        threshold = config.detector.z_score_threshold,
        batch_size = config.stream.batch_size,
        "starting stream"
    );

    let stop = interrupt_flag()?;
    let mut coordinator = StreamCoordinator::spawn(&config)?;
    let mut sink = DisplayBuffers::new(config.display.clone());

    let completed = poll_loop(&mut coordinator, &mut sink, &config.stream, polls, &stop);

    coordinator.shutdown();
    info!(
        detector = coordinator.detector_id(),
        polls = completed,
        consumed = coordinator.last_index(),
        plotted = sink.len(),
        anomalies = sink.anomaly_count(),
        "stream stopped"
    );
    Ok(())
}

/// Drains one batch per poll interval into the sink until `polls` is reached
/// or `stop` is set. Returns the number of completed polls.
fn poll_loop(
    coordinator: &mut StreamCoordinator,
    sink: &mut DisplayBuffers,
    stream: &StreamConfig,
    polls: Option<u64>,
    stop: &AtomicBool,
) -> u64 {
    let interval = stream.poll_interval();
    let mut completed = 0u64;

    while !stop.load(Ordering::Acquire) && polls.map_or(true, |limit| completed < limit) {
        thread::sleep(interval);

        let batch = coordinator.drain_batch(stream.batch_size);
        for result in &batch {
            println!("{}", render_line(result));
        }
        sink.add_results(&batch);
        completed += 1;
    }

    completed
}

/// Flag raised on Ctrl-C, so the poll loop can wind the producer down
/// instead of the process being killed mid-stream.
fn interrupt_flag() -> std::io::Result<Arc<AtomicBool>> {
    let stop = Arc::new(AtomicBool::new(false));
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let flag = Arc::clone(&stop);
    thread::spawn(move || {
        runtime.block_on(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("received Ctrl+C, stopping stream");
                    flag.store(true, Ordering::Release);
                }
                Err(e) => warn!(error = %e, "failed to listen for Ctrl+C"),
            }
        });
    });

    Ok(stop)
}
