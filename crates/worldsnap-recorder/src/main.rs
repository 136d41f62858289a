//! Recorder binary for Worldsnap.
//!
//! Wires a capture session to a simulated live world and runs one bounded
//! capture end to end: producers stage world data concurrently while the
//! session is capturing, then the session stops, drains everything to the
//! JSON storage flow, and reports.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `worldsnap-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Build the simulated world and the capture session
//! 4. Start the capture, answering the overwrite prompt if one is raised
//! 5. Run the producer tasks and the missing-container reporter
//! 6. Stop the capture and log the drain report

mod config;
mod error;
mod producer;
mod world;

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use worldsnap_core::config::{LoggingConfig, WorldsnapConfig};
use worldsnap_core::context::{ConfirmationPrompt, GameContext};
use worldsnap_core::messages::{LogMessageSink, MessageSink};
use worldsnap_core::session::{StartOutcome, StopReport};
use worldsnap_core::{CaptureSession, StagingCache};
use worldsnap_store::JsonStorageBackend;

use crate::config::RecorderConfig;
use crate::error::RecorderError;
use crate::producer::{Producer, ProducerStats, Wanderer};
use crate::world::{ChannelPrompt, SimulatedWorld};

/// Path of the configuration file, relative to the working directory.
const CONFIG_PATH: &str = "worldsnap-config.yaml";

/// Names of the players wandering the simulated world.
const WANDERERS: [&str; 5] = ["Alex", "Steve", "Kai", "Noor", "Sunny"];

/// Application entry point for the recorder.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the capture cannot be
/// started.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config = load_config()?;
    let recorder = config::load(Path::new(CONFIG_PATH))?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!(
        saves_dir = %config.capture.saves_dir.display(),
        producers = recorder.producers,
        ticks = recorder.ticks,
        tick_interval_ms = recorder.tick_interval_ms,
        "worldsnap-recorder starting"
    );

    let report = run(config, &recorder).await?;
    info!(
        level_name = report.level_name.as_str(),
        submitted = report.drain.submitted(),
        sink_failures = report.drain.failures.len(),
        written = report.pipeline.written,
        write_failures = report.pipeline.failed,
        completed = report.pipeline.completed,
        "Capture complete"
    );
    Ok(())
}

/// Run one capture against a fresh simulated world.
async fn run(config: WorldsnapConfig, recorder: &RecorderConfig) -> Result<StopReport, RecorderError> {
    // 3. Build the world and the session.
    let world = Arc::new(SimulatedWorld::from_config(recorder));
    let (prompt, mut prompts) = ChannelPrompt::new();
    let mut session = CaptureSession::new(
        config.capture,
        JsonStorageBackend::new().pretty(recorder.pretty_json),
        Arc::clone(&world) as Arc<dyn GameContext>,
        Arc::new(prompt) as Arc<dyn ConfirmationPrompt>,
        Arc::new(LogMessageSink) as Arc<dyn MessageSink>,
    );

    // 4. Start, resolving an overwrite prompt from configuration.
    match session.start(recorder.level_name.as_deref(), false).await? {
        StartOutcome::Started { level_name, .. } => {
            info!(level_name = level_name.as_str(), "Capturing");
        }
        StartOutcome::AwaitingConfirmation { level_name, .. } => {
            let asked = prompts
                .recv()
                .await
                .ok_or_else(|| RecorderError::PromptUnanswered {
                    level_name: level_name.clone(),
                })?;
            if session
                .resolve_overwrite(&asked, recorder.overwrite)
                .await?
                .is_none()
            {
                return Err(RecorderError::OverwriteDeclined { level_name });
            }
        }
    }

    // 5. Producers and the reporter.
    let cache = Arc::clone(session.cache());
    let reporter = tokio::spawn(report_missing_containers(
        Arc::clone(&cache),
        session.status(),
        recorder.report_interval(),
    ));

    let wanderers: Arc<[Wanderer]> = WANDERERS.iter().map(|name| Wanderer::named(name)).collect();
    let handles: Vec<_> = (0..recorder.producers)
        .map(|id| {
            let producer = Producer::new(
                id,
                Arc::clone(&cache),
                session.status(),
                Arc::clone(&world),
                Arc::clone(&wanderers),
                recorder.world_radius,
            );
            tokio::spawn(producer.run(recorder.ticks, recorder.tick_interval()))
        })
        .collect();

    let mut totals = ProducerStats::default();
    for result in futures::future::join_all(handles).await {
        let stats = result.map_err(|e| RecorderError::Producer {
            message: e.to_string(),
        })?;
        totals = totals.merge(stats);
    }
    reporter.abort();

    info!(
        regions = totals.regions,
        entities = totals.entities,
        players = totals.players,
        containers = totals.containers,
        staged_regions = cache.region_count(),
        staged_entities = cache.entity_count(),
        "Producers finished"
    );

    // 6. Stop and drain.
    let report = session.stop().await?;
    for failure in &report.drain.failures {
        warn!(
            kind = %failure.kind,
            region = ?failure.region,
            message = failure.message.as_str(),
            "Snapshot was not written"
        );
    }
    info!(
        stats_requests = world.stats_requests(),
        private_resets = world.private_resets(),
        "World signals"
    );
    Ok(report)
}

/// Periodically log which staged containers have not been opened yet.
async fn report_missing_containers(
    cache: Arc<StagingCache>,
    status: worldsnap_core::SessionStatus,
    interval: std::time::Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if !status.is_capturing() {
            break;
        }
        let missing = cache.missing_containers();
        info!(
            level_name = status.level_name().as_str(),
            missing = missing.len(),
            recorded = cache.container_count(),
            last_interacted = ?cache.last_interacted(),
            "Containers not yet opened"
        );
    }
}

/// Load `worldsnap-config.yaml`, falling back to defaults when absent.
fn load_config() -> Result<WorldsnapConfig, RecorderError> {
    let config_path = Path::new(CONFIG_PATH);
    if config_path.exists() {
        Ok(WorldsnapConfig::from_file(config_path)?)
    } else {
        let mut config = WorldsnapConfig::default();
        config.capture.apply_env_overrides();
        Ok(config)
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));
    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}
