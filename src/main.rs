mod app;
mod audio;
mod cli;
mod error;
mod library;
mod playback;
mod tasks;
mod weather;

use std::sync::Arc;

use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use crate::app::{HourlySettings, Mode, Settings, WeatherSetting, LOCAL_LOCATION};
use crate::audio::{FfmpegCodec, SegmentCache};
use crate::cli::Args;
use crate::error::{JukeboxError, Result};
use crate::library::{LoopTimings, MusicLibrary};
use crate::playback::PlaybackEngine;
use crate::tasks::{RotationPolicy, Scheduler, SchedulerConfig};
use crate::weather::{IpLocator, WttrClient};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_tracing(args.verbose);

    info!("kkjukebox v{} starting", env!("CARGO_PKG_VERSION"));

    // Set up graceful shutdown
    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            return;
        }
        info!("Received Ctrl-C, fading out...");
        shutdown.cancel();
    });

    if let Err(e) = run(args, cancel).await {
        error!("{}", e);
        std::process::exit(e.exit_code());
    }

    info!("kkjukebox shutdown complete");
}

/// Initialize tracing subscriber
fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();
}

/// Location for live weather, geolocating when asked for the local one
async fn live_location(settings: &HourlySettings) -> Result<Option<String>> {
    if settings.weather != WeatherSetting::Location {
        return Ok(None);
    }
    if !settings.location.eq_ignore_ascii_case(LOCAL_LOCATION) {
        return Ok(Some(settings.location.clone()));
    }

    let locator = IpLocator::new()
        .map_err(|e| JukeboxError::Config(format!("failed to create HTTP client: {}", e)))?;
    Ok(locator.locate().await)
}

async fn run(args: Args, cancel: CancellationToken) -> Result<()> {
    let settings = Settings::from_args(&args)?;

    info!(
        music_root = ?settings.music_root,
        timings_dir = ?settings.timings_dir,
        force_cut = settings.force_cut,
        normalize = settings.normalize,
        "Starting session"
    );

    let timings = LoopTimings::load_dir(&settings.timings_dir)?;
    let library = Arc::new(MusicLibrary::new(settings.music_root.clone(), timings));
    let segments = Arc::new(SegmentCache::new(FfmpegCodec::new(), settings.normalize));

    let mut rng = match settings.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let policy = match &settings.mode {
        Mode::Hourly(hourly) => RotationPolicy::hourly(hourly, live_location(hourly).await?)?,
        Mode::Catalogue(kk) => RotationPolicy::catalogue(kk, &library, &mut rng)?,
    };

    let weather = WttrClient::new()
        .map_err(|e| JukeboxError::Config(format!("failed to create HTTP client: {}", e)))?;

    // Initialize playback engine
    let device = PlaybackEngine::new(settings.volume)?;

    let config = SchedulerConfig {
        force_cut: settings.force_cut,
        ..SchedulerConfig::default()
    };
    let scheduler = Scheduler::new(config, library, segments, device, weather, policy, cancel)
        .with_rng(rng);

    let mut state = scheduler.subscribe();
    tokio::spawn(async move {
        while state.changed().await.is_ok() {
            let current = state.borrow_and_update().clone();
            info!(status = current.status_text(), "Playback {:?}", current);
        }
    });

    // The output stream is tied to this thread, so the scheduler runs here
    scheduler.run().await
}
