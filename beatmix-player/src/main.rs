//! beatmix player - main entry point
//!
//! Loads a directory of annotated songs, mixes them in order and plays the
//! result until interrupted.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

use beatmix_player::audio::{CpalOpener, SongLibrary, VarispeedStretcher};
use beatmix_player::config::{LoggingConfig, PlayerConfig};
use beatmix_player::{MixController, MixSources, SequentialSelector};

/// Command-line arguments for beatmix-player
#[derive(Parser, Debug)]
#[command(name = "beatmix-player")]
#[command(about = "Beat-matched continuous mix player")]
#[command(version)]
struct Args {
    /// Directory of audio files with `.beats.json` annotations
    #[arg(short, long, env = "BEATMIX_MUSIC_DIR", required_unless_present = "list_devices")]
    music_dir: Option<PathBuf>,

    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Record the mix to disk
    #[arg(short, long)]
    record: bool,

    /// Play in mono
    #[arg(long, conflicts_with = "stereo")]
    mono: bool,

    /// Play in stereo (overrides the config file)
    #[arg(long)]
    stereo: bool,

    /// Output device name (overrides the config file)
    #[arg(short, long)]
    device: Option<String>,

    /// Print the available output devices and exit
    #[arg(long)]
    list_devices: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins; otherwise the config file level replaces this default
    let env_filter = EnvFilter::try_from_default_env().ok();
    let filter_from_env = env_filter.is_some();
    let initial = env_filter.unwrap_or_else(|| EnvFilter::new(LoggingConfig::default().filter_directive()));
    let (filter, filter_handle) = reload::Layer::new(initial);
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    if args.list_devices {
        for name in CpalOpener::list_devices().context("Failed to list output devices")? {
            println!("{}", name);
        }
        return Ok(());
    }

    let mut config = PlayerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if args.mono {
        config.stereo = false;
    } else if args.stereo {
        config.stereo = true;
    }
    if args.device.is_some() {
        config.device = args.device.clone();
    }

    if !filter_from_env {
        filter_handle
            .reload(EnvFilter::new(config.logging.filter_directive()))
            .context("Failed to apply configured log level")?;
    }

    info!(
        "Starting beatmix player (git {}, built {}, {})",
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    let Some(music_dir) = args.music_dir.as_deref() else {
        bail!("--music-dir is required");
    };
    info!("Music directory: {}", music_dir.display());

    let mut library = SongLibrary::new(config.channels() as usize, config.sample_rate);
    library
        .load_directory(music_dir)
        .with_context(|| format!("Failed to read {}", music_dir.display()))?;
    if library.is_empty() {
        bail!("No annotated songs in {}", music_dir.display());
    }

    let selector = SequentialSelector::new(library.into_songs())
        .with_phrase_len(config.selector.phrase_len)
        .with_fades(config.selector.fade_in_len, config.selector.fade_out_len)
        .with_lookahead(config.lookahead_downbeats);
    let sources = MixSources {
        selector: Box::new(selector),
        stretcher: Box::new(VarispeedStretcher::new()),
    };
    let opener = Arc::new(CpalOpener::new(config.device.clone()));

    let mut controller = MixController::new(config.mix_settings(), sources, opener);
    controller.play(args.record).context("Failed to start playback")?;

    let mut poll = tokio::time::interval(Duration::from_millis(500));
    tokio::select! {
        _ = shutdown_signal() => {}
        _ = async {
            loop {
                poll.tick().await;
                if !controller.is_active() {
                    info!("Mix stream ended");
                    break;
                }
            }
        } => {}
    }

    if let Err(e) = controller.stop() {
        error!("Mix ended with an error: {}", e);
        return Err(e).context("Mix stream failed");
    }

    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
