//! # Show Playback Example
//!
//! Loads a show description from a JSON file, plays it through the gapless
//! engine and logs every event until the show finishes.
//!
//! Run with:
//! `cargo run --example play_show --package core-playback -- show.json --headless --speed 4`
//!
//! Add `--features device-output` and drop `--headless` to hear it on the
//! default output device.
//!
//! The file looks like:
//!
//! ```json
//! {
//!   "date": "1977-05-08",
//!   "venue": "Barton Hall",
//!   "tracks": [{ "title": "Minglewood Blues", "mp3": "https://..." }]
//! }
//! ```

use anyhow::{Context, Result};
use bridge_desktop::{NullAudioSink, ReqwestHttpClient};
use bridge_traits::playback::AudioSink;
use clap::Parser;
use core_playback::{EngineConfig, GaplessEngine, PlaybackEvent, PlaybackState, ShowData};
use core_runtime::logging::{init_logging, LoggingConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "play_show")]
#[command(about = "Play a show description through the gapless engine")]
struct Args {
    /// Show JSON with a `tracks` array
    show: PathBuf,

    /// Render to a clock-paced null sink instead of the output device
    #[arg(long)]
    headless: bool,

    /// Pull rate of the headless sink relative to real time
    #[arg(long, default_value_t = 1.0)]
    speed: f64,

    /// Engine configuration JSON
    #[arg(long, env = "SHOWSTREAM_CONFIG")]
    config: Option<PathBuf>,
}

fn build_sink(args: &Args) -> Result<Arc<dyn AudioSink>> {
    if args.headless {
        return Ok(Arc::new(NullAudioSink::with_speed(args.speed)));
    }
    device_sink(args)
}

#[cfg(feature = "device-output")]
fn device_sink(_args: &Args) -> Result<Arc<dyn AudioSink>> {
    let sink = bridge_desktop::CpalAudioSink::new().context("opening the output device")?;
    Ok(Arc::new(sink))
}

#[cfg(not(feature = "device-output"))]
fn device_sink(args: &Args) -> Result<Arc<dyn AudioSink>> {
    warn!("Built without device-output; falling back to the headless sink");
    Ok(Arc::new(NullAudioSink::with_speed(args.speed)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(LoggingConfig::default())?;

    let config = match &args.config {
        Some(path) => EngineConfig::from_json(
            &std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?,
        )?,
        None => EngineConfig::default(),
    };
    let show = ShowData::from_json(
        &std::fs::read_to_string(&args.show)
            .with_context(|| format!("reading {}", args.show.display()))?,
    )?;

    info!(
        date = show.date.as_deref().unwrap_or("?"),
        venue = show.venue.as_deref().unwrap_or("?"),
        tracks = show.tracks.len(),
        "Loaded show"
    );

    let engine = GaplessEngine::new(Arc::new(ReqwestHttpClient::new()), build_sink(&args)?, config)?;
    let mut events = engine.subscribe();

    engine.load_show(&show).await?;
    engine.play().await?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            event = events.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        warn!("Event stream error: {}", e);
                        continue;
                    }
                };
                match &event.event {
                    PlaybackEvent::TrackChanged { track_index } => {
                        let title = show
                            .tracks
                            .get(*track_index)
                            .and_then(|t| t.title.as_deref())
                            .unwrap_or("untitled");
                        info!(session = %event.session, "Now playing {}: {}", track_index + 1, title);
                    }
                    PlaybackEvent::PositionChanged { position_secs, .. } => {
                        tracing::debug!("Position {:.1}s", position_secs);
                    }
                    PlaybackEvent::Error { message, .. } => {
                        error!("{}", message);
                        if engine.state() == PlaybackState::Stopped {
                            break;
                        }
                    }
                    PlaybackEvent::PlaybackFinished => {
                        info!("Show finished");
                        break;
                    }
                }
            }
        }
    }

    engine.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from(["play_show", "show.json", "--headless", "--speed", "4"]).unwrap();
        assert_eq!(args.show, PathBuf::from("show.json"));
        assert!(args.headless);
        assert_eq!(args.speed, 4.0);

        assert!(Args::try_parse_from(["play_show", "--headless"]).is_err());
    }
}
