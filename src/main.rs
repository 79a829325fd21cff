//! Soundscape - looping ambient playback with an equalizer cutoff

mod cli;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use soundscape::Settings;
use soundscape::audio::{
    AudioEvent, AudioEventReceiver, AudioThreadHandle, BandEqualizer, BandLayout, CutoffResponse,
    LevelRange, MediaBackend, RodioBackend, SoundCatalog, VirtualBackend, filter_and_play_with,
    get_audio_devices, spawn_audio_thread,
};

use cli::{Args, Command};

/// Time allowed for the audio thread to release its sessions on exit
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "soundscape=debug"
    } else {
        "soundscape=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = match &args.config {
        Some(path) => Settings::load_from_file(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => Settings::load(),
    };
    let device = args.device.clone().or_else(|| settings.output.device_name.clone());
    let layout = settings.band_layout();

    match args.command {
        Command::Play {
            file,
            cutoff,
            response,
            seconds,
        } => {
            let cutoff = cutoff.unwrap_or(settings.equalizer.default_cutoff_hz);
            let response = response.unwrap_or(settings.equalizer.response);

            if args.virtual_output {
                play(&VirtualBackend::new(layout), &file, cutoff, response, seconds).await
            } else {
                let backend = RodioBackend::with_device(device.as_deref(), layout)
                    .context("Failed to open audio output")?;
                play(&backend, &file, cutoff, response, seconds).await
            }
        }

        Command::Mix {
            files,
            volume,
            warmth,
            oscillate,
            seconds,
        } => {
            let thread = start_module(args.virtual_output, device, layout, &settings)?;
            for file in &files {
                thread.handle.play_url(file);
                let key = file.to_string_lossy().into_owned();
                if let Some(v) = volume {
                    thread.handle.set_volume_for(key.clone(), v);
                }
                if let Some(d) = oscillate {
                    thread.handle.set_oscillation_for(key, d);
                }
            }
            if let Some(w) = warmth {
                thread.handle.set_warmth(vec![w]);
            }
            run_module(thread, seconds).await
        }

        Command::Scene {
            key,
            layers,
            seconds,
        } => {
            if settings.sounds.is_empty() {
                anyhow::bail!("No sounds configured; add a \"sounds\" map to the settings file");
            }
            let thread = start_module(args.virtual_output, device, layout, &settings)?;
            thread.handle.play_scene(key);
            for layer in layers {
                thread.handle.add_layer(layer);
            }
            run_module(thread, seconds).await
        }

        Command::Bands => {
            println!(
                "{} equalizer, {} response",
                settings.equalizer.layout, settings.equalizer.response
            );
            print_layout(&layout);
            Ok(())
        }

        Command::Devices => {
            for device in get_audio_devices() {
                println!("{:<40} {}", device.name, device.description);
            }
            Ok(())
        }
    }
}

/// Direct filtered playback on the calling thread
async fn play<B: MediaBackend>(
    backend: &B,
    file: &Path,
    cutoff: i32,
    response: CutoffResponse,
    seconds: Option<f32>,
) -> Result<()> {
    let playback = filter_and_play_with(backend, file, f64::from(cutoff), response)
        .with_context(|| format!("Failed to play {}", file.display()))?;

    println!("{} cutoff {} Hz ({})", playback.session_id(), cutoff, response);
    let eq = playback.equalizer();
    for (band, level) in playback.levels().iter().enumerate() {
        let center = eq.center_freq(band as u16).unwrap_or_default() / 1000;
        println!("  band {:>2}  {:>6} Hz  {:>6} mB", band, center, level);
    }

    wait(seconds).await;
    info!("Stopping {}", playback.session_id());
    Ok(())
}

fn start_module(
    virtual_output: bool,
    device: Option<String>,
    layout: BandLayout,
    settings: &Settings,
) -> Result<AudioThreadHandle> {
    let catalog: SoundCatalog = settings.sounds.clone();
    let config = settings.mix_config();

    let thread = if virtual_output {
        spawn_audio_thread(move || Ok(VirtualBackend::new(layout)), catalog, config)
    } else {
        spawn_audio_thread(
            move || RodioBackend::with_device(device.as_deref(), layout),
            catalog,
            config,
        )
    };
    thread.context("Failed to start audio thread")
}

async fn run_module(mut thread: AudioThreadHandle, seconds: Option<f32>) -> Result<()> {
    if let Some(rx) = thread.take_event_rx() {
        tokio::spawn(log_events(rx));
    }

    wait(seconds).await;

    thread.handle.stop();
    thread
        .join(SHUTDOWN_TIMEOUT)
        .context("Audio thread did not shut down")?;
    Ok(())
}

async fn log_events(mut rx: AudioEventReceiver) {
    while let Some(event) = rx.recv().await {
        match event {
            AudioEvent::Error { message } => tracing::error!("{}", message),
            AudioEvent::FilterFailed { path, error, .. } => {
                tracing::error!("{}: {}", path.display(), error)
            }
            other => info!("{:?}", other),
        }
    }
}

/// Playback time limit; values no `Duration` can hold mean no limit
fn time_limit(seconds: Option<f32>) -> Option<Duration> {
    seconds.and_then(|s| Duration::try_from_secs_f32(s).ok())
}

/// Wait for Ctrl-C, or at most `seconds`
async fn wait(seconds: Option<f32>) {
    match time_limit(seconds) {
        Some(limit) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = tokio::time::sleep(limit) => {}
            }
        }
        None => {
            info!("Playing; press Ctrl-C to stop");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

fn print_layout(layout: &BandLayout) {
    let range = LevelRange::from_platform(layout.raw_range());
    println!(
        "{} bands, level range {} .. {} mB",
        layout.band_count(),
        range.min,
        range.max
    );
    for (band, center) in layout.centers_mhz().iter().enumerate() {
        println!("  band {:>2}  {:>8.1} Hz", band, f64::from(*center) / 1000.0);
    }
}
