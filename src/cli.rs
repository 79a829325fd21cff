//! Command-line argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use soundscape::audio::CutoffResponse;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "soundscape")]
#[command(about = "Looping ambient playback with an equalizer cutoff", long_about = None)]
#[command(version)]
pub struct Args {
    /// Settings file (defaults to the user config directory)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Output device name (see `devices`)
    #[arg(long, value_name = "NAME", global = true)]
    pub device: Option<String>,

    /// Render into a headless virtual output instead of the speakers
    #[arg(long = "virtual", global = true)]
    pub virtual_output: bool,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Loop one file with bands above the cutoff silenced
    Play {
        file: PathBuf,

        /// Cutoff in Hz (defaults to the configured cutoff)
        #[arg(long, value_name = "HZ", allow_hyphen_values = true)]
        cutoff: Option<i32>,

        /// full: bands at max below the cutoff; attenuate: unity below, cut above
        #[arg(long, value_name = "RESPONSE")]
        response: Option<CutoffResponse>,

        /// Stop after this many seconds instead of waiting for Ctrl-C
        #[arg(long, value_name = "SECONDS")]
        seconds: Option<f32>,
    },

    /// Mix several looping files as layers
    Mix {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Volume for every layer (0.0 - 1.0)
        #[arg(long, value_name = "V")]
        volume: Option<f32>,

        /// Warmth (0.0 - 1.0); warmer lowers the cutoff
        #[arg(long, value_name = "W")]
        warmth: Option<f32>,

        /// Volume oscillation depth for every layer (0.0 - 1.0)
        #[arg(long, value_name = "D")]
        oscillate: Option<f32>,

        #[arg(long, value_name = "SECONDS")]
        seconds: Option<f32>,
    },

    /// Play a scene from the sound catalog, with extra layers
    Scene {
        key: String,

        /// Catalog key stacked on the scene (repeatable)
        #[arg(long = "layer", value_name = "KEY")]
        layers: Vec<String>,

        #[arg(long, value_name = "SECONDS")]
        seconds: Option<f32>,
    },

    /// Show the configured equalizer bands
    Bands,

    /// List output devices
    Devices,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_play() {
        let args = Args::parse_from([
            "soundscape",
            "--virtual",
            "play",
            "rain.ogg",
            "--cutoff",
            "-50",
            "--response",
            "attenuate",
        ]);
        assert!(args.virtual_output);
        match args.command {
            Command::Play {
                file,
                cutoff,
                response,
                seconds,
            } => {
                assert_eq!(file, PathBuf::from("rain.ogg"));
                assert_eq!(cutoff, Some(-50));
                assert_eq!(response, Some(CutoffResponse::Attenuate));
                assert_eq!(seconds, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_scene_layers_and_globals_after_subcommand() {
        let args = Args::parse_from([
            "soundscape",
            "scene",
            "rain",
            "--layer",
            "fire",
            "--layer",
            "birds",
            "--verbose",
        ]);
        assert!(args.verbose);
        match args.command {
            Command::Scene { key, layers, .. } => {
                assert_eq!(key, "rain");
                assert_eq!(layers, vec!["fire".to_string(), "birds".to_string()]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_mix_requires_files() {
        assert!(Args::try_parse_from(["soundscape", "mix"]).is_err());
    }
}
