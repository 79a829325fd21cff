//! Output-device backend using rodio
//!
//! Each prepared session owns its own `Sink` on the shared output mixer.
//! The decoded source is wrapped in the session chain (equalizer + gain)
//! before it reaches the sink, so the equalizer is bound to exactly that
//! session. Sinks start paused and only play once `start` is called.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use rodio::cpal::traits::{DeviceTrait, HostTrait};
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source, mixer::Mixer};

use super::backend::{MediaBackend, PlaybackSession, SessionId};
use super::chain::SessionChain;
use super::equalizer::{BandLayout, EqualizerParams};
use crate::error::{FilterError, Result};

/// Cached audio devices to avoid repeated enumeration (which triggers Jack/ALSA warnings)
static AUDIO_DEVICES_CACHE: OnceLock<Vec<AudioDevice>> = OnceLock::new();

/// Open and decode a media file
pub(crate) fn open_decoder(path: &Path) -> Result<Decoder<BufReader<File>>> {
    let file = File::open(path).map_err(|source| FilterError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    Decoder::new(BufReader::new(file)).map_err(|e| FilterError::Decode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Backend playing through a real output device
pub struct RodioBackend {
    _stream: OutputStream,
    mixer: Arc<Mixer>,
    layout: BandLayout,
    device_name: Option<String>,
}

impl std::fmt::Debug for RodioBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RodioBackend")
            .field("device_name", &self.device_name)
            .field("bands", &self.layout.band_count())
            .finish_non_exhaustive()
    }
}

impl RodioBackend {
    /// Open the default output device
    pub fn new(layout: BandLayout) -> Result<Self> {
        Self::with_device(None, layout)
    }

    /// Open a specific output device by name (`None` = default)
    pub fn with_device(device_name: Option<&str>, layout: BandLayout) -> Result<Self> {
        let stream = if let Some(name) = device_name {
            Self::create_stream_for_device(name)?
        } else {
            OutputStreamBuilder::open_default_stream()
                .map_err(|e| FilterError::Output(format!("failed to open default output: {e}")))?
        };
        let mixer = stream.mixer().clone();

        tracing::info!("Audio output ready (device: {:?})", device_name);
        Ok(Self {
            _stream: stream,
            mixer: Arc::new(mixer),
            layout,
            device_name: device_name.map(|s| s.to_string()),
        })
    }

    /// Create output stream for a specific device by name
    fn create_stream_for_device(device_name: &str) -> Result<OutputStream> {
        let host = rodio::cpal::default_host();

        let device = host
            .output_devices()
            .map_err(|e| FilterError::Output(format!("failed to enumerate devices: {e}")))?
            .find(|d| d.name().map(|n| n == device_name).unwrap_or(false))
            .ok_or_else(|| FilterError::DeviceNotFound(device_name.to_string()))?;

        let config = device
            .default_output_config()
            .map_err(|e| FilterError::Output(format!("failed to get device config: {e}")))?;

        OutputStreamBuilder::from_device(device)
            .map_err(|e| FilterError::Output(format!("failed to create stream builder: {e}")))?
            .with_sample_rate(config.sample_rate().0)
            .open_stream()
            .map_err(|e| FilterError::Output(format!("failed to open stream: {e}")))
    }

    pub fn device_name(&self) -> Option<&str> {
        self.device_name.as_deref()
    }
}

impl MediaBackend for RodioBackend {
    type Session = RodioSession;

    fn prepare(&self, source: &Path, looping: bool) -> Result<RodioSession> {
        let decoder = open_decoder(source)?;
        let chain = SessionChain::new(self.layout.clone());

        let sink = Sink::connect_new(&self.mixer);
        // Prepared sessions stay silent until started
        sink.pause();
        if looping {
            sink.append(chain.apply(decoder.repeat_infinite()));
        } else {
            sink.append(chain.apply(decoder));
        }

        let id = SessionId::next();
        tracing::info!("Prepared {} for {:?} (looping: {})", id, source, looping);

        Ok(RodioSession {
            id,
            path: source.to_path_buf(),
            sink: Some(sink),
            chain,
            looping,
        })
    }
}

/// One sink on the output mixer
pub struct RodioSession {
    id: SessionId,
    path: PathBuf,
    sink: Option<Sink>,
    chain: SessionChain,
    looping: bool,
}

impl RodioSession {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PlaybackSession for RodioSession {
    type Equalizer = EqualizerParams;

    fn session_id(&self) -> SessionId {
        self.id
    }

    fn attach_equalizer(&mut self) -> Result<EqualizerParams> {
        tracing::debug!("Equalizer attached to {}", self.id);
        Ok(self.chain.equalizer().clone())
    }

    fn start(&mut self) -> Result<()> {
        let sink = self
            .sink
            .as_ref()
            .ok_or_else(|| FilterError::Output(format!("{} already released", self.id)))?;
        sink.play();
        tracing::info!("Started {} ({:?})", self.id, self.path);
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) {
        self.chain.gain().fade_to(volume, super::fade::VOLUME_RAMP);
    }

    fn set_oscillation(&mut self, depth: f32, period: Duration) {
        self.chain.gain().set_period(period);
        self.chain.gain().set_depth(depth);
    }

    fn is_playing(&self) -> bool {
        self.sink
            .as_ref()
            .map(|sink| !sink.is_paused() && !sink.empty())
            .unwrap_or(false)
    }

    fn is_looping(&self) -> bool {
        self.looping
    }

    fn detach(mut self) {
        if let Some(sink) = self.sink.take() {
            tracing::info!("Detached {}; it plays until the process exits", self.id);
            sink.detach();
        }
    }
}

impl Drop for RodioSession {
    fn drop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
            tracing::debug!("Released {}", self.id);
        }
    }
}

#[derive(Debug, Clone)]
pub struct AudioDevice {
    pub name: String,        // Internal name for selection
    pub description: String, // User-friendly display name
}

/// Get list of available audio output devices
///
/// Results are cached to avoid repeated enumeration (which triggers Jack/ALSA warnings)
pub fn get_audio_devices() -> Vec<AudioDevice> {
    AUDIO_DEVICES_CACHE.get_or_init(get_cpal_devices).clone()
}

fn get_cpal_devices() -> Vec<AudioDevice> {
    let host = rodio::cpal::default_host();
    let mut devices = Vec::new();

    if let Ok(output_devices) = host.output_devices() {
        for device in output_devices {
            let Ok(name) = device.name() else {
                continue;
            };

            if is_skipped_device(&name) {
                continue;
            }

            // Check if device has valid output config
            if device.default_output_config().is_ok() {
                devices.push(AudioDevice {
                    name: name.clone(),
                    description: name,
                });
            }
        }
    }

    devices
}

/// Backends that misbehave or only alias another device
fn is_skipped_device(name: &str) -> bool {
    let name_lower = name.to_lowercase();
    name_lower.contains("jack")
        || name_lower.contains("oss")
        || name_lower.contains("/dev/dsp")
        || name == "default"
        || name == "pipewire"
        || name == "pulse"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skipped_devices() {
        assert!(is_skipped_device("default"));
        assert!(is_skipped_device("JACK Audio Connection Kit"));
        assert!(is_skipped_device("/dev/dsp1"));
        assert!(!is_skipped_device("hw:0,0"));
        assert!(!is_skipped_device("Speakers (Realtek)"));
    }

    #[test]
    fn test_open_decoder_missing_file() {
        let err = open_decoder(Path::new("/definitely/not/here.wav")).err().unwrap();
        assert!(matches!(err, FilterError::Open { .. }));
        assert!(err.is_prepare_failure());
    }

    #[test]
    fn test_open_decoder_rejects_non_audio() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.wav");
        std::fs::write(&path, b"this is not audio at all").unwrap();

        let err = open_decoder(&path).err().unwrap();
        assert!(matches!(err, FilterError::Decode { .. }));
    }
}
