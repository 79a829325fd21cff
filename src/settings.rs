//! Settings persistence
//!
//! Handles saving and loading output, equalizer and mixing preferences,
//! plus the catalog of named sounds used by scenes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::audio::cutoff::{CutoffResponse, DEFAULT_MAX_CUTOFF_HZ, DEFAULT_MIN_CUTOFF_HZ};
use crate::audio::equalizer::BandLayout;
use crate::audio::soundscape::{MixConfig, SoundCatalog};

/// Equalizer band layout offered by the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BandLayoutKind {
    /// 60 Hz - 14 kHz, like most handset equalizers
    #[default]
    FiveBand,
    /// ISO octave bands, 31 Hz - 16 kHz
    TenBand,
}

impl BandLayoutKind {
    pub fn layout(self) -> BandLayout {
        match self {
            BandLayoutKind::FiveBand => BandLayout::five_band(),
            BandLayoutKind::TenBand => BandLayout::ten_band(),
        }
    }
}

impl std::fmt::Display for BandLayoutKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BandLayoutKind::FiveBand => write!(f, "5-band"),
            BandLayoutKind::TenBand => write!(f, "10-band"),
        }
    }
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub output: OutputSettings,
    #[serde(default)]
    pub equalizer: EqualizerSettings,
    #[serde(default)]
    pub mix: MixSettings,
    /// Named sounds for scenes and layers
    #[serde(default)]
    pub sounds: SoundCatalog,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Output device name (None = system default)
    #[serde(default)]
    pub device_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EqualizerSettings {
    #[serde(default)]
    pub layout: BandLayoutKind,
    #[serde(default)]
    pub response: CutoffResponse,
    /// Cutoff applied when a command does not name one
    #[serde(default = "default_cutoff_hz")]
    pub default_cutoff_hz: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixSettings {
    /// Master volume (0.0 to 1.0)
    #[serde(default = "default_master_volume")]
    pub master_volume: f32,
    /// Cutoff reached at warmth 1.0
    #[serde(default = "default_min_cutoff_hz")]
    pub min_cutoff_hz: f64,
    /// Cutoff reached at warmth 0.0
    #[serde(default = "default_max_cutoff_hz")]
    pub max_cutoff_hz: f64,
    #[serde(default = "default_oscillation_period_secs")]
    pub oscillation_period_secs: f32,
}

fn default_cutoff_hz() -> i32 {
    1000
}

fn default_master_volume() -> f32 {
    1.0
}

fn default_min_cutoff_hz() -> f64 {
    DEFAULT_MIN_CUTOFF_HZ
}

fn default_max_cutoff_hz() -> f64 {
    DEFAULT_MAX_CUTOFF_HZ
}

fn default_oscillation_period_secs() -> f32 {
    6.0
}

impl Default for EqualizerSettings {
    fn default() -> Self {
        Self {
            layout: BandLayoutKind::default(),
            response: CutoffResponse::default(),
            default_cutoff_hz: default_cutoff_hz(),
        }
    }
}

impl Default for MixSettings {
    fn default() -> Self {
        Self {
            master_volume: default_master_volume(),
            min_cutoff_hz: default_min_cutoff_hz(),
            max_cutoff_hz: default_max_cutoff_hz(),
            oscillation_period_secs: default_oscillation_period_secs(),
        }
    }
}

impl MixSettings {
    /// Oscillation cycle length; non-positive values fall back to the default
    pub fn oscillation_period(&self) -> Duration {
        let secs = if self.oscillation_period_secs.is_finite() && self.oscillation_period_secs > 0.0
        {
            self.oscillation_period_secs
        } else {
            default_oscillation_period_secs()
        };
        Duration::from_secs_f32(secs)
    }
}

impl Settings {
    /// Get the settings file path
    pub fn file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "soundscape", "Soundscape")
            .map(|dirs| dirs.config_dir().join("settings.json"))
    }

    /// Load settings from the default file, falling back to defaults
    pub fn load() -> Self {
        Self::file_path()
            .map(|path| Self::load_or_default(&path))
            .unwrap_or_default()
    }

    /// Load settings from `path`; a missing file gives defaults, an
    /// unreadable one gives defaults with a warning
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load_from_file(path) {
            Ok(settings) => settings,
            Err(SettingsError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No settings at {:?}, using defaults", path);
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Ignoring settings at {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Load settings from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save settings to the default file
    pub fn save(&self) -> Result<(), SettingsError> {
        let path = Self::file_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to_file(&path)
    }

    /// Save settings to a specific file
    pub fn save_to_file(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        tracing::debug!("Settings saved to {:?}", path);
        Ok(())
    }

    pub fn band_layout(&self) -> BandLayout {
        self.equalizer.layout.layout()
    }

    /// Mixing parameters for a `Soundscape`
    pub fn mix_config(&self) -> MixConfig {
        MixConfig {
            master_volume: self.mix.master_volume.clamp(0.0, 1.0),
            response: self.equalizer.response,
            min_cutoff_hz: self.mix.min_cutoff_hz,
            max_cutoff_hz: self.mix.max_cutoff_hz,
            oscillation_period: self.mix.oscillation_period(),
        }
    }
}

/// Settings error type
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Could not determine config directory")]
    NoConfigDir,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut settings = Settings::default();
        settings.output.device_name = Some("USB DAC".to_string());
        settings.equalizer.layout = BandLayoutKind::TenBand;
        settings.equalizer.response = CutoffResponse::Attenuate;
        settings.sounds.insert("rain", "/sounds/rain.ogg");

        settings.save_to_file(&path).unwrap();
        let loaded = Settings::load_from_file(&path).unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(loaded.band_layout().band_count(), 10);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{ "equalizer": { "response": "attenuate" }, "sounds": { "fire": "/s/fire.mp3" } }"#,
        )
        .unwrap();

        let settings = Settings::load_from_file(&path).unwrap();
        assert_eq!(settings.equalizer.layout, BandLayoutKind::FiveBand);
        assert_eq!(settings.equalizer.response, CutoffResponse::Attenuate);
        assert_eq!(settings.equalizer.default_cutoff_hz, 1000);
        assert_eq!(settings.mix, MixSettings::default());
        assert_eq!(
            settings.sounds.resolve("fire").unwrap(),
            Path::new("/s/fire.mp3")
        );
    }

    #[test]
    fn test_bad_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        assert!(matches!(
            Settings::load_from_file(&path),
            Err(SettingsError::Io(_))
        ));

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            Settings::load_from_file(&path),
            Err(SettingsError::Parse(_))
        ));
    }

    #[test]
    fn test_load_or_default_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        assert_eq!(Settings::load_or_default(&path), Settings::default());

        std::fs::write(&path, r#"{ "sounds": { "rain": 42 } }"#).unwrap();
        assert_eq!(Settings::load_or_default(&path), Settings::default());

        let mut settings = Settings::default();
        settings.sounds.insert("rain", "/sounds/rain.ogg");
        settings.save_to_file(&path).unwrap();
        assert_eq!(Settings::load_or_default(&path), settings);
    }

    #[test]
    fn test_mix_config_sanitizes_values() {
        let mut settings = Settings::default();
        settings.mix.master_volume = 3.0;
        settings.mix.oscillation_period_secs = -1.0;

        let config = settings.mix_config();
        assert_eq!(config.master_volume, 1.0);
        assert_eq!(config.oscillation_period, Duration::from_secs(6));
        assert_eq!(config.min_cutoff_hz, DEFAULT_MIN_CUTOFF_HZ);
    }
}
