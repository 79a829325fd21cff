//! Error types for playback and equalizer control

use std::path::PathBuf;

use thiserror::Error;

/// Result type for soundscape operations
pub type Result<T> = std::result::Result<T, FilterError>;

/// Failures surfaced by backends, the cutoff filter and the audio thread
#[derive(Error, Debug)]
pub enum FilterError {
    /// The media source could not be opened or read
    #[error("failed to open {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The media source was readable but not decodable
    #[error("failed to decode {path:?}: {reason}")]
    Decode { path: PathBuf, reason: String },

    /// Output stream could not be created or used
    #[error("audio output error: {0}")]
    Output(String),

    /// Named output device does not exist
    #[error("output device not found: {0}")]
    DeviceNotFound(String),

    /// No equalizer could be bound to the session
    #[error("equalizer unavailable: {0}")]
    EqualizerUnavailable(String),

    /// Band index outside the equalizer's band set
    #[error("band {band} out of range (equalizer has {count} bands)")]
    InvalidBand { band: u16, count: u16 },

    /// Level outside the device's valid range
    #[error("level {level} mB outside [{min}, {max}]")]
    LevelOutOfRange { level: i16, min: i16, max: i16 },

    /// Catalog lookup failed
    #[error("no sound registered for key {0:?}")]
    UnknownSound(String),

    /// The audio thread is gone or could not be spawned
    #[error("audio thread error: {0}")]
    AudioThread(String),
}

impl FilterError {
    /// True for failures that happen while preparing the media source
    pub fn is_prepare_failure(&self) -> bool {
        matches!(self, Self::Open { .. } | Self::Decode { .. })
    }
}
