//! Host media capabilities
//!
//! Playback and equalization are reached only through these traits, so the
//! cutoff logic runs unchanged against a real output device or a headless
//! virtual one.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use super::equalizer::Millibels;
use crate::error::Result;

/// Counter for generating unique session ids across backends
static SESSION_COUNTER: AtomicU32 = AtomicU32::new(1);

/// Opaque playback session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u32);

impl SessionId {
    /// Allocate a fresh id
    pub fn next() -> Self {
        Self(SESSION_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

/// Opens media sources into playback sessions
pub trait MediaBackend {
    type Session: PlaybackSession;

    /// Open and decode `source`, returning a session that is ready but not started
    ///
    /// Blocks for as long as opening the source takes.
    fn prepare(&self, source: &Path, looping: bool) -> Result<Self::Session>;
}

/// A prepared media source bound to one output
///
/// Dropping a session stops it and releases its output resources.
pub trait PlaybackSession {
    type Equalizer: BandEqualizer;

    fn session_id(&self) -> SessionId;

    /// Bind an equalizer to this session's output
    ///
    /// Repeated calls return handles to the same equalizer.
    fn attach_equalizer(&mut self) -> Result<Self::Equalizer>;

    /// Start (or resume) playback
    fn start(&mut self) -> Result<()>;

    /// Set linear gain, 0.0 - 1.0
    fn set_volume(&mut self, volume: f32);

    /// Set volume oscillation depth (0.0 - 1.0, 0 disables) and cycle length
    fn set_oscillation(&mut self, depth: f32, period: Duration);

    fn is_playing(&self) -> bool;

    fn is_looping(&self) -> bool;

    /// Keep the sound running after this handle is gone
    fn detach(self);
}

/// Device equalizer bound to a session
pub trait BandEqualizer {
    fn set_enabled(&mut self, enabled: bool) -> Result<()>;

    fn is_enabled(&self) -> bool;

    fn band_count(&self) -> u16;

    /// Center frequency of `band` in millihertz
    fn center_freq(&self, band: u16) -> Result<u32>;

    /// Valid level range exactly as the device reports it
    ///
    /// The ordering of the pair is device defined; normalize it with
    /// [`LevelRange::from_platform`](super::equalizer::LevelRange::from_platform).
    fn band_level_range(&self) -> [Millibels; 2];

    fn set_band_level(&mut self, band: u16, level: Millibels) -> Result<()>;

    fn band_level(&self, band: u16) -> Result<Millibels>;
}
