//! Audio thread communication types
//!
//! - `AudioCommand` - Commands sent from callers to the audio thread
//! - `AudioEvent` - Outcomes sent back from the audio thread
//! - `SharedModuleState` - Thread-safe snapshot for non-blocking reads
//!
//! ## Architecture
//! ```text
//! Caller (AudioFilterModule) --[AudioCommand]--> Audio Thread (Soundscape)
//! Caller                     <--[AudioEvent]---- Audio Thread
//! Caller                     <--[SharedState]--- Audio Thread (non-blocking reads)
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;

use super::backend::SessionId;
use super::cutoff::CutoffResponse;
use super::equalizer::Millibels;
use super::soundscape::SceneState;

// ============ Commands (Caller -> Audio Thread) ============

/// Commands processed in order by the audio thread
#[derive(Debug, Clone)]
pub enum AudioCommand {
    /// Independent cutoff-filtered looping session
    FilterAndPlay {
        request_id: u64,
        path: PathBuf,
        cutoff_hz: i32,
    },
    /// Looping layer keyed by its path
    PlayUrl { path: PathBuf },
    /// Stop and release everything
    Stop,
    /// Per-layer volume (0.0 - 1.0)
    SetVolumeFor { key: String, volume: f32 },
    /// Per-layer oscillation depth (0.0 - 1.0)
    SetOscillationFor { key: String, depth: f32 },
    /// Master volume (0.0 - 1.0)
    SetMasterVolume { volume: f32 },
    /// Cutoff with the configured response
    SetCutoff { cutoff_hz: f64 },
    /// Cutoff with unity below and fixed attenuation above
    SetLowPassFrequency { cutoff_hz: f64 },
    /// Cutoff derived from layer warmth values
    SetWarmth { values: Vec<f32> },
    PlayScene { key: String },
    AddLayer { key: String },
    RemoveLayer { key: String },
    ResetAll,
    /// Release everything and exit the thread
    Shutdown,
}

// ============ Events (Audio Thread -> Caller) ============

#[derive(Debug, Clone, PartialEq)]
pub enum AudioEvent {
    /// A `FilterAndPlay` request started playing
    FilterApplied {
        request_id: u64,
        session_id: SessionId,
        path: PathBuf,
        levels: Vec<Millibels>,
    },
    /// A `FilterAndPlay` request failed; nothing was started
    FilterFailed {
        request_id: u64,
        path: PathBuf,
        error: String,
    },
    LayerStarted { key: String, session_id: SessionId },
    LayerRemoved { key: String },
    Stopped,
    CutoffChanged {
        cutoff_hz: f64,
        response: CutoffResponse,
    },
    SceneChanged(SceneState),
    /// A command failed
    Error { message: String },
}

// ============ Shared State ============

/// Snapshot of the module, refreshed after every command
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleSnapshot {
    pub scene: SceneState,
    pub layers: Vec<String>,
    pub cutoff_hz: Option<f64>,
    pub active_sessions: usize,
    pub master_volume: f32,
    pub playing: bool,
}

/// Thread-safe shared module state
///
/// Callers read this without blocking; the audio thread updates it.
#[derive(Clone, Default)]
pub struct SharedModuleState {
    inner: Arc<RwLock<ModuleSnapshot>>,
}

impl std::fmt::Debug for SharedModuleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("SharedModuleState")
            .field("layers", &inner.layers)
            .field("cutoff_hz", &inner.cutoff_hz)
            .field("active_sessions", &inner.active_sessions)
            .finish()
    }
}

impl SharedModuleState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ModuleSnapshot {
        self.inner.read().clone()
    }

    pub fn is_playing(&self) -> bool {
        self.inner.read().playing
    }

    pub fn cutoff_hz(&self) -> Option<f64> {
        self.inner.read().cutoff_hz
    }

    /// Replace the snapshot (called by the audio thread)
    pub fn store(&self, snapshot: ModuleSnapshot) {
        *self.inner.write() = snapshot;
    }
}

// ============ Channel Types ============

/// Sender for audio commands (held by AudioFilterModule)
pub type AudioCommandSender = tokio::sync::mpsc::UnboundedSender<AudioCommand>;

/// Receiver for audio commands (held by audio thread)
pub type AudioCommandReceiver = tokio::sync::mpsc::UnboundedReceiver<AudioCommand>;

/// Sender for audio events (held by audio thread)
pub type AudioEventSender = tokio::sync::mpsc::UnboundedSender<AudioEvent>;

/// Receiver for audio events
pub type AudioEventReceiver = tokio::sync::mpsc::UnboundedReceiver<AudioEvent>;

pub fn audio_command_channel() -> (AudioCommandSender, AudioCommandReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

pub fn audio_event_channel() -> (AudioEventSender, AudioEventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}
