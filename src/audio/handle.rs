//! Non-blocking module handle
//!
//! `AudioFilterModule` is the caller-facing surface. Every method sends a
//! command to the audio thread and returns immediately; outcomes arrive as
//! `AudioEvent`s and the latest state can be read from `SharedModuleState`
//! without blocking.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use super::events::{AudioCommand, AudioCommandSender, ModuleSnapshot, SharedModuleState};

/// Counter for generating unique filter request IDs
static FILTER_REQUEST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Handle for controlling the audio thread
#[derive(Clone)]
pub struct AudioFilterModule {
    command_tx: AudioCommandSender,
    state: SharedModuleState,
}

impl std::fmt::Debug for AudioFilterModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioFilterModule")
            .field("state", &self.state)
            .finish()
    }
}

impl AudioFilterModule {
    pub fn new(command_tx: AudioCommandSender, state: SharedModuleState) -> Self {
        Self { command_tx, state }
    }

    fn send(&self, command: AudioCommand) {
        if self.command_tx.send(command).is_err() {
            tracing::warn!("Audio thread is gone; command dropped");
        }
    }

    // ============ Filtered playback ============

    /// Loop `path` with bands above `cutoff_hz` silenced
    ///
    /// Returns a request ID. Listen for `AudioEvent::FilterApplied` or
    /// `AudioEvent::FilterFailed` with the same request_id.
    pub fn filter_and_play(&self, path: impl Into<PathBuf>, cutoff_hz: i32) -> u64 {
        let request_id = FILTER_REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.send(AudioCommand::FilterAndPlay {
            request_id,
            path: path.into(),
            cutoff_hz,
        });
        request_id
    }

    // ============ Layers ============

    /// Start a looping layer keyed by its path
    pub fn play_url(&self, path: impl Into<PathBuf>) {
        self.send(AudioCommand::PlayUrl { path: path.into() });
    }

    /// Stop and release every layer and filtered session
    pub fn stop(&self) {
        self.send(AudioCommand::Stop);
    }

    pub fn set_volume_for(&self, key: impl Into<String>, volume: f32) {
        self.send(AudioCommand::SetVolumeFor {
            key: key.into(),
            volume,
        });
    }

    pub fn set_oscillation_for(&self, key: impl Into<String>, depth: f32) {
        self.send(AudioCommand::SetOscillationFor {
            key: key.into(),
            depth,
        });
    }

    pub fn set_master_volume(&self, volume: f32) {
        self.send(AudioCommand::SetMasterVolume { volume });
    }

    // ============ Cutoff ============

    pub fn set_cutoff(&self, cutoff_hz: f64) {
        self.send(AudioCommand::SetCutoff { cutoff_hz });
    }

    /// Unity below the cutoff, fixed attenuation above it
    pub fn set_low_pass_frequency(&self, cutoff_hz: f64) {
        self.send(AudioCommand::SetLowPassFrequency { cutoff_hz });
    }

    pub fn set_warmth(&self, values: Vec<f32>) {
        self.send(AudioCommand::SetWarmth { values });
    }

    // ============ Scenes ============

    pub fn play_scene(&self, key: impl Into<String>) {
        self.send(AudioCommand::PlayScene { key: key.into() });
    }

    pub fn add_layer(&self, key: impl Into<String>) {
        self.send(AudioCommand::AddLayer { key: key.into() });
    }

    pub fn remove_layer(&self, key: impl Into<String>) {
        self.send(AudioCommand::RemoveLayer { key: key.into() });
    }

    pub fn reset_all(&self) {
        self.send(AudioCommand::ResetAll);
    }

    /// Ask the audio thread to release everything and exit
    pub fn shutdown(&self) {
        self.send(AudioCommand::Shutdown);
    }

    // ============ State Queries (non-blocking reads) ============

    pub fn state(&self) -> ModuleSnapshot {
        self.state.snapshot()
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    pub fn cutoff_hz(&self) -> Option<f64> {
        self.state.cutoff_hz()
    }
}
