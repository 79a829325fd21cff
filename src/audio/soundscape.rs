//! Layered ambient mixing
//!
//! A soundscape is a set of looping layers, each a playback session with its
//! own equalizer and gain. One cutoff applies to every layer and to layers
//! added later. On top of the raw layers sits a scene model: one scene sound
//! plus extra layers, all resolved by key through a [`SoundCatalog`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::backend::{MediaBackend, PlaybackSession, SessionId};
use super::cutoff::{
    CutoffResponse, DEFAULT_MAX_CUTOFF_HZ, DEFAULT_MIN_CUTOFF_HZ, apply_cutoff, average_warmth,
    soften_to_cutoff,
};
use super::fade::DEFAULT_OSCILLATION_PERIOD;
use super::filter_play::{FilteredPlayback, filter_and_play};
use crate::error::{FilterError, Result};

/// Sound key -> media path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SoundCatalog {
    sounds: BTreeMap<String, PathBuf>,
}

impl SoundCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, path: impl Into<PathBuf>) {
        self.sounds.insert(key.into(), path.into());
    }

    pub fn resolve(&self, key: &str) -> Result<&Path> {
        self.sounds
            .get(key)
            .map(PathBuf::as_path)
            .ok_or_else(|| FilterError::UnknownSound(key.to_string()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.sounds.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }
}

impl FromIterator<(String, PathBuf)> for SoundCatalog {
    fn from_iter<T: IntoIterator<Item = (String, PathBuf)>>(iter: T) -> Self {
        Self {
            sounds: iter.into_iter().collect(),
        }
    }
}

/// Current scene and the layers stacked on it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneState {
    pub scene: Option<String>,
    pub layers: Vec<String>,
}

/// Mixing limits and defaults
#[derive(Debug, Clone, PartialEq)]
pub struct MixConfig {
    pub master_volume: f32,
    pub response: CutoffResponse,
    pub min_cutoff_hz: f64,
    pub max_cutoff_hz: f64,
    pub oscillation_period: Duration,
}

impl Default for MixConfig {
    fn default() -> Self {
        Self {
            master_volume: 1.0,
            response: CutoffResponse::FullRange,
            min_cutoff_hz: DEFAULT_MIN_CUTOFF_HZ,
            max_cutoff_hz: DEFAULT_MAX_CUTOFF_HZ,
            oscillation_period: DEFAULT_OSCILLATION_PERIOD,
        }
    }
}

struct Layer<S: PlaybackSession> {
    key: String,
    path: PathBuf,
    session: S,
    equalizer: Option<S::Equalizer>,
    volume: f32,
}

/// Looping layers over one backend
pub struct Soundscape<B: MediaBackend> {
    backend: B,
    catalog: SoundCatalog,
    config: MixConfig,
    layers: Vec<Layer<B::Session>>,
    /// Sessions started by `filter_and_play`, kept until `stop_all`
    filtered: Vec<FilteredPlayback<B::Session>>,
    cutoff_hz: Option<f64>,
    scene: Option<String>,
    scene_layers: Vec<String>,
}

impl<B: MediaBackend> Soundscape<B> {
    pub fn new(backend: B, catalog: SoundCatalog, config: MixConfig) -> Self {
        Self {
            backend,
            catalog,
            config,
            layers: Vec::new(),
            filtered: Vec::new(),
            cutoff_hz: None,
            scene: None,
            scene_layers: Vec::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn catalog(&self) -> &SoundCatalog {
        &self.catalog
    }

    pub fn cutoff_hz(&self) -> Option<f64> {
        self.cutoff_hz
    }

    pub fn master_volume(&self) -> f32 {
        self.config.master_volume
    }

    pub fn response(&self) -> CutoffResponse {
        self.config.response
    }

    /// Keys of all playing layers, in the order they were added
    pub fn layer_keys(&self) -> Vec<String> {
        self.layers.iter().map(|l| l.key.clone()).collect()
    }

    pub fn layer_path(&self, key: &str) -> Option<&Path> {
        self.find(key).map(|l| l.path.as_path())
    }

    /// Live sessions: layers plus standalone filtered sessions
    pub fn active_sessions(&self) -> usize {
        self.layers.len() + self.filtered.len()
    }

    pub fn is_playing(&self) -> bool {
        self.layers.iter().any(|l| l.session.is_playing())
            || self.filtered.iter().any(|f| f.is_playing())
    }

    fn find(&self, key: &str) -> Option<&Layer<B::Session>> {
        self.layers.iter().find(|l| l.key == key)
    }

    fn find_mut(&mut self, key: &str) -> Option<&mut Layer<B::Session>> {
        self.layers.iter_mut().find(|l| l.key == key)
    }

    // ============ Standalone filtered playback ============

    /// Start an independent filtered session; it lives until `stop_all`
    pub fn filter_and_play(&mut self, path: &Path, cutoff_hz: i32) -> Result<(SessionId, Vec<i16>)> {
        let playback = filter_and_play(&self.backend, path, cutoff_hz)?;
        let result = (playback.session_id(), playback.levels().to_vec());
        self.filtered.push(playback);
        Ok(result)
    }

    // ============ Layers ============

    /// Start a looping layer; an existing layer with the same key is replaced
    pub fn play_layer(&mut self, key: &str, path: &Path) -> Result<SessionId> {
        let mut session = self.backend.prepare(path, true)?;
        let id = session.session_id();

        let equalizer = match session.attach_equalizer() {
            Ok(mut eq) => {
                if let Some(cutoff) = self.cutoff_hz {
                    apply_cutoff(&mut eq, cutoff, self.config.response)?;
                }
                Some(eq)
            }
            Err(e) => {
                tracing::warn!("Layer {:?} plays unfiltered: {}", key, e);
                None
            }
        };

        session.set_volume(self.config.master_volume);
        session.start()?;

        let layer = Layer {
            key: key.to_string(),
            path: path.to_path_buf(),
            session,
            equalizer,
            volume: 1.0,
        };

        if let Some(existing) = self.find_mut(key) {
            tracing::debug!("Replacing layer {:?}", key);
            *existing = layer;
        } else {
            self.layers.push(layer);
        }

        tracing::info!("Layer {:?} playing as {}", key, id);
        Ok(id)
    }

    /// Stop and release one layer, returns whether it existed
    pub fn remove_layer(&mut self, key: &str) -> bool {
        let before = self.layers.len();
        self.layers.retain(|l| l.key != key);
        let removed = self.layers.len() != before;
        if removed {
            tracing::info!("Layer {:?} removed", key);
        }
        removed
    }

    /// Stop and release every layer and filtered session
    pub fn stop_all(&mut self) {
        let count = self.active_sessions();
        self.layers.clear();
        self.filtered.clear();
        self.scene = None;
        self.scene_layers.clear();
        if count > 0 {
            tracing::info!("Stopped {} sessions", count);
        }
    }

    /// Per-layer volume (0.0 - 1.0), scaled by the master volume
    pub fn set_layer_volume(&mut self, key: &str, volume: f32) -> Result<()> {
        let master = self.config.master_volume;
        let layer = self
            .find_mut(key)
            .ok_or_else(|| FilterError::UnknownSound(key.to_string()))?;
        layer.volume = volume.clamp(0.0, 1.0);
        layer.session.set_volume(master * layer.volume);
        Ok(())
    }

    pub fn layer_volume(&self, key: &str) -> Option<f32> {
        self.find(key).map(|l| l.volume)
    }

    /// Volume oscillation depth (0.0 - 1.0) for one layer
    pub fn set_layer_oscillation(&mut self, key: &str, depth: f32) -> Result<()> {
        let period = self.config.oscillation_period;
        let layer = self
            .find_mut(key)
            .ok_or_else(|| FilterError::UnknownSound(key.to_string()))?;
        layer.session.set_oscillation(depth, period);
        Ok(())
    }

    pub fn set_master_volume(&mut self, volume: f32) {
        let master = volume.clamp(0.0, 1.0);
        self.config.master_volume = master;
        for layer in &mut self.layers {
            layer.session.set_volume(master * layer.volume);
        }
    }

    // ============ Cutoff ============

    /// Apply a cutoff to every layer using the configured response
    pub fn set_cutoff(&mut self, cutoff_hz: f64) -> Result<()> {
        let response = self.config.response;
        self.set_cutoff_with(cutoff_hz, response)
    }

    /// Apply a cutoff to every layer with an explicit response
    ///
    /// The response becomes the default for later layers.
    pub fn set_cutoff_with(&mut self, cutoff_hz: f64, response: CutoffResponse) -> Result<()> {
        self.cutoff_hz = Some(cutoff_hz);
        self.config.response = response;
        for layer in &mut self.layers {
            if let Some(eq) = layer.equalizer.as_mut() {
                apply_cutoff(eq, cutoff_hz, response)?;
            }
        }
        tracing::info!("Cutoff {} Hz ({}) on {} layers", cutoff_hz, response, self.layers.len());
        Ok(())
    }

    /// Derive the cutoff from layer warmth values; empty input changes nothing
    pub fn set_warmth(&mut self, warmth: &[f32]) -> Result<Option<f64>> {
        let Some(avg) = average_warmth(warmth) else {
            return Ok(None);
        };
        let cutoff = soften_to_cutoff(avg, self.config.min_cutoff_hz, self.config.max_cutoff_hz);
        self.set_cutoff(cutoff)?;
        Ok(Some(cutoff))
    }

    // ============ Scenes ============

    /// Replace the current scene (and its layers) with `key`
    pub fn play_scene(&mut self, key: &str) -> Result<SessionId> {
        let path = self.catalog.resolve(key)?.to_path_buf();

        if let Some(old) = self.scene.take() {
            self.remove_layer(&old);
        }
        for layer in std::mem::take(&mut self.scene_layers) {
            self.remove_layer(&layer);
        }

        let id = self.play_layer(key, &path)?;
        self.scene = Some(key.to_string());
        Ok(id)
    }

    /// Stack a catalog sound on the scene; no-op when already present
    /// as a layer or as the scene itself
    pub fn add_layer(&mut self, key: &str) -> Result<()> {
        if self.scene.as_deref() == Some(key) || self.scene_layers.iter().any(|k| k == key) {
            return Ok(());
        }
        let path = self.catalog.resolve(key)?.to_path_buf();
        self.play_layer(key, &path)?;
        self.scene_layers.push(key.to_string());
        Ok(())
    }

    /// Remove a stacked scene layer; no-op when absent
    pub fn remove_scene_layer(&mut self, key: &str) {
        if let Some(pos) = self.scene_layers.iter().position(|k| k == key) {
            self.scene_layers.remove(pos);
            self.remove_layer(key);
        }
    }

    pub fn scene_state(&self) -> SceneState {
        SceneState {
            scene: self.scene.clone(),
            layers: self.scene_layers.clone(),
        }
    }

    /// Stop the scene and all of its layers
    pub fn reset_all(&mut self) {
        if let Some(scene) = self.scene.take() {
            self.remove_layer(&scene);
        }
        for layer in std::mem::take(&mut self.scene_layers) {
            self.remove_layer(&layer);
        }
    }
}
