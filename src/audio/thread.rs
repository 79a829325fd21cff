//! Audio thread implementation
//!
//! Runs a `Soundscape` in a dedicated thread, processing commands from
//! `AudioFilterModule` handles and sending events back. Preparing a media
//! source blocks, but only this thread.

use std::path::Path;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::backend::MediaBackend;
use super::cutoff::CutoffResponse;
use super::events::{
    AudioCommand, AudioCommandReceiver, AudioEvent, AudioEventReceiver, AudioEventSender,
    ModuleSnapshot, SharedModuleState, audio_command_channel, audio_event_channel,
};
use super::handle::AudioFilterModule;
use super::soundscape::{MixConfig, SoundCatalog, Soundscape};
use crate::error::{FilterError, Result};

pub struct AudioThreadHandle {
    pub handle: AudioFilterModule,
    pub event_rx: Option<AudioEventReceiver>,
    thread_handle: Option<JoinHandle<()>>,
}

impl AudioThreadHandle {
    pub fn take_event_rx(&mut self) -> Option<AudioEventReceiver> {
        self.event_rx.take()
    }

    /// Shut the thread down and wait up to `timeout` for it to exit
    pub fn join(mut self, timeout: Duration) -> Result<()> {
        if let Some(handle) = self.thread_handle.take() {
            self.handle.shutdown();

            let start = std::time::Instant::now();
            loop {
                if handle.is_finished() {
                    return handle.join().map_err(|_| {
                        tracing::error!("Audio thread panicked");
                        FilterError::AudioThread("audio thread panicked".to_string())
                    });
                }
                if start.elapsed() > timeout {
                    return Err(FilterError::AudioThread(
                        "audio thread did not exit in time".to_string(),
                    ));
                }
                thread::sleep(Duration::from_millis(10));
            }
        }
        Ok(())
    }
}

impl Drop for AudioThreadHandle {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            self.handle.shutdown();
        }
    }
}

/// Spawn the audio thread
///
/// The backend is created inside the thread by `make_backend`, so output
/// streams that must stay on one thread never cross threads.
pub fn spawn_audio_thread<B, F>(
    make_backend: F,
    catalog: SoundCatalog,
    config: MixConfig,
) -> Result<AudioThreadHandle>
where
    B: MediaBackend + 'static,
    F: FnOnce() -> Result<B> + Send + 'static,
{
    let (command_tx, command_rx) = audio_command_channel();
    let (event_tx, event_rx) = audio_event_channel();

    let state = SharedModuleState::new();
    let state_clone = state.clone();
    let handle = AudioFilterModule::new(command_tx, state);

    let thread_handle = thread::Builder::new()
        .name("audio-filter".to_string())
        .spawn(move || match make_backend() {
            Ok(backend) => {
                let engine = Soundscape::new(backend, catalog, config);
                audio_thread_main(engine, command_rx, event_tx, state_clone);
            }
            Err(e) => {
                tracing::error!("Failed to create audio backend: {}", e);
                let _ = event_tx.send(AudioEvent::Error {
                    message: e.to_string(),
                });
            }
        })
        .map_err(|e| FilterError::AudioThread(format!("failed to spawn audio thread: {e}")))?;

    Ok(AudioThreadHandle {
        handle,
        event_rx: Some(event_rx),
        thread_handle: Some(thread_handle),
    })
}

/// Main loop for the audio thread
fn audio_thread_main<B: MediaBackend>(
    mut engine: Soundscape<B>,
    mut command_rx: AudioCommandReceiver,
    event_tx: AudioEventSender,
    state: SharedModuleState,
) {
    tracing::info!("Audio thread started");
    publish(&engine, &state);

    while let Some(cmd) = command_rx.blocking_recv() {
        tracing::debug!("Audio command: {:?}", cmd);
        let shutdown = matches!(cmd, AudioCommand::Shutdown);

        let events = handle_command(&mut engine, cmd);

        // State first, so receivers of an event see matching state
        publish(&engine, &state);
        for event in events {
            let _ = event_tx.send(event);
        }

        if shutdown {
            break;
        }
    }

    engine.stop_all();
    publish(&engine, &state);
    tracing::info!("Audio thread exiting");
}

// ============ Command Handlers ============

fn handle_command<B: MediaBackend>(engine: &mut Soundscape<B>, cmd: AudioCommand) -> Vec<AudioEvent> {
    match cmd {
        AudioCommand::FilterAndPlay {
            request_id,
            path,
            cutoff_hz,
        } => match engine.filter_and_play(&path, cutoff_hz) {
            Ok((session_id, levels)) => vec![AudioEvent::FilterApplied {
                request_id,
                session_id,
                path,
                levels,
            }],
            Err(e) => {
                tracing::warn!("filter_and_play request {} failed: {}", request_id, e);
                vec![AudioEvent::FilterFailed {
                    request_id,
                    path,
                    error: e.to_string(),
                }]
            }
        },

        AudioCommand::PlayUrl { path } => {
            let key = path_key(&path);
            match engine.play_layer(&key, &path) {
                Ok(session_id) => vec![AudioEvent::LayerStarted { key, session_id }],
                Err(e) => vec![error_event(e)],
            }
        }

        AudioCommand::Stop | AudioCommand::Shutdown => {
            engine.stop_all();
            vec![AudioEvent::Stopped]
        }

        AudioCommand::SetVolumeFor { key, volume } => {
            result_events(engine.set_layer_volume(&key, volume), Vec::new())
        }

        AudioCommand::SetOscillationFor { key, depth } => {
            result_events(engine.set_layer_oscillation(&key, depth), Vec::new())
        }

        AudioCommand::SetMasterVolume { volume } => {
            engine.set_master_volume(volume);
            Vec::new()
        }

        AudioCommand::SetCutoff { cutoff_hz } => {
            let result = engine.set_cutoff(cutoff_hz);
            cutoff_events(engine, result)
        }

        AudioCommand::SetLowPassFrequency { cutoff_hz } => {
            let result = engine.set_cutoff_with(cutoff_hz, CutoffResponse::Attenuate);
            cutoff_events(engine, result)
        }

        AudioCommand::SetWarmth { values } => match engine.set_warmth(&values) {
            Ok(Some(_)) => cutoff_events(engine, Ok(())),
            Ok(None) => Vec::new(),
            Err(e) => vec![error_event(e)],
        },

        AudioCommand::PlayScene { key } => {
            let result = engine.play_scene(&key).map(|_| ());
            result_events(result, vec![AudioEvent::SceneChanged(engine.scene_state())])
        }

        AudioCommand::AddLayer { key } => {
            let result = engine.add_layer(&key);
            result_events(result, vec![AudioEvent::SceneChanged(engine.scene_state())])
        }

        AudioCommand::RemoveLayer { key } => {
            engine.remove_scene_layer(&key);
            vec![
                AudioEvent::LayerRemoved { key },
                AudioEvent::SceneChanged(engine.scene_state()),
            ]
        }

        AudioCommand::ResetAll => {
            engine.reset_all();
            vec![AudioEvent::SceneChanged(engine.scene_state())]
        }
    }
}

// ============ Helpers ============

/// Layers started from a path are keyed by the path itself
fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn error_event(e: FilterError) -> AudioEvent {
    tracing::warn!("Audio command failed: {}", e);
    AudioEvent::Error {
        message: e.to_string(),
    }
}

fn result_events(result: Result<()>, on_success: Vec<AudioEvent>) -> Vec<AudioEvent> {
    match result {
        Ok(()) => on_success,
        Err(e) => vec![error_event(e)],
    }
}

fn cutoff_events<B: MediaBackend>(engine: &Soundscape<B>, result: Result<()>) -> Vec<AudioEvent> {
    let changed = engine
        .cutoff_hz()
        .map(|cutoff_hz| AudioEvent::CutoffChanged {
            cutoff_hz,
            response: engine.response(),
        });
    result_events(result, changed.into_iter().collect())
}

fn publish<B: MediaBackend>(engine: &Soundscape<B>, state: &SharedModuleState) {
    state.store(ModuleSnapshot {
        scene: engine.scene_state(),
        layers: engine.layer_keys(),
        cutoff_hz: engine.cutoff_hz(),
        active_sessions: engine.active_sessions(),
        master_volume: engine.master_volume(),
        playing: engine.is_playing(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::equalizer::BandLayout;
    use crate::audio::filter_play::filter_and_play;
    use crate::audio::test_support::write_tone;
    use crate::audio::virtual_device::VirtualBackend;

    fn spawn_virtual(catalog: SoundCatalog) -> (AudioThreadHandle, AudioEventReceiver) {
        let mut thread = spawn_audio_thread(
            || Ok(VirtualBackend::new(BandLayout::five_band())),
            catalog,
            MixConfig::default(),
        )
        .unwrap();
        let rx = thread.take_event_rx().unwrap();
        (thread, rx)
    }

    #[test]
    fn test_module_matches_direct_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tone(dir.path(), "rain.wav", 440.0, 0.05);

        let direct = filter_and_play(&VirtualBackend::new(BandLayout::five_band()), &path, 1000)
            .unwrap()
            .levels()
            .to_vec();

        let (thread, mut rx) = spawn_virtual(SoundCatalog::new());
        let request = thread.handle.filter_and_play(&path, 1000);

        match rx.blocking_recv().unwrap() {
            AudioEvent::FilterApplied {
                request_id, levels, ..
            } => {
                assert_eq!(request_id, request);
                assert_eq!(levels, direct);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(thread.handle.is_playing());
        assert_eq!(thread.handle.state().active_sessions, 1);
        thread.join(Duration::from_secs(2)).unwrap();
    }

    #[test]
    fn test_failed_request_is_reported() {
        let (thread, mut rx) = spawn_virtual(SoundCatalog::new());
        let request = thread.handle.filter_and_play("/missing/ocean.wav", 1000);

        match rx.blocking_recv().unwrap() {
            AudioEvent::FilterFailed { request_id, .. } => assert_eq!(request_id, request),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(!thread.handle.is_playing());
        assert_eq!(thread.handle.state().active_sessions, 0);
    }

    #[test]
    fn test_layers_cutoff_and_stop() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tone(dir.path(), "fire.wav", 440.0, 0.05);
        let (thread, mut rx) = spawn_virtual(SoundCatalog::new());

        thread.handle.play_url(&path);
        assert!(matches!(
            rx.blocking_recv().unwrap(),
            AudioEvent::LayerStarted { .. }
        ));

        thread.handle.set_low_pass_frequency(800.0);
        assert_eq!(
            rx.blocking_recv().unwrap(),
            AudioEvent::CutoffChanged {
                cutoff_hz: 800.0,
                response: CutoffResponse::Attenuate,
            }
        );
        assert_eq!(thread.handle.cutoff_hz(), Some(800.0));

        thread.handle.stop();
        assert_eq!(rx.blocking_recv().unwrap(), AudioEvent::Stopped);
        assert!(thread.handle.state().layers.is_empty());
    }

    #[test]
    fn test_scene_commands() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = SoundCatalog::new();
        catalog.insert("rain", write_tone(dir.path(), "rain.wav", 300.0, 0.05));
        catalog.insert("birds", write_tone(dir.path(), "birds.wav", 3000.0, 0.05));
        let (thread, mut rx) = spawn_virtual(catalog);

        thread.handle.play_scene("rain");
        thread.handle.add_layer("birds");
        let _ = rx.blocking_recv().unwrap();
        match rx.blocking_recv().unwrap() {
            AudioEvent::SceneChanged(scene) => {
                assert_eq!(scene.scene.as_deref(), Some("rain"));
                assert_eq!(scene.layers, vec!["birds".to_string()]);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        thread.handle.play_scene("thunder");
        assert!(matches!(
            rx.blocking_recv().unwrap(),
            AudioEvent::Error { .. }
        ));
    }

    #[test]
    fn test_join_reports_thread_panic() {
        let thread = spawn_audio_thread(
            || -> Result<VirtualBackend> { panic!("backend construction blew up") },
            SoundCatalog::new(),
            MixConfig::default(),
        )
        .unwrap();

        assert!(matches!(
            thread.join(Duration::from_secs(2)),
            Err(FilterError::AudioThread(_))
        ));
    }

    #[test]
    fn test_clean_exit_joins_ok() {
        let (thread, _rx) = spawn_virtual(SoundCatalog::new());
        assert!(thread.join(Duration::from_secs(2)).is_ok());
    }

    #[test]
    fn test_backend_failure_is_reported() {
        let mut thread = spawn_audio_thread(
            || -> Result<VirtualBackend> { Err(FilterError::Output("no device".into())) },
            SoundCatalog::new(),
            MixConfig::default(),
        )
        .unwrap();
        let mut rx = thread.take_event_rx().unwrap();
        assert!(matches!(
            rx.blocking_recv().unwrap(),
            AudioEvent::Error { .. }
        ));
    }
}
