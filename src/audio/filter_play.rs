//! Cutoff-filtered looping playback
//!
//! `filter_and_play` prepares a looping session for a file, binds an
//! equalizer to it, sets each band to silence or full volume around the
//! cutoff and only then starts playback.

use std::path::Path;

use super::backend::{BandEqualizer, MediaBackend, PlaybackSession, SessionId};
use super::cutoff::{CutoffResponse, apply_cutoff};
use super::equalizer::Millibels;
use crate::error::Result;

/// A started, filtered session
///
/// Dropping it stops playback and releases the session. Call
/// [`FilteredPlayback::detach`] to leave the sound looping instead.
pub struct FilteredPlayback<S: PlaybackSession> {
    session: S,
    equalizer: S::Equalizer,
    cutoff_hz: f64,
    response: CutoffResponse,
    levels: Vec<Millibels>,
}

impl<S: PlaybackSession> std::fmt::Debug for FilteredPlayback<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilteredPlayback")
            .field("session", &self.session.session_id())
            .field("cutoff_hz", &self.cutoff_hz)
            .field("response", &self.response)
            .field("levels", &self.levels)
            .finish()
    }
}

impl<S: PlaybackSession> FilteredPlayback<S> {
    pub fn session_id(&self) -> SessionId {
        self.session.session_id()
    }

    pub fn cutoff_hz(&self) -> f64 {
        self.cutoff_hz
    }

    pub fn response(&self) -> CutoffResponse {
        self.response
    }

    /// Levels applied to each band, in band order
    pub fn levels(&self) -> &[Millibels] {
        &self.levels
    }

    pub fn is_playing(&self) -> bool {
        self.session.is_playing()
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    pub fn equalizer(&self) -> &S::Equalizer {
        &self.equalizer
    }

    /// Move the cutoff while playing
    pub fn set_cutoff(&mut self, cutoff_hz: f64, response: CutoffResponse) -> Result<()> {
        self.levels = apply_cutoff(&mut self.equalizer, cutoff_hz, response)?;
        self.cutoff_hz = cutoff_hz;
        self.response = response;
        Ok(())
    }

    /// Give up ownership and keep the sound looping until process exit
    pub fn detach(self) {
        tracing::warn!(
            "Detaching {}; it keeps looping with no way to stop it",
            self.session.session_id()
        );
        self.session.detach();
    }
}

/// Play `path` looped, with bands above `cutoff_hz` silenced and the rest at full volume
pub fn filter_and_play<B: MediaBackend>(
    backend: &B,
    path: &Path,
    cutoff_hz: i32,
) -> Result<FilteredPlayback<B::Session>> {
    filter_and_play_with(backend, path, f64::from(cutoff_hz), CutoffResponse::FullRange)
}

/// Like [`filter_and_play`] with an explicit cutoff response
pub fn filter_and_play_with<B: MediaBackend>(
    backend: &B,
    path: &Path,
    cutoff_hz: f64,
    response: CutoffResponse,
) -> Result<FilteredPlayback<B::Session>> {
    let mut session = backend.prepare(path, true).inspect_err(|e| {
        tracing::error!("Failed to prepare {:?}: {}", path, e);
    })?;

    let id = session.session_id();
    let mut equalizer = session.attach_equalizer().inspect_err(|e| {
        tracing::error!("Failed to attach equalizer to {}: {}", id, e);
    })?;

    let levels = apply_cutoff(&mut equalizer, cutoff_hz, response)?;
    tracing::info!(
        "{}: {} bands set for cutoff {} Hz ({})",
        id,
        equalizer.band_count(),
        cutoff_hz,
        response
    );

    session.start()?;

    Ok(FilteredPlayback {
        session,
        equalizer,
        cutoff_hz,
        response,
        levels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::equalizer::BandLayout;
    use crate::audio::test_support::write_tone;
    use crate::audio::virtual_device::VirtualBackend;
    use crate::error::FilterError;

    #[test]
    fn test_bands_split_at_cutoff() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tone(dir.path(), "rain.wav", 440.0, 0.2);
        let backend = VirtualBackend::new(BandLayout::five_band());

        let playback = filter_and_play(&backend, &path, 1000).unwrap();

        // 60, 230, 910 Hz open; 3600, 14000 Hz silenced
        assert_eq!(playback.levels(), &[1500, 1500, 1500, -1500, -1500]);
        assert_eq!(playback.equalizer().levels(), playback.levels());
        assert!(playback.equalizer().is_enabled());
    }

    #[test]
    fn test_cutoff_equal_to_center_keeps_band_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tone(dir.path(), "rain.wav", 440.0, 0.2);
        let backend = VirtualBackend::new(BandLayout::five_band());

        let playback = filter_and_play(&backend, &path, 910).unwrap();
        assert_eq!(playback.levels()[2], 1500);
        assert_eq!(playback.levels()[3], -1500);
    }

    #[test]
    fn test_valid_file_starts_looped_playback() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tone(dir.path(), "waves.wav", 220.0, 0.05);
        let backend = VirtualBackend::default();

        let mut playback = filter_and_play(&backend, &path, 5000).unwrap();
        assert!(playback.is_playing());
        assert!(playback.session().is_looping());

        // Much longer than the file itself
        let rendered = playback.session_mut().render(44_100);
        assert_eq!(rendered.len(), 44_100);
        assert!(playback.is_playing());
    }

    #[test]
    fn test_missing_file_fails_without_playback() {
        let backend = VirtualBackend::default();
        let result = filter_and_play(&backend, Path::new("/missing/forest.mp3"), 1000);

        let err = result.unwrap_err();
        assert!(err.is_prepare_failure());
        assert_eq!(backend.live_sessions(), 0);
    }

    #[test]
    fn test_unreadable_media_fails_without_playback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.mp3");
        std::fs::write(&path, [0u8; 64]).unwrap();
        let backend = VirtualBackend::default();

        let err = filter_and_play(&backend, &path, 1000).unwrap_err();
        assert!(matches!(err, FilterError::Decode { .. }));
        assert_eq!(backend.live_sessions(), 0);
    }

    #[test]
    fn test_missing_equalizer_is_reported_and_session_released() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tone(dir.path(), "fire.wav", 220.0, 0.05);
        let backend = VirtualBackend::default().without_equalizer();

        let err = filter_and_play(&backend, &path, 1000).unwrap_err();
        assert!(matches!(err, FilterError::EqualizerUnavailable(_)));
        assert_eq!(backend.live_sessions(), 0);
    }

    #[test]
    fn test_drop_releases_and_detach_keeps() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tone(dir.path(), "wind.wav", 220.0, 0.05);
        let backend = VirtualBackend::default();

        let playback = filter_and_play(&backend, &path, 1000).unwrap();
        assert_eq!(backend.live_sessions(), 1);
        drop(playback);
        assert_eq!(backend.live_sessions(), 0);

        let playback = filter_and_play(&backend, &path, 1000).unwrap();
        playback.detach();
        assert_eq!(backend.live_sessions(), 1);
    }

    #[test]
    fn test_repeated_calls_create_independent_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tone(dir.path(), "birds.wav", 220.0, 0.05);
        let backend = VirtualBackend::default();

        let a = filter_and_play(&backend, &path, 300).unwrap();
        let b = filter_and_play(&backend, &path, 5000).unwrap();

        assert_ne!(a.session_id(), b.session_id());
        assert_ne!(a.levels(), b.levels());
        assert_eq!(backend.live_sessions(), 2);
    }

    #[test]
    fn test_retune_cutoff_while_playing() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tone(dir.path(), "stream.wav", 220.0, 0.05);
        let backend = VirtualBackend::default();

        let mut playback = filter_and_play(&backend, &path, 20_000).unwrap();
        assert!(playback.levels().iter().all(|&l| l == 1500));

        playback.set_cutoff(100.0, CutoffResponse::Attenuate).unwrap();
        assert_eq!(playback.levels(), &[0, -1500, -1500, -1500, -1500]);
        assert_eq!(playback.response(), CutoffResponse::Attenuate);
    }
}
