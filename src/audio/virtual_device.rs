//! Headless backend
//!
//! Decodes and processes media exactly like the output backend but never
//! opens a device. Samples are pulled on demand with [`VirtualSession::render`].
//! Used for tests and for running without sound hardware.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rodio::Source;

use super::backend::{MediaBackend, PlaybackSession, SessionId};
use super::chain::SessionChain;
use super::equalizer::{BandLayout, EqualizerParams};
use super::player::open_decoder;
use crate::error::{FilterError, Result};

type SampleStream = Box<dyn Iterator<Item = f32> + Send>;

/// Backend without an output device
#[derive(Debug, Clone)]
pub struct VirtualBackend {
    layout: BandLayout,
    equalizer_available: bool,
    live_sessions: Arc<AtomicUsize>,
}

impl VirtualBackend {
    pub fn new(layout: BandLayout) -> Self {
        Self {
            layout,
            equalizer_available: true,
            live_sessions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Simulate a device without audio effects support
    pub fn without_equalizer(mut self) -> Self {
        self.equalizer_available = false;
        self
    }

    /// Sessions prepared and not yet released
    pub fn live_sessions(&self) -> usize {
        self.live_sessions.load(Ordering::Acquire)
    }
}

impl Default for VirtualBackend {
    fn default() -> Self {
        Self::new(BandLayout::default())
    }
}

impl MediaBackend for VirtualBackend {
    type Session = VirtualSession;

    fn prepare(&self, source: &Path, looping: bool) -> Result<VirtualSession> {
        let decoder = open_decoder(source)?;
        let chain = SessionChain::new(self.layout.clone());
        let channels = decoder.channels();
        let sample_rate = decoder.sample_rate();

        let stream: SampleStream = if looping {
            Box::new(chain.apply(decoder.repeat_infinite()))
        } else {
            Box::new(chain.apply(decoder))
        };

        self.live_sessions.fetch_add(1, Ordering::AcqRel);
        let id = SessionId::next();
        tracing::debug!("Prepared virtual {} for {:?}", id, source);

        Ok(VirtualSession {
            id,
            path: source.to_path_buf(),
            stream: Some(stream),
            chain,
            looping,
            playing: false,
            channels,
            sample_rate,
            equalizer_available: self.equalizer_available,
            live_sessions: Some(Arc::clone(&self.live_sessions)),
        })
    }
}

/// Session on the virtual device
pub struct VirtualSession {
    id: SessionId,
    path: PathBuf,
    stream: Option<SampleStream>,
    chain: SessionChain,
    looping: bool,
    playing: bool,
    channels: u16,
    sample_rate: u32,
    equalizer_available: bool,
    live_sessions: Option<Arc<AtomicUsize>>,
}

impl std::fmt::Debug for VirtualSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualSession")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("playing", &self.playing)
            .field("looping", &self.looping)
            .finish_non_exhaustive()
    }
}

impl VirtualSession {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Pull up to `samples` interleaved samples through the session chain
    ///
    /// Returns nothing unless the session is playing. A shorter result means
    /// a non-looping source ran out, after which the session stops.
    pub fn render(&mut self, samples: usize) -> Vec<f32> {
        if !self.playing {
            return Vec::new();
        }
        let Some(stream) = self.stream.as_mut() else {
            return Vec::new();
        };

        let out: Vec<f32> = stream.by_ref().take(samples).collect();
        if out.len() < samples {
            self.playing = false;
        }
        out
    }

    fn release(&mut self) {
        if let Some(counter) = self.live_sessions.take() {
            counter.fetch_sub(1, Ordering::AcqRel);
            tracing::debug!("Released virtual {}", self.id);
        }
        self.stream = None;
        self.playing = false;
    }
}

impl PlaybackSession for VirtualSession {
    type Equalizer = EqualizerParams;

    fn session_id(&self) -> SessionId {
        self.id
    }

    fn attach_equalizer(&mut self) -> Result<EqualizerParams> {
        if !self.equalizer_available {
            return Err(FilterError::EqualizerUnavailable(format!(
                "virtual device has no effects for {}",
                self.id
            )));
        }
        Ok(self.chain.equalizer().clone())
    }

    fn start(&mut self) -> Result<()> {
        if self.stream.is_none() {
            return Err(FilterError::Output(format!("{} already released", self.id)));
        }
        self.playing = true;
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) {
        self.chain.gain().set_volume(volume);
    }

    fn set_oscillation(&mut self, depth: f32, period: Duration) {
        self.chain.gain().set_period(period);
        self.chain.gain().set_depth(depth);
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn is_looping(&self) -> bool {
        self.looping
    }

    fn detach(mut self) {
        // Nothing keeps rendering a virtual session, so detaching only
        // gives up the handle while the session stays counted as live.
        self.live_sessions = None;
        tracing::debug!("Detached virtual {}", self.id);
    }
}

impl Drop for VirtualSession {
    fn drop(&mut self) {
        self.release();
    }
}
