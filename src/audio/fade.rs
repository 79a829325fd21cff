//! Gain envelope - self-driving layer volume
//!
//! Wraps a source and applies a per-layer volume that can ramp smoothly to
//! new targets and optionally oscillate around its base level:
//! `gain = base + sin(phase) * depth * base`, clamped to 0.0 - 1.0.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use rodio::Source;

/// Default time for one full oscillation cycle
pub const DEFAULT_OSCILLATION_PERIOD: Duration = Duration::from_secs(6);

/// Ramp used for volume changes so they do not click
pub const VOLUME_RAMP: Duration = Duration::from_millis(50);

/// Shared gain control handle
///
/// Clone this to control gain from outside the audio thread.
/// All operations are lock-free using atomics.
#[derive(Clone)]
pub struct GainControl {
    inner: Arc<GainControlInner>,
}

struct GainControlInner {
    /// Target volume (0.0 - 1.0), stored as f32 bits
    target_volume: AtomicU32,
    /// Fade duration in milliseconds
    fade_duration_ms: AtomicU32,
    /// Incremented on each fade_to() call
    generation: AtomicU32,
    /// Oscillation depth (0.0 - 1.0), stored as f32 bits
    depth: AtomicU32,
    /// Oscillation period in milliseconds
    period_ms: AtomicU32,
}

impl std::fmt::Debug for GainControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GainControl")
            .field("target_volume", &self.target_volume())
            .field("depth", &self.depth())
            .finish()
    }
}

impl GainControl {
    /// Create a new gain control with initial volume
    pub fn new(initial_volume: f32) -> Self {
        Self {
            inner: Arc::new(GainControlInner {
                target_volume: AtomicU32::new(initial_volume.clamp(0.0, 1.0).to_bits()),
                fade_duration_ms: AtomicU32::new(0),
                generation: AtomicU32::new(0),
                depth: AtomicU32::new(0.0_f32.to_bits()),
                period_ms: AtomicU32::new(DEFAULT_OSCILLATION_PERIOD.as_millis() as u32),
            }),
        }
    }

    /// Ramp to target volume over duration
    pub fn fade_to(&self, volume: f32, duration: Duration) {
        let volume = volume.clamp(0.0, 1.0);
        self.inner
            .target_volume
            .store(volume.to_bits(), Ordering::Release);
        self.inner
            .fade_duration_ms
            .store(duration.as_millis() as u32, Ordering::Release);
        self.inner.generation.fetch_add(1, Ordering::Release);
    }

    /// Set volume instantly (no fade)
    pub fn set_volume(&self, volume: f32) {
        self.fade_to(volume, Duration::ZERO);
    }

    pub fn target_volume(&self) -> f32 {
        f32::from_bits(self.inner.target_volume.load(Ordering::Acquire))
    }

    /// Oscillation depth relative to the base volume, 0 disables
    pub fn set_depth(&self, depth: f32) {
        self.inner
            .depth
            .store(depth.clamp(0.0, 1.0).to_bits(), Ordering::Release);
    }

    pub fn depth(&self) -> f32 {
        f32::from_bits(self.inner.depth.load(Ordering::Acquire))
    }

    pub fn set_period(&self, period: Duration) {
        let ms = (period.as_millis() as u32).max(1);
        self.inner.period_ms.store(ms, Ordering::Release);
    }

    pub fn period(&self) -> Duration {
        Duration::from_millis(self.inner.period_ms.load(Ordering::Acquire) as u64)
    }

    fn generation(&self) -> u32 {
        self.inner.generation.load(Ordering::Acquire)
    }

    fn fade_duration_ms(&self) -> u32 {
        self.inner.fade_duration_ms.load(Ordering::Acquire)
    }
}

impl Default for GainControl {
    fn default() -> Self {
        Self::new(1.0)
    }
}

/// Gain envelope source wrapper
///
/// Runs entirely in the audio thread - no external tick needed.
pub struct GainEnvelope<S>
where
    S: Source<Item = f32>,
{
    source: S,
    control: GainControl,
    /// Base volume right now (before oscillation)
    current_volume: f32,
    /// Volume at the start of current fade
    fade_start_volume: f32,
    /// Frames remaining in current fade
    fade_frames_remaining: u32,
    /// Total frames for current fade
    fade_frames_total: u32,
    /// Last seen generation (to detect new fade requests)
    last_generation: u32,
    /// Oscillation phase in radians
    phase: f32,
    /// Gain applied to every sample of the current frame
    frame_gain: f32,
    channel: u16,
    channels: u16,
    sample_rate: u32,
}

impl<S> GainEnvelope<S>
where
    S: Source<Item = f32>,
{
    pub fn new(source: S, control: GainControl) -> Self {
        let sample_rate = source.sample_rate().max(1);
        let channels = source.channels().max(1);
        let initial_volume = control.target_volume();
        let generation = control.generation();

        Self {
            source,
            control,
            current_volume: initial_volume,
            fade_start_volume: initial_volume,
            fade_frames_remaining: 0,
            fade_frames_total: 0,
            last_generation: generation,
            phase: 0.0,
            frame_gain: initial_volume,
            channel: 0,
            channels,
            sample_rate,
        }
    }

    fn check_fade_request(&mut self) {
        let current_gen = self.control.generation();
        if current_gen == self.last_generation {
            return;
        }
        self.last_generation = current_gen;

        let duration_ms = self.control.fade_duration_ms();
        if duration_ms == 0 {
            self.current_volume = self.control.target_volume();
            self.fade_frames_remaining = 0;
        } else {
            self.fade_start_volume = self.current_volume;
            self.fade_frames_total = (self.sample_rate as u64 * duration_ms as u64 / 1000) as u32;
            self.fade_frames_remaining = self.fade_frames_total.max(1);
        }
    }

    fn update_volume(&mut self) {
        if self.fade_frames_remaining == 0 {
            return;
        }
        self.fade_frames_remaining -= 1;

        let target = self.control.target_volume();
        let total = self.fade_frames_total.max(1) as f32;
        let progress = 1.0 - (self.fade_frames_remaining as f32 / total);
        self.current_volume = self.fade_start_volume + (target - self.fade_start_volume) * progress;

        if self.fade_frames_remaining == 0 {
            self.current_volume = target;
        }
    }

    /// Advance one frame and compute the gain for it
    fn advance_frame(&mut self) {
        self.check_fade_request();
        self.update_volume();

        let depth = self.control.depth();
        if depth <= 0.0 {
            self.frame_gain = self.current_volume;
            return;
        }

        let period_secs = self.control.period().as_secs_f32().max(0.001);
        let step = std::f32::consts::TAU / (period_secs * self.sample_rate as f32);
        self.phase = (self.phase + step) % std::f32::consts::TAU;

        let base = self.current_volume;
        self.frame_gain = (base + self.phase.sin() * depth * base).clamp(0.0, 1.0);
    }
}

impl<S> Iterator for GainEnvelope<S>
where
    S: Source<Item = f32>,
{
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        let sample = self.source.next()?;

        if self.channel == 0 {
            self.advance_frame();
        }
        self.channel = (self.channel + 1) % self.channels;

        Some(sample * self.frame_gain)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.source.size_hint()
    }
}

impl<S> Source for GainEnvelope<S>
where
    S: Source<Item = f32>,
{
    fn current_span_len(&self) -> Option<usize> {
        self.source.current_span_len()
    }

    fn channels(&self) -> u16 {
        self.source.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.source.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        self.source.total_duration()
    }

    fn try_seek(&mut self, pos: Duration) -> Result<(), rodio::source::SeekError> {
        self.source.try_seek(pos)
    }
}
