//! Band equalizer using biquad peaking filters
//!
//! Models a device equalizer: a fixed, ordered set of bands with read-only
//! center frequencies (millihertz) and a settable level per band (millibels)
//! inside a device-defined range. Levels are realized as cascaded peaking
//! filters on the decoded source.

use std::sync::Arc;

use parking_lot::RwLock;
use rodio::Source;

use super::backend::BandEqualizer;
use crate::error::{FilterError, Result};

/// Band level in millibels (1/100 dB)
pub type Millibels = i16;

/// Five-band layout most handset equalizers report (millihertz)
pub const FIVE_BAND_CENTERS_MHZ: [u32; 5] = [60_000, 230_000, 910_000, 3_600_000, 14_000_000];

/// Standard 10-band layout: 31Hz, 62Hz ... 16kHz (millihertz)
pub const TEN_BAND_CENTERS_MHZ: [u32; 10] = [
    31_000, 62_000, 125_000, 250_000, 500_000, 1_000_000, 2_000_000, 4_000_000, 8_000_000,
    16_000_000,
];

/// Level range as reported by the device: `[min, max]` on most devices
pub const DEFAULT_LEVEL_RANGE: [Millibels; 2] = [-1500, 1500];

/// Valid band level range, normalized so `min <= max`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelRange {
    pub min: Millibels,
    pub max: Millibels,
}

impl LevelRange {
    /// Normalize a raw platform pair without trusting its ordering
    pub fn from_platform(raw: [Millibels; 2]) -> Self {
        Self {
            min: raw[0].min(raw[1]),
            max: raw[0].max(raw[1]),
        }
    }

    pub fn contains(&self, level: Millibels) -> bool {
        (self.min..=self.max).contains(&level)
    }

    pub fn clamp(&self, level: Millibels) -> Millibels {
        level.clamp(self.min, self.max)
    }
}

/// Read-only description of an equalizer's bands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandLayout {
    centers_mhz: Vec<u32>,
    raw_range: [Millibels; 2],
}

impl BandLayout {
    pub fn new(centers_mhz: Vec<u32>, raw_range: [Millibels; 2]) -> Self {
        Self {
            centers_mhz,
            raw_range,
        }
    }

    pub fn five_band() -> Self {
        Self::new(FIVE_BAND_CENTERS_MHZ.to_vec(), DEFAULT_LEVEL_RANGE)
    }

    pub fn ten_band() -> Self {
        Self::new(TEN_BAND_CENTERS_MHZ.to_vec(), DEFAULT_LEVEL_RANGE)
    }

    pub fn band_count(&self) -> u16 {
        self.centers_mhz.len() as u16
    }

    pub fn centers_mhz(&self) -> &[u32] {
        &self.centers_mhz
    }

    /// Range exactly as the device reports it
    pub fn raw_range(&self) -> [Millibels; 2] {
        self.raw_range
    }
}

impl Default for BandLayout {
    fn default() -> Self {
        Self::five_band()
    }
}

/// Biquad filter coefficients
#[derive(Clone, Copy)]
struct BiquadCoeffs {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl BiquadCoeffs {
    const UNITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        Self::UNITY
    }
}

/// Biquad filter state for one channel
#[derive(Clone, Copy, Default)]
struct BiquadState {
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl BiquadState {
    fn process(&mut self, coeffs: &BiquadCoeffs, input: f32) -> f32 {
        let output = coeffs.b0 * input + coeffs.b1 * self.x1 + coeffs.b2 * self.x2
            - coeffs.a1 * self.y1
            - coeffs.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }
}

/// Peaking EQ coefficients (RBJ cookbook)
fn calc_peaking_eq(freq: f32, gain_db: f32, sample_rate: f32, q: f32) -> BiquadCoeffs {
    // Bands at or beyond Nyquist cannot be realized
    if gain_db.abs() < 0.01 || freq >= sample_rate * 0.49 {
        return BiquadCoeffs::UNITY;
    }

    let a = 10.0_f32.powf(gain_db / 40.0);
    let omega = 2.0 * std::f32::consts::PI * freq / sample_rate;
    let sin_omega = omega.sin();
    let cos_omega = omega.cos();
    let alpha = sin_omega / (2.0 * q);

    let b0 = 1.0 + alpha * a;
    let b1 = -2.0 * cos_omega;
    let b2 = 1.0 - alpha * a;
    let a0 = 1.0 + alpha / a;
    let a1 = -2.0 * cos_omega;
    let a2 = 1.0 - alpha / a;

    BiquadCoeffs {
        b0: b0 / a0,
        b1: b1 / a0,
        b2: b2 / a0,
        a1: a1 / a0,
        a2: a2 / a0,
    }
}

/// Q derived from the octave spacing to the neighbouring band
fn band_q(centers_mhz: &[u32], band: usize) -> f32 {
    let neighbour = if band + 1 < centers_mhz.len() {
        Some((centers_mhz[band], centers_mhz[band + 1]))
    } else if band > 0 {
        Some((centers_mhz[band - 1], centers_mhz[band]))
    } else {
        None
    };

    match neighbour {
        Some((low, high)) if low > 0 && high > low => {
            let octaves = (high as f32 / low as f32).log2();
            let ratio = 2.0_f32.powf(octaves);
            ratio.sqrt() / (ratio - 1.0)
        }
        _ => 1.0,
    }
}

/// Shared equalizer parameters that can be updated in real-time
///
/// Cloning yields another handle to the same equalizer.
#[derive(Clone)]
pub struct EqualizerParams {
    inner: Arc<RwLock<EqualizerParamsInner>>,
}

impl std::fmt::Debug for EqualizerParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("EqualizerParams")
            .field("enabled", &inner.enabled)
            .field("levels", &inner.levels)
            .finish()
    }
}

struct EqualizerParamsInner {
    enabled: bool,
    layout: BandLayout,
    levels: Vec<Millibels>,
    sample_rate: u32,
    /// Bumped on every change; filters recompute when it moves
    generation: u64,
}

impl EqualizerParams {
    /// Create a disabled equalizer with all bands at 0 mB
    pub fn new(layout: BandLayout, sample_rate: u32) -> Self {
        let levels = vec![0; layout.centers_mhz.len()];
        Self {
            inner: Arc::new(RwLock::new(EqualizerParamsInner {
                enabled: false,
                layout,
                levels,
                sample_rate,
                generation: 0,
            })),
        }
    }

    /// Current level of every band, in band order
    pub fn levels(&self) -> Vec<Millibels> {
        self.inner.read().levels.clone()
    }

    /// Update sample rate (call when audio format changes)
    pub fn set_sample_rate(&self, sample_rate: u32) {
        let mut inner = self.inner.write();
        if inner.sample_rate != sample_rate {
            inner.sample_rate = sample_rate;
            inner.generation += 1;
        }
    }

    fn generation(&self) -> u64 {
        self.inner.read().generation
    }

    fn check_band(inner: &EqualizerParamsInner, band: u16) -> Result<usize> {
        let count = inner.layout.band_count();
        if band < count {
            Ok(band as usize)
        } else {
            Err(FilterError::InvalidBand { band, count })
        }
    }
}

impl BandEqualizer for EqualizerParams {
    fn set_enabled(&mut self, enabled: bool) -> Result<()> {
        let mut inner = self.inner.write();
        inner.enabled = enabled;
        inner.generation += 1;
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.inner.read().enabled
    }

    fn band_count(&self) -> u16 {
        self.inner.read().layout.band_count()
    }

    fn center_freq(&self, band: u16) -> Result<u32> {
        let inner = self.inner.read();
        let index = Self::check_band(&inner, band)?;
        Ok(inner.layout.centers_mhz[index])
    }

    fn band_level_range(&self) -> [Millibels; 2] {
        self.inner.read().layout.raw_range
    }

    fn set_band_level(&mut self, band: u16, level: Millibels) -> Result<()> {
        let mut inner = self.inner.write();
        let index = Self::check_band(&inner, band)?;
        let range = LevelRange::from_platform(inner.layout.raw_range);
        if !range.contains(level) {
            return Err(FilterError::LevelOutOfRange {
                level,
                min: range.min,
                max: range.max,
            });
        }
        inner.levels[index] = level;
        inner.generation += 1;
        Ok(())
    }

    fn band_level(&self, band: u16) -> Result<Millibels> {
        let inner = self.inner.read();
        let index = Self::check_band(&inner, band)?;
        Ok(inner.levels[index])
    }
}

/// Band equalizer Source wrapper
pub struct Equalizer<S>
where
    S: Source<Item = f32>,
{
    source: S,
    params: EqualizerParams,
    enabled: bool,
    coeffs: Vec<BiquadCoeffs>,
    // Filter state per channel, per band
    states: Vec<Vec<BiquadState>>,
    seen_generation: u64,
    current_channel: usize,
    channels: u16,
}

impl<S> Equalizer<S>
where
    S: Source<Item = f32>,
{
    /// Create a new equalizer wrapping the given source
    pub fn new(source: S, params: EqualizerParams) -> Self {
        let channels = source.channels().max(1);
        params.set_sample_rate(source.sample_rate());

        let bands = params.inner.read().layout.centers_mhz.len();
        let mut eq = Self {
            source,
            params,
            enabled: false,
            coeffs: vec![BiquadCoeffs::UNITY; bands],
            states: vec![vec![BiquadState::default(); bands]; channels as usize],
            seen_generation: 0,
            current_channel: 0,
            channels,
        };

        eq.update_coefficients();
        eq
    }

    /// Recompute filter coefficients from the shared parameters
    fn update_coefficients(&mut self) {
        let inner = self.params.inner.read();
        self.seen_generation = inner.generation;
        self.enabled = inner.enabled;

        if !self.enabled {
            self.coeffs.fill(BiquadCoeffs::UNITY);
            return;
        }

        let sample_rate = inner.sample_rate as f32;
        let centers = &inner.layout.centers_mhz;
        for (i, (&center_mhz, &level)) in centers.iter().zip(inner.levels.iter()).enumerate() {
            let freq = center_mhz as f32 / 1000.0;
            let gain_db = level as f32 / 100.0;
            self.coeffs[i] = calc_peaking_eq(freq, gain_db, sample_rate, band_q(centers, i));
        }
    }

    fn reset_states(&mut self) {
        for channel_states in &mut self.states {
            channel_states.fill(BiquadState::default());
        }
    }
}

impl<S> Iterator for Equalizer<S>
where
    S: Source<Item = f32>,
{
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.params.generation() != self.seen_generation {
            self.update_coefficients();
        }

        let sample = self.source.next()?;
        let channel = self.current_channel;
        self.current_channel = (self.current_channel + 1) % self.channels as usize;

        if !self.enabled {
            return Some(sample);
        }

        let mut output = sample;
        for (coeff, state) in self.coeffs.iter().zip(self.states[channel].iter_mut()) {
            output = state.process(coeff, output);
        }

        Some(soft_clip(output))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.source.size_hint()
    }
}

impl<S> Source for Equalizer<S>
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

    fn total_duration(&self) -> Option<std::time::Duration> {
        self.source.total_duration()
    }

    fn try_seek(&mut self, pos: std::time::Duration) -> std::result::Result<(), rodio::source::SeekError> {
        // Reset filter states when seeking to avoid audio artifacts
        self.reset_states();
        self.source.try_seek(pos)
    }
}

/// Soft clipping function to prevent harsh digital clipping
fn soft_clip(x: f32) -> f32 {
    if x.abs() < 0.9 {
        x
    } else if x > 0.0 {
        0.9 + 0.1 * ((x - 0.9) / 0.1).tanh()
    } else {
        -0.9 - 0.1 * ((-x - 0.9) / 0.1).tanh()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rodio::buffer::SamplesBuffer;

    #[test]
    fn test_level_range_normalizes_reversed_pair() {
        let range = LevelRange::from_platform([1500, -1500]);
        assert_eq!(range.min, -1500);
        assert_eq!(range.max, 1500);
        assert!(range.contains(0));
        assert!(!range.contains(1501));
        assert_eq!(range.clamp(-3000), -1500);
    }

    #[test]
    fn test_params_reject_invalid_band_and_level() {
        let mut params = EqualizerParams::new(BandLayout::five_band(), 44_100);
        assert!(matches!(
            params.set_band_level(5, 0),
            Err(FilterError::InvalidBand { band: 5, count: 5 })
        ));
        assert!(matches!(
            params.set_band_level(0, 2000),
            Err(FilterError::LevelOutOfRange { level: 2000, .. })
        ));
        params.set_band_level(4, -1500).unwrap();
        assert_eq!(params.band_level(4).unwrap(), -1500);
        assert_eq!(params.center_freq(1).unwrap(), 230_000);
    }

    #[test]
    fn test_band_q_follows_spacing() {
        let octave = band_q(&TEN_BAND_CENTERS_MHZ, 4);
        assert!((octave - std::f32::consts::SQRT_2).abs() < 0.05);
        let wide = band_q(&FIVE_BAND_CENTERS_MHZ, 0);
        assert!(wide < octave);
        assert_eq!(band_q(&[1_000_000], 0), 1.0);
    }

    #[test]
    fn test_disabled_equalizer_is_transparent() {
        let samples = vec![0.1, -0.2, 0.3, -0.4];
        let source = SamplesBuffer::new(1, 44_100, samples.clone());
        let params = EqualizerParams::new(BandLayout::five_band(), 44_100);
        let out: Vec<f32> = Equalizer::new(source, params).collect();
        assert_eq!(out, samples);
    }

    #[test]
    fn test_cut_band_attenuates_tone() {
        let rate = 44_100;
        let tone: Vec<f32> = (0..rate)
            .map(|n| 0.5 * (2.0 * std::f32::consts::PI * 3600.0 * n as f32 / rate as f32).sin())
            .collect();

        let mut params = EqualizerParams::new(BandLayout::five_band(), rate);
        params.set_enabled(true).unwrap();
        params.set_band_level(3, -1500).unwrap();

        let source = SamplesBuffer::new(1, rate, tone.clone());
        let out: Vec<f32> = Equalizer::new(source, params).collect();

        let rms = |s: &[f32]| (s.iter().map(|x| x * x).sum::<f32>() / s.len() as f32).sqrt();
        // Skip the filter's settling time
        let settled = rate as usize / 2;
        assert!(rms(&out[settled..]) < rms(&tone[settled..]) * 0.5);
    }

    #[test]
    fn test_channels_keep_separate_filter_state() {
        let rate = 44_100;
        let frames = 4096;
        let mut samples = vec![0.0_f32; frames * 4];
        for n in 0..frames {
            samples[n * 4 + 1] =
                0.5 * (2.0 * std::f32::consts::PI * 910.0 * n as f32 / rate as f32).sin();
        }

        let mut params = EqualizerParams::new(BandLayout::five_band(), rate);
        params.set_enabled(true).unwrap();
        for band in 0..5 {
            params.set_band_level(band, 1500).unwrap();
        }

        let source = SamplesBuffer::new(4, rate, samples);
        let out: Vec<f32> = Equalizer::new(source, params).collect();

        assert!(out.chunks(4).any(|frame| frame[1].abs() > 0.1));
        assert!(out.chunks(4).all(|frame| frame[3] == 0.0));
        assert!(out.chunks(4).all(|frame| frame[2] == 0.0 && frame[0] == 0.0));
    }
}
