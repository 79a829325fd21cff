//! Per-session processing chain
//!
//! Every playback session runs its decoded source through:
//! - the band equalizer bound to the session
//! - the gain envelope (layer volume, ramps, oscillation)
//!
//! Both stages are controlled through shared handles, so levels and volume
//! can change while the session plays.

use rodio::Source;

use super::equalizer::{BandLayout, Equalizer, EqualizerParams};
use super::fade::{GainControl, GainEnvelope};

/// Shared handles for one session's processing stages
#[derive(Clone, Debug)]
pub struct SessionChain {
    /// Equalizer parameters (starts disabled, i.e. transparent)
    eq_params: EqualizerParams,
    gain: GainControl,
}

impl SessionChain {
    pub fn new(layout: BandLayout) -> Self {
        Self {
            eq_params: EqualizerParams::new(layout, 44_100),
            gain: GainControl::default(),
        }
    }

    pub fn equalizer(&self) -> &EqualizerParams {
        &self.eq_params
    }

    pub fn gain(&self) -> &GainControl {
        &self.gain
    }

    /// Apply the processing chain to an audio source
    ///
    /// Processing order:
    /// 1. Equalizer
    /// 2. Gain envelope
    pub fn apply<S>(&self, source: S) -> ProcessedSource<S>
    where
        S: Source<Item = f32>,
    {
        ProcessedSource::new(source, self.clone())
    }
}

/// Audio source with the session chain applied
pub struct ProcessedSource<S>
where
    S: Source<Item = f32>,
{
    inner: GainEnvelope<Equalizer<S>>,
}

impl<S> ProcessedSource<S>
where
    S: Source<Item = f32>,
{
    fn new(source: S, chain: SessionChain) -> Self {
        let eq_source = Equalizer::new(source, chain.eq_params);
        let inner = GainEnvelope::new(eq_source, chain.gain);
        Self { inner }
    }
}

impl<S> Iterator for ProcessedSource<S>
where
    S: Source<Item = f32>,
{
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<S> Source for ProcessedSource<S>
where
    S: Source<Item = f32>,
{
    fn current_span_len(&self) -> Option<usize> {
        self.inner.current_span_len()
    }

    fn channels(&self) -> u16 {
        self.inner.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn total_duration(&self) -> Option<std::time::Duration> {
        self.inner.total_duration()
    }

    fn try_seek(&mut self, pos: std::time::Duration) -> Result<(), rodio::source::SeekError> {
        self.inner.try_seek(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::backend::BandEqualizer;
    use rodio::buffer::SamplesBuffer;

    #[test]
    fn test_chain_defaults_are_transparent() {
        let chain = SessionChain::new(BandLayout::five_band());
        let samples = vec![0.1, 0.2, -0.3, 0.4];
        let out: Vec<f32> = chain
            .apply(SamplesBuffer::new(2, 48_000, samples.clone()))
            .collect();
        assert_eq!(out, samples);
    }

    #[test]
    fn test_chain_picks_up_source_sample_rate() {
        let chain = SessionChain::new(BandLayout::five_band());
        let processed = chain.apply(SamplesBuffer::new(1, 22_050, vec![0.0; 8]));
        assert_eq!(processed.sample_rate(), 22_050);
        assert!(!chain.equalizer().is_enabled());
    }
}
