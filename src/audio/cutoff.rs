//! Cutoff-driven band levels
//!
//! Every band whose center frequency lies strictly above the cutoff is
//! pulled down; every band at or below it is left open. The result is a
//! brick-wall low-pass approximation on whatever bands the device offers.

use serde::{Deserialize, Serialize};

use super::backend::BandEqualizer;
use super::equalizer::{LevelRange, Millibels};
use crate::error::Result;

/// Attenuation applied above the cutoff by [`CutoffResponse::Attenuate`]
pub const LOW_PASS_ATTENUATION_MB: Millibels = -1500;

/// Warmth 1.0 maps to this cutoff
pub const DEFAULT_MIN_CUTOFF_HZ: f64 = 200.0;

/// Warmth 0.0 maps to this cutoff (fully open)
pub const DEFAULT_MAX_CUTOFF_HZ: f64 = 20_000.0;

/// How band levels react to the cutoff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CutoffResponse {
    /// Range minimum above the cutoff, range maximum at or below it
    #[default]
    FullRange,
    /// Fixed attenuation above the cutoff, unity at or below it
    Attenuate,
}

impl CutoffResponse {
    pub fn name(&self) -> &'static str {
        match self {
            Self::FullRange => "full",
            Self::Attenuate => "attenuate",
        }
    }
}

impl std::fmt::Display for CutoffResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for CutoffResponse {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" | "full_range" => Ok(Self::FullRange),
            "attenuate" | "low_pass" => Ok(Self::Attenuate),
            other => Err(format!("unknown cutoff response: {other}")),
        }
    }
}

/// Level for a band centered at `center_hz` given the cutoff
pub fn band_level_for(
    center_hz: u32,
    cutoff_hz: f64,
    range: LevelRange,
    response: CutoffResponse,
) -> Millibels {
    let above = f64::from(center_hz) > cutoff_hz;
    match response {
        CutoffResponse::FullRange => {
            if above {
                range.min
            } else {
                range.max
            }
        }
        CutoffResponse::Attenuate => {
            if above {
                range.clamp(LOW_PASS_ATTENUATION_MB)
            } else {
                range.clamp(0)
            }
        }
    }
}

/// Enable `eq` and set every band according to the cutoff
///
/// Returns the applied levels in band order.
pub fn apply_cutoff<E>(eq: &mut E, cutoff_hz: f64, response: CutoffResponse) -> Result<Vec<Millibels>>
where
    E: BandEqualizer + ?Sized,
{
    eq.set_enabled(true)?;

    let bands = eq.band_count();
    let range = LevelRange::from_platform(eq.band_level_range());
    let mut levels = Vec::with_capacity(bands as usize);

    for band in 0..bands {
        let center_hz = eq.center_freq(band)? / 1000;
        let level = band_level_for(center_hz, cutoff_hz, range, response);
        eq.set_band_level(band, level)?;
        tracing::debug!(
            "band {} @ {} Hz -> {} mB (cutoff {} Hz)",
            band,
            center_hz,
            level,
            cutoff_hz
        );
        levels.push(level);
    }

    Ok(levels)
}

/// Map warmth (0.0 - 1.0) to a low-pass cutoff between `min_hz` and `max_hz`
pub fn soften_to_cutoff(warmth: f32, min_hz: f64, max_hz: f64) -> f64 {
    let warmth = f64::from(warmth.clamp(0.0, 1.0));
    min_hz + (1.0 - warmth) * (max_hz - min_hz)
}

/// Mean warmth of a set of layers, `None` when there are none
pub fn average_warmth(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f32>() / values.len() as f32)
}
