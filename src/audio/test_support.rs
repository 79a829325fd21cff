//! WAV fixtures for tests

use std::path::{Path, PathBuf};

pub const TEST_SAMPLE_RATE: u32 = 44_100;

/// Write a mono 16-bit sine tone and return its path
pub fn write_tone(dir: &Path, name: &str, freq_hz: f32, seconds: f32) -> PathBuf {
    let path = dir.join(name);
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: TEST_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    let frames = (TEST_SAMPLE_RATE as f32 * seconds) as usize;
    for n in 0..frames {
        let t = n as f32 / TEST_SAMPLE_RATE as f32;
        let value = 0.5 * (2.0 * std::f32::consts::PI * freq_hz * t).sin();
        writer.write_sample((value * i16::MAX as f32) as i16).unwrap();
    }
    writer.finalize().unwrap();

    path
}
