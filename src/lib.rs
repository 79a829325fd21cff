//! Soundscape - looping ambient playback shaped by an equalizer cutoff
//!
//! [`audio::filter_and_play`] is the core operation: prepare a looping
//! session, bind an equalizer, open every band at or below the cutoff,
//! silence the rest and start. [`audio::AudioFilterModule`] exposes the
//! same operation, plus layered mixing and scenes, from a dedicated audio
//! thread.

pub mod audio;
pub mod error;
pub mod settings;

pub use error::{FilterError, Result};
pub use settings::Settings;
