//! Audio playback module
//!
//! - `filter_play`: Cutoff-filtered looping playback over any backend
//! - `backend`: Capability traits for sessions and band equalizers
//! - `player` / `virtual_device`: Speaker output and headless backends
//! - `soundscape`: Layered mixing and scenes
//! - `handle` / `thread`: Non-blocking module surface over an audio thread

pub mod backend;
mod chain;
pub mod cutoff;
pub mod equalizer;
pub mod events;
mod fade;
pub mod filter_play;
mod handle;
mod player;
pub mod soundscape;
mod thread;
pub mod virtual_device;

#[cfg(test)]
mod test_support;

pub use backend::{BandEqualizer, MediaBackend, PlaybackSession, SessionId};
pub use cutoff::CutoffResponse;
pub use equalizer::{BandLayout, LevelRange, Millibels};
pub use events::{AudioEvent, AudioEventReceiver, ModuleSnapshot};
pub use filter_play::{FilteredPlayback, filter_and_play, filter_and_play_with};
pub use handle::AudioFilterModule;
pub use player::{AudioDevice, RodioBackend, RodioSession, get_audio_devices};
pub use soundscape::{MixConfig, SceneState, SoundCatalog, Soundscape};
pub use thread::{AudioThreadHandle, spawn_audio_thread};
pub use virtual_device::{VirtualBackend, VirtualSession};
