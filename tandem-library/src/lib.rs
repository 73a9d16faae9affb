//! Track loading for Tandem
//!
//! Decoding, display metadata, and the preparation pipeline that turns a
//! file path into a deck-ready track (resident PCM + BPM + waveform).

mod loader;
mod prepare;

pub use loader::{decode, read_metadata, DecodeError, TrackTags};
pub use prepare::{prepare, PrepareEvent, PreparedTrack, Preparer};
