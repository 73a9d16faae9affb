//! Control surface binding for Tandem
//!
//! Translates external events - MIDI messages from a controller or
//! gestures from a UI - into the explicit `ControlAction` vocabulary the
//! engine consumes. Raw MIDI flows through a rebindable mapping table with
//! a learn mode; learned bindings are the one thing Tandem persists.

mod actions;
mod input;
mod mapping;
mod store;

pub use actions::ControlAction;
pub use input::{MidiError, MidiEvent, MidiInputHandler};
pub use mapping::{ControlKey, ControlTarget, LearnedBinding, MappingTable, MidiLearn};
pub use store::{apply_learned, MappingStore};
