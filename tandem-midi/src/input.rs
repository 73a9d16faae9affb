//! MIDI input handling
//!
//! Raw bytes arrive in the midir driver callback, get parsed into
//! `MidiEvent`s, and are routed through the mapping table (or captured by
//! learn mode) into `ControlAction`s on a channel the control thread
//! drains. The driver callback never blocks: channel sends are try_send
//! and the mapping locks are uncontended control-plane mutexes.

use std::sync::Arc;

use crossbeam_channel::Sender;
use midir::{MidiInput, MidiInputConnection};
use parking_lot::Mutex;
use thiserror::Error;

use crate::actions::ControlAction;
use crate::mapping::{LearnedBinding, MappingTable, MidiLearn};

/// Device-level failures. Surfaced to the caller as "disconnected"; they
/// never reach the audio path.
#[derive(Error, Debug)]
pub enum MidiError {
    #[error("midi init failed: {0}")]
    Init(String),
    #[error("no midi input port matching '{0}'")]
    PortNotFound(String),
    #[error("midi connection failed: {0}")]
    Connection(String),
}

/// Parsed MIDI input message.
///
/// - Note Off: `0x8n note vel`
/// - Note On: `0x9n note vel` (velocity 0 is Note Off)
/// - Control Change: `0xBn cc val`
/// - Pitch Bend: `0xEn lsb msb`, 14-bit value 0-16383
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8 },
    ControlChange { channel: u8, cc: u8, value: u8 },
    PitchBend { channel: u8, value: u16 },
}

impl MidiEvent {
    /// Parse one raw message. Unknown status bytes yield `None`.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < 3 {
            return None;
        }
        let channel = data[0] & 0x0F;
        match data[0] & 0xF0 {
            0x80 => Some(Self::NoteOff {
                channel,
                note: data[1],
            }),
            0x90 => {
                if data[2] == 0 {
                    Some(Self::NoteOff {
                        channel,
                        note: data[1],
                    })
                } else {
                    Some(Self::NoteOn {
                        channel,
                        note: data[1],
                        velocity: data[2],
                    })
                }
            }
            0xB0 => Some(Self::ControlChange {
                channel,
                cc: data[1],
                value: data[2],
            }),
            0xE0 => Some(Self::PitchBend {
                channel,
                value: (data[1] & 0x7F) as u16 | (((data[2] & 0x7F) as u16) << 7),
            }),
            _ => None,
        }
    }
}

/// Owns the midir connection for its lifetime.
pub struct MidiInputHandler {
    _connection: MidiInputConnection<()>,
    port_name: String,
}

impl MidiInputHandler {
    /// Names of the currently visible input ports.
    pub fn list_ports() -> Result<Vec<String>, MidiError> {
        let midi_in = MidiInput::new("tandem").map_err(|e| MidiError::Init(e.to_string()))?;
        Ok(midi_in
            .ports()
            .iter()
            .filter_map(|p| midi_in.port_name(p).ok())
            .collect())
    }

    /// Connect to the first port whose name contains `port_match`
    /// (case-insensitive; empty string takes the first port).
    ///
    /// Mapped events land on `action_tx`; while learn mode is armed the
    /// next note/CC is captured into the table instead and reported on
    /// `learned_tx`.
    pub fn connect(
        port_match: &str,
        mapping: Arc<Mutex<MappingTable>>,
        learn: Arc<Mutex<MidiLearn>>,
        action_tx: Sender<ControlAction>,
        learned_tx: Sender<LearnedBinding>,
    ) -> Result<Self, MidiError> {
        let midi_in = MidiInput::new("tandem").map_err(|e| MidiError::Init(e.to_string()))?;

        let wanted = port_match.to_ascii_lowercase();
        let ports = midi_in.ports();
        let port = ports
            .iter()
            .find(|p| {
                midi_in
                    .port_name(p)
                    .map(|name| wanted.is_empty() || name.to_ascii_lowercase().contains(&wanted))
                    .unwrap_or(false)
            })
            .ok_or_else(|| MidiError::PortNotFound(port_match.to_string()))?;
        let port_name = midi_in
            .port_name(port)
            .unwrap_or_else(|_| "unknown".to_string());

        let connection = midi_in
            .connect(
                port,
                "tandem-input",
                move |_timestamp, bytes, _| {
                    let Some(event) = MidiEvent::parse(bytes) else {
                        return;
                    };
                    tracing::trace!(?event, "midi in");

                    if let Some(binding) = learn.lock().observe(&event) {
                        mapping.lock().apply(binding.key, binding.target);
                        tracing::info!(?binding.key, ?binding.target, "midi learn captured");
                        let _ = learned_tx.try_send(binding);
                        return;
                    }

                    match mapping.lock().map_event(&event) {
                        Some(action) => {
                            if action_tx.try_send(action).is_err() {
                                tracing::warn!("action channel full, midi message dropped");
                            }
                        }
                        None => tracing::trace!(?event, "unmapped midi message"),
                    }
                },
                (),
            )
            .map_err(|e| MidiError::Connection(e.to_string()))?;

        tracing::info!(port = %port_name, "midi input connected");
        Ok(Self {
            _connection: connection,
            port_name,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_note_on() {
        let event = MidiEvent::parse(&[0x90, 0x3C, 0x7F]).unwrap();
        assert_eq!(
            event,
            MidiEvent::NoteOn {
                channel: 0,
                note: 0x3C,
                velocity: 0x7F
            }
        );
    }

    #[test]
    fn test_parse_note_on_zero_velocity_is_note_off() {
        let event = MidiEvent::parse(&[0x91, 0x3C, 0x00]).unwrap();
        assert_eq!(
            event,
            MidiEvent::NoteOff {
                channel: 1,
                note: 0x3C
            }
        );
    }

    #[test]
    fn test_parse_note_off() {
        let event = MidiEvent::parse(&[0x82, 0x40, 0x40]).unwrap();
        assert_eq!(
            event,
            MidiEvent::NoteOff {
                channel: 2,
                note: 0x40
            }
        );
    }

    #[test]
    fn test_parse_control_change() {
        let event = MidiEvent::parse(&[0xB3, 0x07, 0x64]).unwrap();
        assert_eq!(
            event,
            MidiEvent::ControlChange {
                channel: 3,
                cc: 0x07,
                value: 0x64
            }
        );
    }

    #[test]
    fn test_parse_pitch_bend_14_bit() {
        // lsb=0x68, msb=0x3F -> 0x3F << 7 | 0x68 = 8168
        let event = MidiEvent::parse(&[0xE0, 0x68, 0x3F]).unwrap();
        assert_eq!(
            event,
            MidiEvent::PitchBend {
                channel: 0,
                value: 8_168
            }
        );

        let max = MidiEvent::parse(&[0xE1, 0x7F, 0x7F]).unwrap();
        assert_eq!(
            max,
            MidiEvent::PitchBend {
                channel: 1,
                value: 16_383
            }
        );
    }

    #[test]
    fn test_parse_ignores_unknown_and_short() {
        assert_eq!(MidiEvent::parse(&[0xF8]), None);
        assert_eq!(MidiEvent::parse(&[0xA0, 0x01, 0x02]), None);
        assert_eq!(MidiEvent::parse(&[0x90, 0x3C]), None);
    }
}
