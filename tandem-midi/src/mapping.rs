//! Control-to-action mapping
//!
//! The binder is a table: note addresses map to button targets, CC
//! addresses to continuous targets with a per-target value conversion, and
//! pitch bend to the tempo fader. Unmapped messages are ignored. Learn
//! mode rebinds a named target to the next address seen on the wire.

use std::collections::HashMap;

use tandem_audio::DeckId;

use crate::actions::ControlAction;
use crate::input::MidiEvent;

/// Tempo fader swing: pitch bend extremes reach 1.0 +/- 0.41.
const TEMPO_BEND_SWING: f32 = 0.41;
/// Pitch bend centre for the reference controller's tempo fader.
const TEMPO_BEND_CENTRE: f32 = 8_184.0;
/// Track seconds per jog encoder tick.
const JOG_SECONDS_PER_TICK: f64 = 0.005;

/// Everything a physical control can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlTarget {
    // Button targets, bound to notes.
    PlayPause(DeckId),
    CuePoint(DeckId),
    CueJump(DeckId),
    Sync(DeckId),
    HotCue(DeckId, u8),
    HeadphoneCue(DeckId),
    JogTouch(DeckId),
    // Continuous targets, bound to CCs.
    Volume(DeckId),
    EqLow(DeckId),
    EqMid(DeckId),
    EqHigh(DeckId),
    JogWheel(DeckId),
    Crossfader,
    MasterVolume,
    // Bound to pitch bend.
    TempoFader(DeckId),
}

impl ControlTarget {
    /// Stable name used as the label in the persisted mapping store.
    pub fn slot_name(&self) -> String {
        fn deck(d: DeckId) -> &'static str {
            match d {
                DeckId::A => "deck_a",
                DeckId::B => "deck_b",
            }
        }
        match self {
            Self::PlayPause(d) => format!("{}.play", deck(*d)),
            Self::CuePoint(d) => format!("{}.cue_set", deck(*d)),
            Self::CueJump(d) => format!("{}.cue_jump", deck(*d)),
            Self::Sync(d) => format!("{}.sync", deck(*d)),
            Self::HotCue(d, slot) => format!("{}.hot_cue_{slot}", deck(*d)),
            Self::HeadphoneCue(d) => format!("{}.headphone_cue", deck(*d)),
            Self::JogTouch(d) => format!("{}.jog_touch", deck(*d)),
            Self::Volume(d) => format!("{}.volume", deck(*d)),
            Self::EqLow(d) => format!("{}.eq_low", deck(*d)),
            Self::EqMid(d) => format!("{}.eq_mid", deck(*d)),
            Self::EqHigh(d) => format!("{}.eq_high", deck(*d)),
            Self::JogWheel(d) => format!("{}.jog_wheel", deck(*d)),
            Self::TempoFader(d) => format!("{}.tempo", deck(*d)),
            Self::Crossfader => "mixer.crossfader".into(),
            Self::MasterVolume => "mixer.master_volume".into(),
        }
    }

    /// Inverse of `slot_name`.
    pub fn from_slot_name(name: &str) -> Option<Self> {
        if let Some(rest) = name.strip_prefix("mixer.") {
            return match rest {
                "crossfader" => Some(Self::Crossfader),
                "master_volume" => Some(Self::MasterVolume),
                _ => None,
            };
        }
        let (deck, rest) = if let Some(rest) = name.strip_prefix("deck_a.") {
            (DeckId::A, rest)
        } else if let Some(rest) = name.strip_prefix("deck_b.") {
            (DeckId::B, rest)
        } else {
            return None;
        };
        if let Some(slot) = rest.strip_prefix("hot_cue_") {
            let slot: u8 = slot.parse().ok()?;
            return (slot < 4).then_some(Self::HotCue(deck, slot));
        }
        match rest {
            "play" => Some(Self::PlayPause(deck)),
            "cue_set" => Some(Self::CuePoint(deck)),
            "cue_jump" => Some(Self::CueJump(deck)),
            "sync" => Some(Self::Sync(deck)),
            "headphone_cue" => Some(Self::HeadphoneCue(deck)),
            "jog_touch" => Some(Self::JogTouch(deck)),
            "volume" => Some(Self::Volume(deck)),
            "eq_low" => Some(Self::EqLow(deck)),
            "eq_mid" => Some(Self::EqMid(deck)),
            "eq_high" => Some(Self::EqHigh(deck)),
            "jog_wheel" => Some(Self::JogWheel(deck)),
            "tempo" => Some(Self::TempoFader(deck)),
            _ => None,
        }
    }

    fn is_button(&self) -> bool {
        matches!(
            self,
            Self::PlayPause(_)
                | Self::CuePoint(_)
                | Self::CueJump(_)
                | Self::Sync(_)
                | Self::HotCue(_, _)
                | Self::HeadphoneCue(_)
                | Self::JogTouch(_)
        )
    }
}

/// Physical address of a control, the key side of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKey {
    Note { channel: u8, note: u8 },
    Cc { channel: u8, cc: u8 },
    Bend { channel: u8 },
}

impl ControlKey {
    /// Stable form used as the key in the persisted mapping store.
    pub fn to_store_key(self) -> String {
        match self {
            Self::Note { channel, note } => format!("note:{channel}:{note}"),
            Self::Cc { channel, cc } => format!("cc:{channel}:{cc}"),
            Self::Bend { channel } => format!("bend:{channel}"),
        }
    }

    /// Inverse of `to_store_key`.
    pub fn from_store_key(key: &str) -> Option<Self> {
        let mut parts = key.split(':');
        match parts.next()? {
            "note" => Some(Self::Note {
                channel: parts.next()?.parse().ok()?,
                note: parts.next()?.parse().ok()?,
            }),
            "cc" => Some(Self::Cc {
                channel: parts.next()?.parse().ok()?,
                cc: parts.next()?.parse().ok()?,
            }),
            "bend" => Some(Self::Bend {
                channel: parts.next()?.parse().ok()?,
            }),
            _ => None,
        }
    }

    fn for_event(event: &MidiEvent) -> Self {
        match *event {
            MidiEvent::NoteOn { channel, note, .. } | MidiEvent::NoteOff { channel, note } => {
                Self::Note { channel, note }
            }
            MidiEvent::ControlChange { channel, cc, .. } => Self::Cc { channel, cc },
            MidiEvent::PitchBend { channel, .. } => Self::Bend { channel },
        }
    }
}

/// The mapping table for one controller.
pub struct MappingTable {
    notes: HashMap<(u8, u8), ControlTarget>,
    ccs: HashMap<(u8, u8), ControlTarget>,
    bends: HashMap<u8, ControlTarget>,
}

impl Default for MappingTable {
    fn default() -> Self {
        Self::reference_device()
    }
}

impl MappingTable {
    pub fn empty() -> Self {
        Self {
            notes: HashMap::new(),
            ccs: HashMap::new(),
            bends: HashMap::new(),
        }
    }

    /// Factory mapping for the reference two-channel controller: deck A on
    /// MIDI channel 0, deck B on channel 1, mixer controls on channel 0.
    pub fn reference_device() -> Self {
        let mut table = Self::empty();
        for (channel, deck) in [(0u8, DeckId::A), (1u8, DeckId::B)] {
            table.bind(
                ControlKey::Note {
                    channel,
                    note: 0x0B,
                },
                ControlTarget::PlayPause(deck),
            );
            table.bind(
                ControlKey::Note {
                    channel,
                    note: 0x0C,
                },
                ControlTarget::CuePoint(deck),
            );
            table.bind(
                ControlKey::Note {
                    channel,
                    note: 0x0D,
                },
                ControlTarget::CueJump(deck),
            );
            table.bind(
                ControlKey::Note {
                    channel,
                    note: 0x58,
                },
                ControlTarget::Sync(deck),
            );
            for slot in 0..4u8 {
                table.bind(
                    ControlKey::Note {
                        channel,
                        note: slot,
                    },
                    ControlTarget::HotCue(deck, slot),
                );
            }
            table.bind(
                ControlKey::Note {
                    channel,
                    note: 0x54,
                },
                ControlTarget::HeadphoneCue(deck),
            );
            table.bind(
                ControlKey::Note {
                    channel,
                    note: 0x36,
                },
                ControlTarget::JogTouch(deck),
            );

            table.bind(
                ControlKey::Cc { channel, cc: 0x13 },
                ControlTarget::Volume(deck),
            );
            table.bind(
                ControlKey::Cc { channel, cc: 0x07 },
                ControlTarget::EqHigh(deck),
            );
            table.bind(
                ControlKey::Cc { channel, cc: 0x0B },
                ControlTarget::EqMid(deck),
            );
            table.bind(
                ControlKey::Cc { channel, cc: 0x0F },
                ControlTarget::EqLow(deck),
            );
            table.bind(
                ControlKey::Cc { channel, cc: 0x22 },
                ControlTarget::JogWheel(deck),
            );
            table.bind(ControlKey::Bend { channel }, ControlTarget::TempoFader(deck));
        }
        table.bind(
            ControlKey::Cc {
                channel: 0,
                cc: 0x1F,
            },
            ControlTarget::Crossfader,
        );
        table.bind(
            ControlKey::Cc {
                channel: 0,
                cc: 0x18,
            },
            ControlTarget::MasterVolume,
        );
        table
    }

    /// Bind an address to a target, replacing any previous binding of that
    /// address.
    pub fn bind(&mut self, key: ControlKey, target: ControlTarget) {
        match key {
            ControlKey::Note { channel, note } => {
                self.notes.insert((channel, note), target);
            }
            ControlKey::Cc { channel, cc } => {
                self.ccs.insert((channel, cc), target);
            }
            ControlKey::Bend { channel } => {
                self.bends.insert(channel, target);
            }
        }
    }

    /// Apply a learned binding: the target moves to the new address and
    /// abandons its old one.
    pub fn apply(&mut self, key: ControlKey, target: ControlTarget) {
        self.notes.retain(|_, t| *t != target);
        self.ccs.retain(|_, t| *t != target);
        self.bends.retain(|_, t| *t != target);
        self.bind(key, target);
    }

    /// Translate a MIDI event into an action. `None` means unmapped (or a
    /// button release that carries no action) and is silently ignored.
    pub fn map_event(&self, event: &MidiEvent) -> Option<ControlAction> {
        match *event {
            MidiEvent::NoteOn { channel, note, .. } => {
                let target = self.notes.get(&(channel, note))?;
                Some(match *target {
                    ControlTarget::PlayPause(d) => ControlAction::TogglePlayPause(d),
                    ControlTarget::CuePoint(d) => ControlAction::SetCuePoint(d),
                    ControlTarget::CueJump(d) => ControlAction::JumpToCue(d),
                    ControlTarget::Sync(d) => ControlAction::Sync(d),
                    ControlTarget::HotCue(d, slot) => ControlAction::TriggerHotCue(d, slot),
                    ControlTarget::HeadphoneCue(d) => ControlAction::ToggleHeadphoneCue(d),
                    ControlTarget::JogTouch(d) => ControlAction::JogTouch(d, true),
                    _ => return None,
                })
            }
            MidiEvent::NoteOff { channel, note } => match self.notes.get(&(channel, note)) {
                Some(ControlTarget::JogTouch(d)) => Some(ControlAction::JogTouch(*d, false)),
                _ => None,
            },
            MidiEvent::ControlChange { channel, cc, value } => {
                let target = self.ccs.get(&(channel, cc))?;
                Some(match *target {
                    ControlTarget::Volume(d) => ControlAction::SetVolume(d, unit_from_cc(value)),
                    ControlTarget::Crossfader => ControlAction::SetCrossfader(unit_from_cc(value)),
                    ControlTarget::MasterVolume => {
                        ControlAction::SetMasterVolume(unit_from_cc(value))
                    }
                    ControlTarget::EqLow(d) => ControlAction::SetEqLow(d, eq_db_from_cc(value)),
                    ControlTarget::EqMid(d) => ControlAction::SetEqMid(d, eq_db_from_cc(value)),
                    ControlTarget::EqHigh(d) => ControlAction::SetEqHigh(d, eq_db_from_cc(value)),
                    ControlTarget::JogWheel(d) => {
                        ControlAction::JogRotate(d, jog_seconds_from_cc(value))
                    }
                    _ => return None,
                })
            }
            MidiEvent::PitchBend { channel, value } => {
                match self.bends.get(&channel) {
                    Some(ControlTarget::TempoFader(d)) => {
                        Some(ControlAction::SetTempo(*d, tempo_from_bend(value)))
                    }
                    _ => None,
                }
            }
        }
    }
}

/// Linear fader conversion for volumes and the crossfader.
fn unit_from_cc(value: u8) -> f32 {
    value as f32 / 127.0
}

/// Centred EQ conversion: 64 is flat, extremes are +/-12 dB.
fn eq_db_from_cc(value: u8) -> f32 {
    (value as f32 - 64.0) / 64.0 * 12.0
}

/// Relative encoder: 1-63 clockwise, 65-127 counter-clockwise (two's
/// complement in 7 bits).
fn jog_seconds_from_cc(value: u8) -> f64 {
    let ticks = if value < 64 {
        value as i32
    } else {
        value as i32 - 128
    };
    ticks as f64 * JOG_SECONDS_PER_TICK
}

/// Tempo fader from 14-bit pitch bend, centred at 8184 for the reference
/// device.
fn tempo_from_bend(raw: u16) -> f32 {
    1.0 + ((raw as f32 - TEMPO_BEND_CENTRE) / TEMPO_BEND_CENTRE) * TEMPO_BEND_SWING
}

/// A captured learn-mode binding, ready to persist.
#[derive(Debug, Clone, Copy)]
pub struct LearnedBinding {
    pub key: ControlKey,
    pub target: ControlTarget,
}

/// MIDI-Learn: arm a target, and the next note or CC on the wire becomes
/// its binding.
#[derive(Default)]
pub struct MidiLearn {
    armed: Option<ControlTarget>,
}

impl MidiLearn {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm learn mode for a named target.
    pub fn arm(&mut self, target: ControlTarget) {
        self.armed = Some(target);
    }

    pub fn cancel(&mut self) {
        self.armed = None;
    }

    pub fn armed(&self) -> Option<ControlTarget> {
        self.armed
    }

    /// Feed an event through learn mode. Returns the captured binding and
    /// disarms when the event is usable for the armed target; button
    /// targets only accept notes, continuous targets only CCs or bend.
    pub fn observe(&mut self, event: &MidiEvent) -> Option<LearnedBinding> {
        let target = self.armed?;
        let key = ControlKey::for_event(event);
        let compatible = match key {
            ControlKey::Note { .. } => target.is_button(),
            ControlKey::Cc { .. } => !target.is_button() && !matches!(target, ControlTarget::TempoFader(_)),
            ControlKey::Bend { .. } => matches!(target, ControlTarget::TempoFader(_)),
        };
        if !compatible {
            return None;
        }
        self.armed = None;
        Some(LearnedBinding { key, target })
    }
}
