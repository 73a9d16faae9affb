//! Mixer - crossfader law and effective deck gains
//!
//! The mixer is a pure function of its inputs, recomputed every callback
//! from the published control words. No state, no smoothing; the faders
//! themselves move slowly enough that zipper noise is not a concern at
//! callback granularity.

/// Linear-cut crossfader: the near deck stays at unity until the far half
/// of the travel. At 0 only deck A sounds, at 1 only deck B, at centre
/// both are at unity.
pub fn crossfader_gains(position: f32) -> (f32, f32) {
    let x = position.clamp(0.0, 1.0);
    if x <= 0.5 {
        (1.0, 2.0 * x)
    } else {
        (2.0 * (1.0 - x), 1.0)
    }
}

/// Effective per-deck gains: channel fader x crossfader leg x master.
pub fn deck_gains(
    crossfader: f32,
    fader_a: f32,
    fader_b: f32,
    master: f32,
) -> (f32, f32) {
    let (leg_a, leg_b) = crossfader_gains(crossfader);
    (fader_a * leg_a * master, fader_b * leg_b * master)
}
