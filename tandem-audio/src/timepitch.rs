//! Granular time/pitch unit
//!
//! Decouples playback rate from pitch with overlapped grains read straight
//! out of the resident track buffer. Two Hann-windowed grains at 50%
//! overlap reconstruct exactly (constant overlap-add); the grain spawn
//! position follows the deck cursor, so tempo is set by how fast the
//! cursor moves while pitch is set by the read step inside each grain.
//!
//! Whenever the two steps coincide the grains degenerate into a straight
//! interpolated read, which the unit detects and short-circuits; at unity
//! that path is bit-exact. No allocation happens after construction and
//! rate/pitch may change on every callback.

use crate::buffer::PreloadedBuffer;

/// Grain length in output frames.
const GRAIN_FRAMES: usize = 1024;
/// Output frames between grain spawns (50% overlap).
const GRAIN_HOP: usize = GRAIN_FRAMES / 2;

#[derive(Clone, Copy, Default)]
struct Grain {
    src_pos: f64,
    age: usize,
    active: bool,
}

/// Streaming granular reader. One per deck, owned by the audio callback.
pub struct TimePitch {
    window: Vec<f32>,
    grains: [Grain; 2],
    spawn_countdown: usize,
}

impl Default for TimePitch {
    fn default() -> Self {
        Self::new()
    }
}

impl TimePitch {
    pub fn new() -> Self {
        // Periodic Hann: pairs at 50% overlap sum to exactly 1.
        let window = (0..GRAIN_FRAMES)
            .map(|i| {
                0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / GRAIN_FRAMES as f32).cos())
            })
            .collect();
        Self {
            window,
            grains: [Grain::default(); 2],
            spawn_countdown: 0,
        }
    }

    /// Drop grain state. Called on load, seek and loop wrap so stale source
    /// positions never bleed across a discontinuity.
    pub fn reset(&mut self) {
        self.grains = [Grain::default(); 2];
        self.spawn_countdown = 0;
    }

    /// Render `out_l.len()` frames, advancing `cursor` by `time_step`
    /// source frames per output frame and reading pitch-shifted content at
    /// `pitch_step` source frames per output frame.
    pub fn render(
        &mut self,
        buffer: &PreloadedBuffer,
        cursor: &mut f64,
        time_step: f64,
        pitch_step: f64,
        out_l: &mut [f32],
        out_r: &mut [f32],
    ) {
        let frames = out_l.len().min(out_r.len());

        if (time_step - pitch_step).abs() < 1e-9 {
            // Rate and pitch agree: plain varispeed. Grains are parked so
            // the next divergent block starts clean.
            self.reset();
            for i in 0..frames {
                let (l, r) = buffer.stereo_frame_at(*cursor);
                out_l[i] = l;
                out_r[i] = r;
                *cursor += time_step;
            }
            return;
        }

        for i in 0..frames {
            if self.spawn_countdown == 0 {
                self.spawn_grain(*cursor);
                self.spawn_countdown = GRAIN_HOP;
            }
            self.spawn_countdown -= 1;

            let mut left = 0.0f32;
            let mut right = 0.0f32;
            for grain in self.grains.iter_mut() {
                if !grain.active {
                    continue;
                }
                let weight = self.window[grain.age];
                let (l, r) = buffer.stereo_frame_at(grain.src_pos);
                left += l * weight;
                right += r * weight;
                grain.src_pos += pitch_step;
                grain.age += 1;
                if grain.age >= GRAIN_FRAMES {
                    grain.active = false;
                }
            }
            out_l[i] = left;
            out_r[i] = right;
            *cursor += time_step;
        }
    }

    fn spawn_grain(&mut self, src_pos: f64) {
        // With a half-grain hop at most one slot is mid-flight here; take
        // the free one, or steal the older if both are somehow live.
        let slot = if !self.grains[0].active {
            0
        } else if !self.grains[1].active {
            1
        } else if self.grains[0].age >= self.grains[1].age {
            0
        } else {
            1
        };
        self.grains[slot] = Grain {
            src_pos,
            age: 0,
            active: true,
        };
    }
}
