//! Deck - one playback channel of the graph
//!
//! The callback-side half of a deck: it owns the resident buffer, the
//! fractional frame cursor, the time/pitch unit and the EQ section, and
//! renders planar stereo blocks on demand. Everything it observes from the
//! control plane arrives through `DeckControls`; everything it reports
//! (position, end-of-track) leaves the same way.

use std::sync::Arc;

use crate::buffer::PreloadedBuffer;
use crate::control::DeckControls;
use crate::eq::ThreeBandEq;
use crate::timepitch::TimePitch;

/// Cents per semitone, the unit the time/pitch stage consumes.
const CENTS_PER_SEMITONE: f64 = 100.0;

pub struct Deck {
    controls: Arc<DeckControls>,
    buffer: Option<Arc<PreloadedBuffer>>,
    timepitch: TimePitch,
    eq: ThreeBandEq,
    cursor: f64,
    output_rate: u32,
}

impl Deck {
    pub fn new(controls: Arc<DeckControls>, output_rate: u32) -> Self {
        Self {
            controls,
            buffer: None,
            timepitch: TimePitch::new(),
            eq: ThreeBandEq::new(output_rate as f32),
            cursor: 0.0,
            output_rate,
        }
    }

    /// Swap in a freshly decoded buffer, returning the evicted one so the
    /// caller can route it off the audio thread for deallocation.
    pub(crate) fn install_buffer(
        &mut self,
        buffer: Arc<PreloadedBuffer>,
    ) -> Option<Arc<PreloadedBuffer>> {
        let evicted = self.buffer.replace(buffer);
        self.cursor = 0.0;
        self.timepitch.reset();
        self.eq.reset();
        evicted
    }

    /// Remove the current buffer, if any.
    pub(crate) fn eject(&mut self) -> Option<Arc<PreloadedBuffer>> {
        let evicted = self.buffer.take();
        self.cursor = 0.0;
        self.timepitch.reset();
        evicted
    }

    /// Render one planar stereo block.
    ///
    /// Advances the cursor by frames x tempo source frames (scaled by the
    /// track/device rate ratio) while playing; writes silence without
    /// advancing otherwise. Reaching the end of the buffer clears the
    /// playing flag and raises the one-shot ended edge.
    pub fn render(&mut self, out_l: &mut [f32], out_r: &mut [f32]) {
        let frames = out_l.len().min(out_r.len());

        if let Some(frame) = self.controls.take_seek() {
            let limit = self.buffer.as_ref().map(|b| b.frames()).unwrap_or(0);
            self.cursor = (frame as f64).min(limit as f64);
            self.timepitch.reset();
        }

        let Some(buffer) = self.buffer.clone() else {
            // No buffer while playing is an impossible state the callback
            // resolves by going silent.
            if self.controls.is_playing() {
                self.controls.set_playing(false);
            }
            silence(out_l, out_r, frames);
            self.controls.publish_position(0);
            return;
        };

        if !self.controls.is_playing() {
            silence(out_l, out_r, frames);
            self.controls.publish_position(self.cursor.round() as u64);
            return;
        }

        let rate_ratio = buffer.sample_rate() as f64 / self.output_rate as f64;
        let time_step = self.controls.tempo() as f64 * rate_ratio;
        let pitch_step =
            (self.controls.pitch() as f64 * CENTS_PER_SEMITONE / 1200.0).exp2() * rate_ratio;

        self.eq.update_gains(self.controls.eq_gains_db());

        let total = buffer.frames() as f64;
        let mut rendered = 0;
        while rendered < frames {
            let loop_region = self
                .controls
                .loop_region()
                .filter(|&(_, end)| self.cursor < end as f64);
            let boundary = loop_region.map(|(_, end)| end as f64).unwrap_or(total);

            let remaining_src = boundary - self.cursor;
            if remaining_src <= 0.0 {
                // Cursor already parked at the end: nothing left to pull.
                self.controls.set_playing(false);
                break;
            }
            let span = if time_step > 0.0 {
                ((remaining_src / time_step).ceil() as usize).max(1)
            } else {
                frames - rendered
            };
            let take = span.min(frames - rendered);

            self.timepitch.render(
                &buffer,
                &mut self.cursor,
                time_step,
                pitch_step,
                &mut out_l[rendered..rendered + take],
                &mut out_r[rendered..rendered + take],
            );
            rendered += take;

            match loop_region {
                Some((start, end)) if self.cursor >= end as f64 => {
                    self.cursor -= (end - start) as f64;
                    self.timepitch.reset();
                }
                _ => {
                    if self.cursor >= total {
                        self.cursor = total;
                        self.controls.set_playing(false);
                        self.controls.raise_ended();
                        break;
                    }
                }
            }
        }

        if rendered < frames {
            silence(&mut out_l[rendered..], &mut out_r[rendered..], frames - rendered);
        }

        if !self.eq.is_bypassable() {
            self.eq.process(&mut out_l[..frames], &mut out_r[..frames]);
        }

        self.controls.publish_position(self.cursor.round() as u64);
    }
}

fn silence(out_l: &mut [f32], out_r: &mut [f32], frames: usize) {
    for s in out_l.iter_mut().take(frames) {
        *s = 0.0;
    }
    for s in out_r.iter_mut().take(frames) {
        *s = 0.0;
    }
}
