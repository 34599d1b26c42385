//! Playback advancer - the segment scheduler
//!
//! For one voice and a requested output-sample count, computes the longest
//! run renderable before the playback cursor hits a loop or end boundary,
//! dispatches that run to the renderer, then resolves the boundary: stop
//! (non-looping end), wrap (straight loop), or reflect (ping-pong). This
//! segmentation is what keeps the inner loops free of per-sample boundary
//! checks.
//!
//! All boundary math runs on the combined 32.16 cursor
//! `(pos << 16) | fpos` in `i64`, so the original's "minus one on a
//! fractional carry" adjustment falls out of exact sub-sample comparisons.

use super::render::{RenderCtx, render_segment, resolve_quality};
use crate::voice::{Voice, voice_flags};

/// Advance `voice` by up to `frames` output samples, accumulating into
/// `acc` (`frames` slots mono, `2 * frames` interleaved stereo).
///
/// Muted voices advance exactly like audible ones but render nothing, so
/// unmuting keeps them in sync. Clears `PLAYING` when a non-looping voice
/// exhausts its waveform.
pub(crate) fn advance_voice(
    ctx: &RenderCtx<'_>,
    voice: &mut Voice,
    acc: &mut [i32],
    frames: usize,
    stereo: bool,
    high_quality: bool,
) {
    if !voice.is_playing() || voice.step == 0 {
        return;
    }
    let Some(sample) = voice.sample.clone() else {
        return;
    };

    // Re-clamp bounds against the actual waveform before trusting them
    let length = voice.length.min(sample.len() as u32);
    if length == 0 {
        return;
    }
    let looped = voice.status & voice_flags::LOOP != 0;
    let pingpong = looped && voice.status & voice_flags::PINGPONG != 0;
    let loop_end = voice.loop_end.min(length);
    let loop_start = voice.loop_start.min(loop_end);
    if looped && loop_start >= loop_end {
        // Degenerate loop would never make progress
        voice.stop();
        return;
    }

    let quality = resolve_quality(voice.status, high_quality);
    let muted = voice.is_muted();

    let end_fx = i64::from(length) << 16;
    let le_fx = i64::from(loop_end) << 16;
    let ls_fx = i64::from(loop_start) << 16;
    let span = le_fx - ls_fx;

    let mut cursor = (i64::from(voice.pos) << 16) | i64::from(voice.fpos);
    let mut step = i64::from(voice.step);
    let mut off = 0usize;
    let mut remain = frames;

    while remain > 0 {
        let forward = step > 0;
        // Nearest boundary in the direction of travel
        let (bound_fx, at_loop) = if forward {
            if looped && cursor < le_fx {
                (le_fx, true)
            } else {
                (end_fx, false)
            }
        } else if looped && cursor >= ls_fx {
            (ls_fx, true)
        } else {
            (0, false)
        };

        // Output samples renderable with every read strictly inside the
        // boundary. Zero means the cursor already sits on it.
        let avail = if forward {
            let dist = bound_fx - 1 - cursor;
            if dist < 0 { 0 } else { dist / step + 1 }
        } else {
            let dist = cursor - bound_fx;
            if dist < 0 { 0 } else { dist / -step + 1 }
        };

        let hits_boundary = avail <= remain as i64;
        let run = avail.min(remain as i64) as usize;

        if run > 0 {
            if !muted {
                let slice = if stereo {
                    &mut acc[off * 2..(off + run) * 2]
                } else {
                    &mut acc[off..off + run]
                };
                render_segment(
                    ctx, &sample, slice, stereo, quality, cursor, step, voice.vol, voice.fvol,
                );
            }
            // Widened product; on overflow the boundary is treated as not
            // reached within this request
            let Some(next) = (run as i64)
                .checked_mul(step)
                .and_then(|adv| cursor.checked_add(adv))
            else {
                break;
            };
            cursor = next;
            off += run;
            remain -= run;
        }

        if !hits_boundary {
            continue;
        }

        // Resolve the boundary the segment ran into
        if forward {
            if !looped {
                voice.stop();
                cursor = end_fx;
                break;
            }
            if pingpong {
                // Triangular fold: two's-complement-style reflection lands
                // strictly inside [loop_start, loop_end)
                let r = (cursor - le_fx).rem_euclid(span * 2);
                if r < span {
                    cursor = le_fx - 1 - r;
                    step = -step.abs();
                } else {
                    cursor = ls_fx + (r - span);
                    step = step.abs();
                }
            } else {
                cursor = ls_fx + (cursor - le_fx).rem_euclid(span);
            }
        } else if !at_loop {
            // Ran out backwards past the first sample
            voice.stop();
            cursor = 0;
            break;
        } else if pingpong {
            let r = (ls_fx - 1 - cursor).rem_euclid(span * 2);
            if r < span {
                cursor = ls_fx + r;
                step = step.abs();
            } else {
                cursor = le_fx - 1 - (r - span);
                step = -step.abs();
            }
        } else {
            // Backward straight loop wraps to the far end
            cursor = le_fx - 1 - (ls_fx - 1 - cursor).rem_euclid(span);
        }
    }

    voice.pos = (cursor >> 16) as u32;
    voice.fpos = (cursor & 0xffff) as u16;
    voice.step = step as i32;
}
