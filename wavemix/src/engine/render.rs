//! Renderer dispatch and inner sample loops
//!
//! A fixed matrix keyed by {mono|stereo} x {i8|i16|f32} x {none|linear|high}
//! selects one of the inner-loop variants below. Each variant walks a
//! combined 32.16 cursor (`cursor += step`, the fractional carry folds into
//! the integer half for free) over a segment the advancer has already
//! bounds-checked, so no loop runs a per-sample boundary branch. Integer
//! formats resolve gain through the split byte-lane tables; float voices
//! use their raw gain scalars and always take the one float renderer, no
//! matter what quality was requested.

use crate::sample::SampleData;
use crate::tables::{GainRows, HQ_FRAC_SHIFT, InterpTables, LIN_FRAC_SHIFT, VolumeTables};
use crate::voice::voice_flags;

/// Resolved interpolation quality for one segment
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Quality {
    None,
    Linear,
    High,
}

/// Map a voice's status bits and the call-level quality request to the
/// renderer quality. A high-quality request upgrades interpolating voices;
/// it never turns interpolation on for voices that don't ask for it.
pub(crate) fn resolve_quality(status: u32, high_quality: bool) -> Quality {
    if status & voice_flags::INTERPOLATE_HQ != 0 {
        Quality::High
    } else if status & voice_flags::INTERPOLATE != 0 {
        if high_quality {
            Quality::High
        } else {
            Quality::Linear
        }
    } else {
        Quality::None
    }
}

/// Shared table references handed down from the engine
pub(crate) struct RenderCtx<'a> {
    pub vol: &'a VolumeTables,
    pub interp: &'a InterpTables,
}

/// Render one segment of `sample` into the accumulator slice.
///
/// `acc` holds exactly one slot per output sample (two per frame when
/// `stereo`). The caller guarantees every integer read position of the walk
/// stays inside the waveform; the interpolation `+1` tap clamps at the last
/// sample (the classic padded-buffer trick expressed on checked slices).
#[allow(clippy::too_many_arguments)]
pub(crate) fn render_segment(
    ctx: &RenderCtx<'_>,
    sample: &SampleData,
    acc: &mut [i32],
    stereo: bool,
    quality: Quality,
    cursor: i64,
    step: i64,
    vol: [u8; 2],
    fvol: [f32; 2],
) {
    debug_assert!(!sample.is_empty());

    let gl = ctx.vol.rows(vol[0]);
    let gr = ctx.vol.rows(vol[1]);
    let lin = ctx.interp.linear();
    let hq = ctx.interp.high();

    match (sample, stereo, quality) {
        // Float format ignores the quality flags entirely
        (SampleData::F32(data), false, _) => mix_mono_f32(acc, data, cursor, step, fvol[0]),
        (SampleData::F32(data), true, _) => mix_stereo_f32(acc, data, cursor, step, fvol),

        (SampleData::I8(data), false, Quality::None) => mix_mono_i8(acc, data, cursor, step, gl),
        (SampleData::I8(data), false, Quality::Linear) => {
            mix_mono_i8_ipol(acc, data, cursor, step, gl, lin, LIN_FRAC_SHIFT)
        }
        (SampleData::I8(data), false, Quality::High) => {
            mix_mono_i8_ipol(acc, data, cursor, step, gl, hq, HQ_FRAC_SHIFT)
        }
        (SampleData::I8(data), true, Quality::None) => {
            mix_stereo_i8(acc, data, cursor, step, gl, gr)
        }
        (SampleData::I8(data), true, Quality::Linear) => {
            mix_stereo_i8_ipol(acc, data, cursor, step, gl, gr, lin, LIN_FRAC_SHIFT)
        }
        (SampleData::I8(data), true, Quality::High) => {
            mix_stereo_i8_ipol(acc, data, cursor, step, gl, gr, hq, HQ_FRAC_SHIFT)
        }

        (SampleData::I16(data), false, Quality::None) => mix_mono_i16(acc, data, cursor, step, gl),
        (SampleData::I16(data), false, Quality::Linear) => {
            mix_mono_i16_ipol(acc, data, cursor, step, gl, lin, LIN_FRAC_SHIFT)
        }
        (SampleData::I16(data), false, Quality::High) => {
            mix_mono_i16_ipol(acc, data, cursor, step, gl, hq, HQ_FRAC_SHIFT)
        }
        (SampleData::I16(data), true, Quality::None) => {
            mix_stereo_i16(acc, data, cursor, step, gl, gr)
        }
        (SampleData::I16(data), true, Quality::Linear) => {
            mix_stereo_i16_ipol(acc, data, cursor, step, gl, gr, lin, LIN_FRAC_SHIFT)
        }
        (SampleData::I16(data), true, Quality::High) => {
            mix_stereo_i16_ipol(acc, data, cursor, step, gl, gr, hq, HQ_FRAC_SHIFT)
        }
    }
}

/// One 8-bit tap promoted to 16-bit scale, index clamped to the last sample
#[inline]
fn tap_i8(data: &[i8], idx: usize, last: usize) -> i32 {
    i32::from(data[idx.min(last)]) << 8
}

#[inline]
fn tap_i16(data: &[i16], idx: usize, last: usize) -> i32 {
    i32::from(data[idx.min(last)])
}

/// Combine two taps through the weight rows, keyed by each tap's high byte
#[inline]
fn ipol(tab: &[[i32; 256]], f: usize, a: i32, b: i32) -> i32 {
    let steps = tab.len() - 1;
    tab[steps - f][((a >> 8) & 0xff) as usize] + tab[f][((b >> 8) & 0xff) as usize]
}

/// Fraction index for the given weight table resolution
#[inline]
fn frac_index(tab: &[[i32; 256]], cursor: i64, shift: u32) -> usize {
    ((cursor >> shift) as usize) & (tab.len() - 2)
}

fn mix_mono_i8(acc: &mut [i32], data: &[i8], mut cursor: i64, step: i64, g: GainRows<'_>) {
    let last = data.len() - 1;
    for slot in acc.iter_mut() {
        *slot += g.apply(tap_i8(data, (cursor >> 16) as usize, last));
        cursor += step;
    }
}

fn mix_mono_i16(acc: &mut [i32], data: &[i16], mut cursor: i64, step: i64, g: GainRows<'_>) {
    let last = data.len() - 1;
    for slot in acc.iter_mut() {
        *slot += g.apply(tap_i16(data, (cursor >> 16) as usize, last));
        cursor += step;
    }
}

fn mix_mono_i8_ipol(
    acc: &mut [i32],
    data: &[i8],
    mut cursor: i64,
    step: i64,
    g: GainRows<'_>,
    tab: &[[i32; 256]],
    shift: u32,
) {
    let last = data.len() - 1;
    for slot in acc.iter_mut() {
        let idx = (cursor >> 16) as usize;
        let f = frac_index(tab, cursor, shift);
        let v = ipol(tab, f, tap_i8(data, idx, last), tap_i8(data, idx + 1, last));
        *slot += g.apply(v);
        cursor += step;
    }
}

fn mix_mono_i16_ipol(
    acc: &mut [i32],
    data: &[i16],
    mut cursor: i64,
    step: i64,
    g: GainRows<'_>,
    tab: &[[i32; 256]],
    shift: u32,
) {
    let last = data.len() - 1;
    for slot in acc.iter_mut() {
        let idx = (cursor >> 16) as usize;
        let f = frac_index(tab, cursor, shift);
        let v = ipol(tab, f, tap_i16(data, idx, last), tap_i16(data, idx + 1, last));
        *slot += g.apply(v);
        cursor += step;
    }
}

fn mix_stereo_i8(
    acc: &mut [i32],
    data: &[i8],
    mut cursor: i64,
    step: i64,
    gl: GainRows<'_>,
    gr: GainRows<'_>,
) {
    let last = data.len() - 1;
    for frame in acc.chunks_exact_mut(2) {
        let v = tap_i8(data, (cursor >> 16) as usize, last);
        frame[0] += gl.apply(v);
        frame[1] += gr.apply(v);
        cursor += step;
    }
}

fn mix_stereo_i16(
    acc: &mut [i32],
    data: &[i16],
    mut cursor: i64,
    step: i64,
    gl: GainRows<'_>,
    gr: GainRows<'_>,
) {
    let last = data.len() - 1;
    for frame in acc.chunks_exact_mut(2) {
        let v = tap_i16(data, (cursor >> 16) as usize, last);
        frame[0] += gl.apply(v);
        frame[1] += gr.apply(v);
        cursor += step;
    }
}

#[allow(clippy::too_many_arguments)]
fn mix_stereo_i8_ipol(
    acc: &mut [i32],
    data: &[i8],
    mut cursor: i64,
    step: i64,
    gl: GainRows<'_>,
    gr: GainRows<'_>,
    tab: &[[i32; 256]],
    shift: u32,
) {
    let last = data.len() - 1;
    for frame in acc.chunks_exact_mut(2) {
        let idx = (cursor >> 16) as usize;
        let f = frac_index(tab, cursor, shift);
        let v = ipol(tab, f, tap_i8(data, idx, last), tap_i8(data, idx + 1, last));
        frame[0] += gl.apply(v);
        frame[1] += gr.apply(v);
        cursor += step;
    }
}

#[allow(clippy::too_many_arguments)]
fn mix_stereo_i16_ipol(
    acc: &mut [i32],
    data: &[i16],
    mut cursor: i64,
    step: i64,
    gl: GainRows<'_>,
    gr: GainRows<'_>,
    tab: &[[i32; 256]],
    shift: u32,
) {
    let last = data.len() - 1;
    for frame in acc.chunks_exact_mut(2) {
        let idx = (cursor >> 16) as usize;
        let f = frac_index(tab, cursor, shift);
        let v = ipol(tab, f, tap_i16(data, idx, last), tap_i16(data, idx + 1, last));
        frame[0] += gl.apply(v);
        frame[1] += gr.apply(v);
        cursor += step;
    }
}

fn mix_mono_f32(acc: &mut [i32], data: &[f32], mut cursor: i64, step: i64, gain: f32) {
    let last = data.len() - 1;
    for slot in acc.iter_mut() {
        let s = data[((cursor >> 16) as usize).min(last)];
        *slot += (s * gain * 32768.0) as i32;
        cursor += step;
    }
}

fn mix_stereo_f32(acc: &mut [i32], data: &[f32], mut cursor: i64, step: i64, fvol: [f32; 2]) {
    let last = data.len() - 1;
    for frame in acc.chunks_exact_mut(2) {
        let s = data[((cursor >> 16) as usize).min(last)];
        frame[0] += (s * fvol[0] * 32768.0) as i32;
        frame[1] += (s * fvol[1] * 32768.0) as i32;
        cursor += step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::STEP_ONE;
    use std::sync::Arc;

    fn tables() -> (VolumeTables, InterpTables) {
        (VolumeTables::build().unwrap(), InterpTables::build().unwrap())
    }

    #[test]
    fn test_resolve_quality() {
        assert_eq!(resolve_quality(0, false), Quality::None);
        assert_eq!(resolve_quality(0, true), Quality::None);
        assert_eq!(resolve_quality(voice_flags::INTERPOLATE, false), Quality::Linear);
        assert_eq!(resolve_quality(voice_flags::INTERPOLATE, true), Quality::High);
        assert_eq!(resolve_quality(voice_flags::INTERPOLATE_HQ, false), Quality::High);
    }

    #[test]
    fn test_mono_i8_accumulates_at_full_volume() {
        let (vol, interp) = tables();
        let ctx = RenderCtx { vol: &vol, interp: &interp };
        let sample = SampleData::I8(Arc::new(vec![-128i8, 0, 127]));
        let mut acc = [0i32; 3];
        render_segment(
            &ctx, &sample, &mut acc, false, Quality::None,
            0, i64::from(STEP_ONE), [64, 64], [0.0; 2],
        );
        assert_eq!(acc, [-128 << 8, 0, 127 << 8]);
    }

    #[test]
    fn test_mono_i8_linear_midpoint() {
        let (vol, interp) = tables();
        let ctx = RenderCtx { vol: &vol, interp: &interp };
        let sample = SampleData::I8(Arc::new(vec![0i8, 64]));
        let mut acc = [0i32; 2];
        render_segment(
            &ctx, &sample, &mut acc, false, Quality::Linear,
            0, i64::from(STEP_ONE / 2), [64, 64], [0.0; 2],
        );
        // Tap 0 exactly, then halfway between 0 and 64<<8
        assert_eq!(acc, [0, (64 << 8) / 2]);
    }

    #[test]
    fn test_stereo_applies_per_side_gain() {
        let (vol, interp) = tables();
        let ctx = RenderCtx { vol: &vol, interp: &interp };
        let sample = SampleData::I16(Arc::new(vec![1000i16, -2000]));
        let mut acc = [0i32; 4];
        render_segment(
            &ctx, &sample, &mut acc, true, Quality::None,
            0, i64::from(STEP_ONE), [64, 32], [0.0; 2],
        );
        assert_eq!(acc, [1000, 500, -2000, -1000]);
    }

    #[test]
    fn test_float_ignores_quality_and_uses_scalars() {
        let (vol, interp) = tables();
        let ctx = RenderCtx { vol: &vol, interp: &interp };
        let sample = SampleData::F32(Arc::new(vec![0.5f32, -0.25]));
        for quality in [Quality::None, Quality::Linear, Quality::High] {
            let mut acc = [0i32; 2];
            render_segment(
                &ctx, &sample, &mut acc, false, quality,
                0, i64::from(STEP_ONE), [0, 0], [1.0, 1.0],
            );
            assert_eq!(acc, [16384, -8192], "quality {quality:?}");
        }
    }

    #[test]
    fn test_interp_tap_clamps_at_end() {
        let (vol, interp) = tables();
        let ctx = RenderCtx { vol: &vol, interp: &interp };
        let sample = SampleData::I8(Arc::new(vec![100i8]));
        let mut acc = [0i32; 1];
        // Only sample: the +1 tap clamps back onto it
        render_segment(
            &ctx, &sample, &mut acc, false, Quality::High,
            0x8000, i64::from(STEP_ONE), [64, 64], [0.0; 2],
        );
        assert_eq!(acc, [100 << 8]);
    }
}
