//! VU/amplitude estimation
//!
//! Read-only loudness scan for meters. Walks a voice's waveform at the
//! voice's step magnitude, honoring straight loop wraparound (never
//! ping-pong direction flips), and sums absolute 16-bit-scale magnitudes.
//! Operates on the voice by value semantics - the live `pos`/`fpos` are
//! never touched, and nothing here goes through the quantize path.

use crate::sample::SampleData;
use crate::voice::{Voice, voice_flags};

/// Sum of absolute sample magnitudes over up to `count` steps of the
/// voice's waveform, starting at its current position.
///
/// Returns `(sum, scanned)`; `scanned` falls short of `count` when a
/// non-looping waveform runs out.
pub(crate) fn scan_magnitude(voice: &Voice, count: u32) -> (u64, u32) {
    let Some(sample) = voice.sample.as_ref() else {
        return (0, 0);
    };
    if sample.is_empty() || voice.step == 0 {
        return (0, 0);
    }

    let length = voice.length.min(sample.len() as u32);
    if length == 0 {
        return (0, 0);
    }
    let looped = voice.status & voice_flags::LOOP != 0;
    let loop_end = voice.loop_end.min(length);
    let loop_start = voice.loop_start.min(loop_end);
    let span = i64::from(loop_end - loop_start) << 16;

    // Magnitude-only walk: direction never flips here
    let step = i64::from(voice.step.unsigned_abs());
    let end_fx = i64::from(length) << 16;
    let le_fx = i64::from(loop_end) << 16;
    let ls_fx = i64::from(loop_start) << 16;

    let mut cursor = (i64::from(voice.pos) << 16) | i64::from(voice.fpos);
    let mut sum = 0u64;
    let mut scanned = 0u32;
    while scanned < count {
        if looped && span > 0 && cursor >= le_fx {
            cursor = ls_fx + (cursor - le_fx) % span;
        }
        if cursor >= end_fx {
            break;
        }
        sum += u64::from(magnitude16(sample, (cursor >> 16) as usize));
        scanned += 1;
        cursor += step;
    }
    (sum, scanned)
}

/// Absolute value of one sample at 16-bit scale
#[inline]
fn magnitude16(sample: &SampleData, idx: usize) -> u32 {
    match sample {
        SampleData::I8(data) => (i32::from(data[idx]) << 8).unsigned_abs(),
        SampleData::I16(data) => i32::from(data[idx]).unsigned_abs(),
        SampleData::F32(data) => ((data[idx].clamp(-1.0, 1.0) * 32768.0) as i32).unsigned_abs(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::STEP_ONE;
    use std::sync::Arc;

    fn test_voice(data: Vec<i16>) -> Voice {
        let mut voice = Voice::default();
        voice.set_sample(SampleData::I16(Arc::new(data)));
        voice.set_step(STEP_ONE);
        voice.play();
        voice
    }

    #[test]
    fn test_scan_stops_at_end_without_loop() {
        let voice = test_voice(vec![100, -200, 300]);
        let (sum, scanned) = scan_magnitude(&voice, 10);
        assert_eq!(scanned, 3);
        assert_eq!(sum, 600);
    }

    #[test]
    fn test_scan_wraps_forward_loop() {
        let mut voice = test_voice(vec![0, 1000, 2000, 3000]);
        voice.set_loop(1, 3, false);
        let (sum, scanned) = scan_magnitude(&voice, 7);
        // 0, 1000, 2000, then wrap: 1000, 2000, 1000, 2000
        assert_eq!(scanned, 7);
        assert_eq!(sum, 9000);
    }

    #[test]
    fn test_scan_ignores_pingpong_direction() {
        let mut voice = test_voice(vec![0, 1000, 2000, 3000]);
        voice.set_loop(1, 3, true);
        voice.step = -STEP_ONE;
        voice.pos = 1;
        // Walks forward by |step| and wraps straight, never reflecting
        let (sum, scanned) = scan_magnitude(&voice, 4);
        assert_eq!(scanned, 4);
        assert_eq!(sum, 1000 + 2000 + 1000 + 2000);
    }

    #[test]
    fn test_scan_does_not_mutate_voice() {
        let voice = test_voice(vec![5; 64]);
        let pos_before = (voice.pos, voice.fpos);
        let _ = scan_magnitude(&voice, 32);
        assert_eq!((voice.pos, voice.fpos), pos_before);
    }

    #[test]
    fn test_scan_frozen_or_empty() {
        let mut voice = test_voice(vec![1, 2, 3]);
        voice.step = 0;
        assert_eq!(scan_magnitude(&voice, 8), (0, 0));

        let voice = Voice::default();
        assert_eq!(scan_magnitude(&voice, 8), (0, 0));
    }
}
