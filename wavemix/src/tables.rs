//! Gain, interpolation and clip lookup tables
//!
//! The inner mixing loops never multiply by a gain or an interpolation
//! weight: every scale factor is resolved through tables built once at
//! engine init (gain and weight tables) or on amplify changes (clip
//! tables). All integer contributions are at 16-bit sample scale; the
//! accumulator is `i32`.
//!
//! Table layout:
//! - gain: 65 discrete levels x two 256-entry byte lanes
//!   (`hi[v][b] = (b as i8) * 256 * v / 64`, `lo[v][b] = b * v / 64`)
//! - interpolation weights: `row[w][b] = (b as i8) * 256 * w / STEPS`,
//!   33 rows at linear quality, 257 at high quality
//! - clip: three 256-entry tables over the accumulator's byte lanes plus a
//!   precomputed clamp window derived from the amplify level

use crate::error::MixError;
use crate::voice::VOLUME_MAX;

/// Discrete gain levels (0..=64)
pub(crate) const VOLUME_LEVELS: usize = VOLUME_MAX as usize + 1;

/// Fraction resolution of linear-quality interpolation
pub(crate) const LIN_STEPS: usize = 32;

/// Fraction resolution of high-quality interpolation
pub(crate) const HQ_STEPS: usize = 256;

/// Shift turning a 32.16 cursor into a linear-quality fraction index
pub(crate) const LIN_FRAC_SHIFT: u32 = 11;

/// Shift turning a 32.16 cursor into a high-quality fraction index
pub(crate) const HQ_FRAC_SHIFT: u32 = 8;

/// Widest accumulator magnitude the three clip byte lanes can decompose
pub(crate) const ACC_LANE_CEILING: i64 = 0x007F_FFFF;

/// Gain table rows resolved for one output channel
#[derive(Clone, Copy)]
pub(crate) struct GainRows<'a> {
    pub hi: &'a [i32; 256],
    pub lo: &'a [i32; 256],
}

impl GainRows<'_> {
    /// Scale a 16-bit-scale value through the split byte lanes
    #[inline]
    pub fn apply(&self, value: i32) -> i32 {
        let u = value.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16 as u16 as usize;
        self.hi[u >> 8] + self.lo[u & 0xff]
    }
}

/// Per-level gain tables shared by every integer-format voice
pub(crate) struct VolumeTables {
    hi: Vec<[i32; 256]>,
    lo: Vec<[i32; 256]>,
}

impl VolumeTables {
    pub(crate) fn build() -> Result<Self, MixError> {
        let mut hi = Vec::new();
        hi.try_reserve_exact(VOLUME_LEVELS)
            .map_err(|_| MixError::OutOfMemory)?;
        let mut lo = Vec::new();
        lo.try_reserve_exact(VOLUME_LEVELS)
            .map_err(|_| MixError::OutOfMemory)?;

        for level in 0..VOLUME_LEVELS as i32 {
            let mut hi_row = [0i32; 256];
            let mut lo_row = [0i32; 256];
            for (b, slot) in hi_row.iter_mut().enumerate() {
                *slot = (i32::from(b as u8 as i8) << 8) * level / i32::from(VOLUME_MAX);
            }
            for (b, slot) in lo_row.iter_mut().enumerate() {
                *slot = b as i32 * level / i32::from(VOLUME_MAX);
            }
            hi.push(hi_row);
            lo.push(lo_row);
        }

        Ok(Self { hi, lo })
    }

    #[inline]
    pub(crate) fn rows(&self, level: u8) -> GainRows<'_> {
        let v = level.min(VOLUME_MAX) as usize;
        GainRows {
            hi: &self.hi[v],
            lo: &self.lo[v],
        }
    }
}

/// Interpolation weight tables
///
/// A two-tap pair at fraction index `f` combines as
/// `rows[STEPS - f][tap_a_byte] + rows[f][tap_b_byte]`; both taps are keyed
/// by the sample's high byte.
pub(crate) struct InterpTables {
    lin: Vec<[i32; 256]>,
    hq: Vec<[i32; 256]>,
}

impl InterpTables {
    pub(crate) fn build() -> Result<Self, MixError> {
        Ok(Self {
            lin: weight_rows(LIN_STEPS)?,
            hq: weight_rows(HQ_STEPS)?,
        })
    }

    #[inline]
    pub(crate) fn linear(&self) -> &[[i32; 256]] {
        &self.lin
    }

    #[inline]
    pub(crate) fn high(&self) -> &[[i32; 256]] {
        &self.hq
    }
}

fn weight_rows(steps: usize) -> Result<Vec<[i32; 256]>, MixError> {
    let mut rows = Vec::new();
    rows.try_reserve_exact(steps + 1)
        .map_err(|_| MixError::OutOfMemory)?;
    for w in 0..=steps {
        let mut row = [0i32; 256];
        for (b, slot) in row.iter_mut().enumerate() {
            *slot = (i32::from(b as u8 as i8) << 8) * w as i32 / steps as i32;
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Clip/quantize tables mapping the summed accumulator to an output sample
///
/// The accumulator is split into three byte lanes (signed high, unsigned
/// mid and low); each lane's amplified value comes from one table and the
/// three lookups are summed. Values at or beyond the precomputed window are
/// clamped to the min/max output sample instead of wrapping. Independent
/// lane truncation keeps the sum within 2 LSB of the direct product.
pub(crate) struct ClipTables {
    hi: [i32; 256],
    mid: [i32; 256],
    lo: [i32; 256],
    /// Accumulator magnitude at which the scaled output saturates
    max_in: i32,
    max_out: i16,
    min_out: i16,
}

impl ClipTables {
    /// Build for an `amplify` level (16.16, 65536 = unity) and the engine's
    /// voice count (which bounds how large the summed accumulator can get).
    ///
    /// `amplify == 0` collapses the window to zero width: any non-silent
    /// accumulator saturates. The original divided by `amplify` here and
    /// crashed; the degenerate window is the defined fallback.
    pub(crate) fn build(amplify: i32, voice_count: u32) -> Self {
        let amp = i64::from(amplify.max(0));
        let sum_ceiling = (i64::from(voice_count) * 32768).min(ACC_LANE_CEILING);
        let max_in = if amp == 0 {
            1
        } else {
            ((i64::from(i16::MAX) << 16) / amp)
                .min(sum_ceiling)
                .max(1) as i32
        };

        let mut hi = [0i32; 256];
        let mut mid = [0i32; 256];
        let mut lo = [0i32; 256];
        for (b, slot) in hi.iter_mut().enumerate() {
            *slot = (((i64::from(b as u8 as i8)) << 16) * amp >> 16) as i32;
        }
        for (b, slot) in mid.iter_mut().enumerate() {
            *slot = ((i64::from(b as u8) << 8) * amp >> 16) as i32;
        }
        for (b, slot) in lo.iter_mut().enumerate() {
            *slot = (i64::from(b as u8) * amp >> 16) as i32;
        }

        Self {
            hi,
            mid,
            lo,
            max_in,
            max_out: i16::MAX,
            min_out: i16::MIN,
        }
    }

    /// Amplify, clip and round one accumulator slot down to 16 bits
    #[inline]
    pub(crate) fn quantize(&self, acc: i32) -> i16 {
        if acc >= self.max_in {
            return self.max_out;
        }
        if acc <= -self.max_in - 1 {
            return self.min_out;
        }
        let u = acc as u32;
        let sum = self.hi[((u >> 16) & 0xff) as usize]
            + self.mid[((u >> 8) & 0xff) as usize]
            + self.lo[(u & 0xff) as usize];
        sum.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
    }
}
