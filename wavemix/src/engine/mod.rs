//! Mixing engine - lifecycle, buffers and the mix entry points
//!
//! The engine owns the voice array, the scratch accumulation buffer and
//! every lookup table. Each `mix_channels` call refreshes the listed voices
//! through the device callback supplied at construction, drives the segment
//! scheduler per voice, then feeds the accumulator through the clip/
//! quantize tables into the caller's PCM buffer.
//!
//! # Threading
//!
//! Single-threaded call-and-return; the engine never spawns threads and
//! performs no I/O. Callers splitting mixing and parameter changes across threads
//! must serialize access per voice (the usual audio-callback discipline);
//! `&mut self` already makes table rebuilds and in-flight mixing mutually
//! exclusive.

mod advance;
mod render;

use std::fmt;

use tracing::{debug, warn};

use crate::error::MixError;
use crate::sample::SampleData;
use crate::tables::{ClipTables, InterpTables, VolumeTables};
use crate::voice::{VOLUME_MAX, Voice};
use crate::vu;

/// Maximum frames mixed per call; larger requests are truncated and the
/// excess output zero-filled (documented truncation, not an error)
pub const MIX_BUFFER_LEN: usize = 2048;

/// Unity global output gain (16.16 fixed point)
pub const AMPLIFY_UNITY: i32 = 1 << 16;

/// Waveform samples scanned per voice VU estimate
const VU_SCAN_SAMPLES: u32 = 256;

/// Frames mixed for a master VU estimate
const MASTER_VU_FRAMES: usize = 512;

/// Per-call mixing options
#[derive(Clone, Copy, Debug, Default)]
pub struct MixOptions {
    /// Interleaved stereo output (two slots per frame)
    pub stereo: bool,
    /// Upgrade interpolating voices to fine-resolution interpolation
    pub high_quality: bool,
}

/// Outcome of a `mix_channels` call, mirroring the status bits callers
/// inspect to decide whether to keep mixing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MixResult {
    /// Nothing to do: empty request or no resolvable voices (output zeroed)
    Silent,
    /// Every batched voice is muted
    AllMuted,
    /// Every batched voice is muted or has stopped
    AllMutedOrStopped,
    /// At least one audible voice contributed
    Mixed,
}

/// Device-layer callback refreshing one voice's playback parameters for
/// the requested output rate, invoked once per voice per mix call
pub type RefreshVoice = dyn FnMut(usize, u32, &mut Voice) + Send;

/// The software wavetable mixer
///
/// Construction allocates everything (voice array, scratch accumulator,
/// gain/interpolation/clip tables); mixing allocates nothing. Dropping the
/// mixer releases it all - double-close cannot be expressed.
pub struct Mixer {
    refresh: Box<RefreshVoice>,
    voices: Vec<Voice>,
    scratch: Box<[i32]>,
    volume_tables: VolumeTables,
    interp_tables: InterpTables,
    clip: ClipTables,
    amplify: i32,
    master_override: bool,
}

impl Mixer {
    /// Build a mixer for `voice_count` voices at the given 16.16 `amplify`.
    ///
    /// `refresh` is invoked once per listed voice per mix call before the
    /// voice is advanced. With `master_override` the engine also answers
    /// [`master_sample`](Self::master_sample) and
    /// [`real_master_volume`](Self::real_master_volume) queries.
    ///
    /// # Errors
    ///
    /// [`MixError::InvalidVoiceCount`] for `voice_count == 0` (rejected
    /// before any allocation); [`MixError::OutOfMemory`] if a table or
    /// buffer allocation fails, in which case the engine must not be used.
    pub fn new(
        refresh: Box<RefreshVoice>,
        master_override: bool,
        voice_count: u32,
        amplify: i32,
    ) -> Result<Self, MixError> {
        if voice_count == 0 {
            return Err(MixError::InvalidVoiceCount);
        }

        let volume_tables = VolumeTables::build()?;
        let interp_tables = InterpTables::build()?;
        let clip = ClipTables::build(amplify, voice_count);

        let mut voices = Vec::new();
        voices
            .try_reserve_exact(voice_count as usize)
            .map_err(|_| MixError::OutOfMemory)?;
        voices.resize_with(voice_count as usize, Voice::default);

        let mut scratch = Vec::new();
        scratch
            .try_reserve_exact(MIX_BUFFER_LEN * 2)
            .map_err(|_| MixError::OutOfMemory)?;
        scratch.resize(MIX_BUFFER_LEN * 2, 0i32);

        debug!(voice_count, amplify, master_override, "mixer initialized");

        Ok(Self {
            refresh,
            voices,
            scratch: scratch.into_boxed_slice(),
            volume_tables,
            interp_tables,
            clip,
            amplify,
            master_override,
        })
    }

    /// Release the engine. Equivalent to dropping it; provided for callers
    /// that want the teardown spelled out at the call site.
    pub fn close(self) {}

    /// Swap the global output gain (16.16, 65536 = unity).
    ///
    /// Rebuilds only the clip/quantize tables, sized by the gain and the
    /// voice count; no voice state is touched and the next mix call
    /// reflects the new gain exactly.
    pub fn set_amplify(&mut self, amplify: i32) {
        self.amplify = amplify;
        self.clip = ClipTables::build(amplify, self.voices.len() as u32);
        debug!(amplify, "clip tables rebuilt");
    }

    #[inline]
    pub fn amplify(&self) -> i32 {
        self.amplify
    }

    #[inline]
    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    pub fn voice(&self, index: u32) -> Option<&Voice> {
        self.voices.get(index as usize)
    }

    /// Mutable voice access for the device layer between mix calls
    pub fn voice_mut(&mut self, index: u32) -> Option<&mut Voice> {
        self.voices.get_mut(index as usize)
    }

    /// Mix the listed voices into `out` for up to `len` frames at `rate`.
    ///
    /// `out` is fully zeroed first, so truncated or silent regions are
    /// always silence. `len` is clamped to [`MIX_BUFFER_LEN`] and to the
    /// frames `out` can hold. Out-of-range indices are skipped. An empty
    /// request returns [`MixResult::Silent`] with `out` zero-filled.
    pub fn mix_channels(
        &mut self,
        voice_indices: &[u32],
        out: &mut [i16],
        len: u32,
        rate: u32,
        opts: MixOptions,
    ) -> MixResult {
        out.fill(0);
        if len == 0 || voice_indices.is_empty() {
            return MixResult::Silent;
        }

        let slots_per_frame = if opts.stereo { 2 } else { 1 };
        let frames = (len as usize)
            .min(out.len() / slots_per_frame)
            .min(MIX_BUFFER_LEN);
        if (frames as u32) < len {
            warn!(requested = len, frames, "mix request truncated");
        }
        if frames == 0 {
            return MixResult::Silent;
        }
        let slots = frames * slots_per_frame;
        self.scratch[..slots].fill(0);

        let ctx = render::RenderCtx {
            vol: &self.volume_tables,
            interp: &self.interp_tables,
        };

        let mut seen = false;
        let mut all_muted = true;
        let mut all_muted_or_stopped = true;

        for &index in voice_indices {
            let Some(voice) = self.voices.get_mut(index as usize) else {
                continue;
            };
            (self.refresh)(index as usize, rate, voice);
            seen = true;

            let muted = voice.is_muted();
            let playing = voice.is_playing();
            if !muted {
                all_muted = false;
            }
            if !muted && playing {
                all_muted_or_stopped = false;
            }
            if !playing {
                continue;
            }

            advance::advance_voice(
                &ctx,
                voice,
                &mut self.scratch[..slots],
                frames,
                opts.stereo,
                opts.high_quality,
            );
        }

        if !seen {
            return MixResult::Silent;
        }

        for (dst, &acc) in out[..slots].iter_mut().zip(self.scratch[..slots].iter()) {
            *dst = self.clip.quantize(acc);
        }

        if all_muted {
            MixResult::AllMuted
        } else if all_muted_or_stopped {
            MixResult::AllMutedOrStopped
        } else {
            MixResult::Mixed
        }
    }

    /// Mix the full voice set into `out` without consuming playback -
    /// positions, status and steps are restored afterwards. For scopes.
    ///
    /// Returns `None` unless the engine was built with `master_override`.
    pub fn master_sample(
        &mut self,
        out: &mut [i16],
        len: u32,
        rate: u32,
        opts: MixOptions,
    ) -> Option<MixResult> {
        if !self.master_override {
            return None;
        }

        let saved: Vec<(u32, u16, u32, i32)> = self
            .voices
            .iter()
            .map(|v| (v.pos, v.fpos, v.status, v.step))
            .collect();
        let indices: Vec<u32> = (0..self.voices.len() as u32).collect();

        let result = self.mix_channels(&indices, out, len, rate, opts);

        for (voice, (pos, fpos, status, step)) in self.voices.iter_mut().zip(saved) {
            voice.pos = pos;
            voice.fpos = fpos;
            voice.status = status;
            voice.step = step;
        }
        Some(result)
    }

    /// Instantaneous master output level per side (0-255), non-destructive.
    ///
    /// Returns `None` unless the engine was built with `master_override`.
    pub fn real_master_volume(&mut self, rate: u32) -> Option<(u8, u8)> {
        if !self.master_override {
            return None;
        }

        let mut buf = [0i16; MASTER_VU_FRAMES * 2];
        self.master_sample(
            &mut buf,
            MASTER_VU_FRAMES as u32,
            rate,
            MixOptions {
                stereo: true,
                high_quality: false,
            },
        )?;

        let mut left = 0u64;
        let mut right = 0u64;
        for frame in buf.chunks_exact(2) {
            left += u64::from(frame[0].unsigned_abs());
            right += u64::from(frame[1].unsigned_abs());
        }
        let level = |sum: u64| ((sum / MASTER_VU_FRAMES as u64) >> 7).min(255) as u8;
        Some((level(left), level(right)))
    }

    /// Instantaneous level of one voice per side (0-255) via the amplitude
    /// estimator. Never advances playback and never touches the quantize
    /// path. Silent for out-of-range, stopped or frozen voices.
    pub fn real_voice_volume(&self, index: u32) -> (u8, u8) {
        let Some(voice) = self.voices.get(index as usize) else {
            return (0, 0);
        };
        if !voice.is_playing() {
            return (0, 0);
        }

        let (sum, scanned) = vu::scan_magnitude(voice, VU_SCAN_SAMPLES);
        if scanned == 0 {
            return (0, 0);
        }
        let level = ((sum / u64::from(scanned)) >> 7).min(255) as u32;

        if matches!(voice.sample, Some(SampleData::F32(_))) {
            let side = |gain: f32| (level as f32 * gain.clamp(0.0, 1.0)) as u8;
            (side(voice.fvol[0]), side(voice.fvol[1]))
        } else {
            let side = |v: u8| (level * u32::from(v.min(VOLUME_MAX)) / u32::from(VOLUME_MAX)) as u8;
            (side(voice.vol[0]), side(voice.vol[1]))
        }
    }
}

impl fmt::Debug for Mixer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mixer")
            .field("voices", &self.voices.len())
            .field("amplify", &self.amplify)
            .field("master_override", &self.master_override)
            .finish_non_exhaustive()
    }
}
