//! wavemix - fixed-point software wavetable mixer
//!
//! Real-time mixing core for tracker-style sample playback. N voices, each
//! with its own pitch, volume, loop topology and sample format, are
//! resampled and summed into caller-owned 16-bit PCM, mono or interleaved
//! stereo, sample-accurately - no floating-point division in the inner
//! loops and no per-sample branching for loop boundaries.
//!
//! # Architecture
//!
//! - [`Voice`] - per-voice playback state: shared waveform, 16.16 step,
//!   split integer/fractional position, status bits, gain levels
//! - [`Mixer`] - owns the voices, the gain/interpolation/clip lookup
//!   tables and the scratch accumulator; exposes the mix entry points
//! - segment scheduler (internal) - splits every request at loop/end
//!   boundaries so the renderers never test a boundary per sample
//! - renderer family (internal) - mono/stereo x i8/i16/f32 x three
//!   interpolation qualities, all gain resolved through lookup tables
//! - VU estimator - read-only loudness scans for meters, independent of
//!   the quantize path
//!
//! The engine performs no I/O and owns no audio device. The device layer
//! supplies per-voice parameters through the refresh callback given to
//! [`Mixer::new`] and consumes the PCM written into its own buffers:
//!
//! ```
//! use std::sync::Arc;
//! use wavemix::{AMPLIFY_UNITY, MixOptions, Mixer, SampleData, STEP_ONE};
//!
//! let mut mixer = Mixer::new(Box::new(|_index, _rate, _voice| {}), false, 4, AMPLIFY_UNITY)
//!     .expect("mixer setup");
//!
//! let voice = mixer.voice_mut(0).unwrap();
//! voice.set_sample(SampleData::I8(Arc::new(vec![0, 40, 80, 120])));
//! voice.set_volume(64, 64);
//! voice.set_step(STEP_ONE);
//! voice.play();
//!
//! let mut pcm = [0i16; 64];
//! mixer.mix_channels(&[0], &mut pcm, 64, 44100, MixOptions::default());
//! assert_eq!(pcm[1], 40 << 8);
//! ```

mod engine;
mod error;
mod sample;
mod tables;
mod voice;
mod vu;

pub use engine::{AMPLIFY_UNITY, MIX_BUFFER_LEN, MixOptions, MixResult, Mixer, RefreshVoice};
pub use error::MixError;
pub use sample::{SampleData, SampleFormat};
pub use voice::{STEP_ONE, VOLUME_MAX, Voice, voice_flags};
