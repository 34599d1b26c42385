//! Shared sample waveform data
//!
//! Waveforms are owned by an external sample pool and shared with voices
//! through `Arc` clones, so the mixer never copies or frees PCM memory.

use std::sync::Arc;

/// Raw waveform encoding of a sample
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleFormat {
    /// 8-bit signed PCM
    I8,
    /// 16-bit signed PCM
    I16,
    /// 32-bit float PCM
    F32,
}

/// Shared sample waveform (raw PCM, mono)
///
/// The variant carries the format, so a voice's sample data and its
/// encoding can never disagree.
#[derive(Clone, Debug)]
pub enum SampleData {
    I8(Arc<Vec<i8>>),
    I16(Arc<Vec<i16>>),
    F32(Arc<Vec<f32>>),
}

impl SampleData {
    /// Encoding of this waveform
    pub fn format(&self) -> SampleFormat {
        match self {
            Self::I8(_) => SampleFormat::I8,
            Self::I16(_) => SampleFormat::I16,
            Self::F32(_) => SampleFormat::F32,
        }
    }

    /// Number of samples in the waveform
    pub fn len(&self) -> usize {
        match self {
            Self::I8(data) => data.len(),
            Self::I16(data) => data.len(),
            Self::F32(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
