//! Error types for mixer construction

use thiserror::Error;

/// Errors surfaced when building a [`Mixer`](crate::Mixer).
///
/// Numeric saturation during mixing (gain clamping, loop wrap/reflect at
/// boundaries) is defined behavior, not an error. Mixing itself cannot fail.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MixError {
    /// Zero voices requested (rejected before any allocation)
    #[error("mixer requires at least one voice")]
    InvalidVoiceCount,
    /// Table or scratch buffer allocation failed; the engine must not be used
    #[error("failed to allocate mixer tables or buffers")]
    OutOfMemory,
}
