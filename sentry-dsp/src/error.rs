use thiserror::Error;

/// Why a frame could not be delivered.
///
/// A frame is either filled completely or one of these is returned; the
/// contents of the buffer are unspecified after an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "logging", derive(defmt::Format))]
pub enum AcquireError {
    /// The bus kept failing on one slot until the retry bound ran out.
    #[error("bus stalled on slot {slot} after {attempts} attempts")]
    Stalled { slot: usize, attempts: u32 },
    /// A finite source has no more frames.
    #[error("sample source exhausted")]
    Exhausted,
    #[error("frame buffer holds {actual} samples, source delivers {expected}")]
    FrameSizeMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "logging", derive(defmt::Format))]
pub enum Error {
    #[error("frame size {0} is not a power of two between 16 and 4096")]
    UnsupportedFrameSize(usize),
    #[error("source frame size {actual} does not match the meter's {expected}")]
    FrameSizeMismatch { expected: usize, actual: usize },
    #[error("at most {max} bands can be metered")]
    TooManyBands { max: usize },
    #[error(transparent)]
    Acquire(#[from] AcquireError),
}
