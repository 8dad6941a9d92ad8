//! Frame acquisition.
//!
//! A [`SampleSource`] hands out whole frames of normalized samples. The
//! hardware-facing implementation, [`MicrophoneSource`], pulls one raw word
//! per slot from a [`WordBus`] and retries the same slot on a failed read, so
//! a frame is either complete or the call returns an error.

use crate::error::AcquireError;

/// 2^23, full scale of a signed 24-bit sample.
pub const FULL_SCALE_24: f32 = 8_388_608.0;

/// Something that delivers fixed-length frames of samples in roughly [-1, 1].
pub trait SampleSource {
    fn sample_rate(&self) -> u32;

    fn frame_size(&self) -> usize;

    /// Fill `frame` with exactly [`frame_size`](Self::frame_size) samples.
    fn acquire(&mut self, frame: &mut [f32]) -> Result<(), AcquireError>;
}

/// A bus that yields one raw sample word per read.
pub trait WordBus {
    type Error;

    fn read_word(&mut self) -> Result<i32, Self::Error>;
}

/// Layout of the sample inside a raw bus word.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "logging", derive(defmt::Format))]
pub enum SampleFormat {
    /// 24-bit data in the top of a 32-bit word (I2S MEMS microphones).
    Left24In32,
    /// 16-bit signed data in the low half of the word.
    I16,
}

impl SampleFormat {
    /// Extract, sign-extend and normalize one raw word.
    pub fn normalize(self, word: i32) -> f32 {
        match self {
            // arithmetic shift keeps the sign of the 24-bit value
            SampleFormat::Left24In32 => (word >> 8) as f32 / FULL_SCALE_24,
            SampleFormat::I16 => normalize_sample(word as i16),
        }
    }
}

/// Normalize a single sample from i16 to f32.
pub fn normalize_sample(sample: i16) -> f32 {
    sample as f32 / i16::MAX as f32
}

/// How many times one slot is re-read before [`MicrophoneSource::acquire`] gives up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "logging", derive(defmt::Format))]
pub enum RetryPolicy {
    /// Keep retrying; a dead bus blocks the caller forever.
    #[default]
    Unbounded,
    /// Fail with [`AcquireError::Stalled`] after `max_attempts` failed reads of one slot.
    Bounded { max_attempts: u32 },
}

pub struct MicrophoneSource<B> {
    bus: B,
    format: SampleFormat,
    sample_rate: u32,
    frame_size: usize,
    retry: RetryPolicy,
    failed_reads: u32,
}

impl<B: WordBus> MicrophoneSource<B> {
    pub fn new(bus: B, format: SampleFormat, sample_rate: u32, frame_size: usize) -> Self {
        Self {
            bus,
            format,
            sample_rate,
            frame_size,
            retry: RetryPolicy::Unbounded,
            failed_reads: 0,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Total number of failed bus reads since construction.
    pub fn failed_reads(&self) -> u32 {
        self.failed_reads
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn into_inner(self) -> B {
        self.bus
    }

    fn read_slot(&mut self, slot: usize) -> Result<i32, AcquireError> {
        let mut attempts = 0u32;
        loop {
            match self.bus.read_word() {
                Ok(word) => return Ok(word),
                Err(_) => {
                    attempts = attempts.saturating_add(1);
                    self.failed_reads = self.failed_reads.wrapping_add(1);
                    #[cfg(feature = "logging")]
                    defmt::trace!("bus read failed on slot {}, attempt {}", slot, attempts);

                    if let RetryPolicy::Bounded { max_attempts } = self.retry {
                        if attempts >= max_attempts.max(1) {
                            #[cfg(feature = "logging")]
                            defmt::warn!("giving up on slot {} after {} attempts", slot, attempts);
                            return Err(AcquireError::Stalled { slot, attempts });
                        }
                    }
                }
            }
        }
    }
}

impl<B: WordBus> SampleSource for MicrophoneSource<B> {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn acquire(&mut self, frame: &mut [f32]) -> Result<(), AcquireError> {
        if frame.len() != self.frame_size {
            return Err(AcquireError::FrameSizeMismatch {
                expected: self.frame_size,
                actual: frame.len(),
            });
        }

        for (slot, sample) in frame.iter_mut().enumerate() {
            let word = self.read_slot(slot)?;
            *sample = self.format.normalize(word);
        }
        Ok(())
    }
}
