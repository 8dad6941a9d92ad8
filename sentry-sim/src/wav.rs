//! WAV recordings as a sample source.
//!
//! Only the first channel of a multi-channel file is metered.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader};
use log::{debug, warn};
use sentry_dsp::source::normalize_sample;
use sentry_dsp::{AcquireError, SampleSource};

pub struct WavSource<R: Read> {
    reader: WavReader<R>,
    channels: u16,
    bits_per_sample: u16,
    sample_format: SampleFormat,
    sample_rate: u32,
    frame_size: usize,
}

impl WavSource<BufReader<File>> {
    pub fn open(path: &Path, frame_size: usize) -> Result<Self> {
        let reader = WavReader::open(path)
            .with_context(|| format!("failed to open WAV file {}", path.display()))?;
        Ok(Self::new(reader, frame_size))
    }
}

impl<R: Read> WavSource<R> {
    pub fn new(reader: WavReader<R>, frame_size: usize) -> Self {
        let spec = reader.spec();
        debug!(
            "WAV: {} ch @ {} Hz, {} bit {:?}",
            spec.channels, spec.sample_rate, spec.bits_per_sample, spec.sample_format
        );
        Self {
            reader,
            channels: spec.channels.max(1),
            bits_per_sample: spec.bits_per_sample,
            sample_format: spec.sample_format,
            sample_rate: spec.sample_rate,
            frame_size,
        }
    }

    fn next_sample(&mut self) -> Option<Result<f32, hound::Error>> {
        match self.sample_format {
            SampleFormat::Float => self.reader.samples::<f32>().next(),
            SampleFormat::Int if self.bits_per_sample == 16 => self
                .reader
                .samples::<i16>()
                .next()
                .map(|sample| sample.map(normalize_sample)),
            SampleFormat::Int => {
                let full_scale = (1u64 << (self.bits_per_sample - 1)) as f32;
                self.reader
                    .samples::<i32>()
                    .next()
                    .map(|sample| sample.map(|s| s as f32 / full_scale))
            }
        }
    }

    /// First channel of the next interleaved sample group.
    fn next_mono(&mut self) -> Result<f32, AcquireError> {
        let mut first = 0.0;
        for channel in 0..self.channels {
            match self.next_sample() {
                Some(Ok(sample)) if channel == 0 => first = sample,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    warn!("stopping at unreadable WAV data: {err}");
                    return Err(AcquireError::Exhausted);
                }
                None => return Err(AcquireError::Exhausted),
            }
        }
        Ok(first)
    }
}

impl<R: Read> SampleSource for WavSource<R> {
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
        for sample in frame.iter_mut() {
            *sample = self.next_mono()?;
        }
        Ok(())
    }
}
