//! Band-level sound meter core: frame acquisition, Hamming-windowed FFT and
//! per-band instantaneous, smoothed, LEQ and peak levels.

#![no_std]

#[cfg(test)]
extern crate std;

pub mod band;
pub mod calibration;
pub mod config;
pub mod error;
pub mod i2s;
pub mod meter;
pub mod report;
pub mod selftest;
pub mod source;
pub mod spectrum;

pub use band::{BandAnalyzer, BinRange, FrequencyBand, LEVEL_FLOOR_DB};
pub use config::{DEFAULT_BANDS, FFT_SIZE, MAX_BANDS, REPORT_INTERVAL_MS, SAMPLE_RATE_HZ};
pub use error::{AcquireError, Error};
pub use meter::Meter;
pub use report::BandReading;
pub use source::{MicrophoneSource, RetryPolicy, SampleFormat, SampleSource, WordBus};
pub use spectrum::SpectralTransform;
