//! Board wiring and timing for the ESP32-S3 sensor node.

use sentry_dsp::i2s::Channel;

pub use sentry_dsp::{FFT_SIZE, REPORT_INTERVAL_MS, SAMPLE_RATE_HZ};

/// DMA ring for the I2S receiver, a little over three frames of stereo slots.
pub const DMA_BUFFER_SIZE: usize = 4096 * 6;
/// Scratch buffer for one pop from the DMA ring.
pub const POP_BUFFER_SIZE: usize = 4096 * 2;

/// The ICS-43432 has its L/R select tied low.
pub const MIC_CHANNEL: Channel = Channel::Left;
