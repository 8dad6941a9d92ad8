#![allow(dead_code)]

use std::f32::consts::PI;

use sentry_dsp::{AcquireError, SampleSource, WordBus, FFT_SIZE, SAMPLE_RATE_HZ};

/// Endless source that evaluates `signal(t)` at every sample index `t`.
pub struct SignalSource<F> {
    signal: F,
    position: usize,
}

impl<F: FnMut(usize) -> f32> SignalSource<F> {
    pub fn new(signal: F) -> Self {
        Self { signal, position: 0 }
    }
}

impl<F: FnMut(usize) -> f32> SampleSource for SignalSource<F> {
    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE_HZ
    }

    fn frame_size(&self) -> usize {
        FFT_SIZE
    }

    fn acquire(&mut self, frame: &mut [f32]) -> Result<(), AcquireError> {
        for sample in frame.iter_mut() {
            *sample = (self.signal)(self.position);
            self.position += 1;
        }
        Ok(())
    }
}

pub fn sine(freq_hz: f32, amplitude: f32) -> impl FnMut(usize) -> f32 {
    move |t| amplitude * (2.0 * PI * freq_hz * t as f32 / SAMPLE_RATE_HZ as f32).sin()
}

pub fn sine_frame(freq_hz: f32, amplitude: f32) -> [f32; FFT_SIZE] {
    let mut signal = sine(freq_hz, amplitude);
    let mut frame = [0.0; FFT_SIZE];
    for (t, sample) in frame.iter_mut().enumerate() {
        *sample = signal(t);
    }
    frame
}

/// Encode a normalized sample the way an I2S MEMS mic puts it on the bus.
pub fn to_left24_word(sample: f32) -> i32 {
    let counts = (sample.clamp(-1.0, 0.999_999) * 8_388_608.0) as i32;
    counts << 8
}

/// Bus over a fixed list of words that fails every `fail_every`-th read
/// without consuming a word.
pub struct FlakyBus {
    words: Vec<i32>,
    next: usize,
    reads: usize,
    fail_every: usize,
}

impl FlakyBus {
    pub fn new(words: Vec<i32>, fail_every: usize) -> Self {
        Self {
            words,
            next: 0,
            reads: 0,
            fail_every,
        }
    }
}

impl WordBus for FlakyBus {
    type Error = &'static str;

    fn read_word(&mut self) -> Result<i32, Self::Error> {
        self.reads += 1;
        if self.fail_every > 0 && self.reads % self.fail_every == 0 {
            return Err("dma underrun");
        }
        let word = *self.words.get(self.next).ok_or("bus idle")?;
        self.next += 1;
        Ok(word)
    }
}
