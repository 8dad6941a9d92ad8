use std::f64::consts::TAU;

use sentry_dsp::{AcquireError, SampleSource};

/// Finite sine generator standing in for a microphone.
pub struct ToneSource {
    freq_hz: f64,
    amplitude: f32,
    sample_rate: u32,
    frame_size: usize,
    phase: f64,
    frames_left: u64,
}

impl ToneSource {
    pub fn new(freq_hz: f32, amplitude: f32, sample_rate: u32, frame_size: usize, seconds: f32) -> Self {
        let samples = (seconds.max(0.0) as f64 * sample_rate as f64) as u64;
        Self {
            freq_hz: freq_hz as f64,
            amplitude,
            sample_rate,
            frame_size,
            phase: 0.0,
            frames_left: samples / frame_size.max(1) as u64,
        }
    }
}

impl SampleSource for ToneSource {
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
        if self.frames_left == 0 {
            return Err(AcquireError::Exhausted);
        }
        self.frames_left -= 1;

        let step = TAU * self.freq_hz / self.sample_rate as f64;
        for sample in frame.iter_mut() {
            *sample = self.amplitude * self.phase.sin() as f32;
            self.phase = (self.phase + step) % TAU;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_runs_for_whole_frames_only() {
        // 0.05 s at 48 kHz is 2400 samples: two whole 1024-sample frames
        let mut tone = ToneSource::new(1000.0, 0.5, 48_000, 1024, 0.05);
        let mut frame = vec![0.0; 1024];
        assert!(tone.acquire(&mut frame).is_ok());
        assert!(tone.acquire(&mut frame).is_ok());
        assert_eq!(tone.acquire(&mut frame), Err(AcquireError::Exhausted));
    }

    #[test]
    fn test_phase_continues_across_frames() {
        let mut tone = ToneSource::new(750.0, 1.0, 48_000, 64, 1.0);
        let mut first = vec![0.0; 64];
        let mut second = vec![0.0; 64];
        tone.acquire(&mut first).unwrap();
        tone.acquire(&mut second).unwrap();

        // 750 Hz is exactly one cycle per 64 samples
        for (a, b) in first.iter().zip(&second) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-5);
        }
        assert!(first.iter().all(|s| s.abs() <= 1.0));
    }
}
