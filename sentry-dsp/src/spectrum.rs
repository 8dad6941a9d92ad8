use core::f32::consts::PI;

use microdsp::common::real_fft;
use microfft::Complex32;
#[allow(unused_imports)]
use micromath::F32Ext;

use crate::config::FFT_SIZE;
use crate::error::Error;

pub const MIN_FRAME_SIZE: usize = 16;
pub const MAX_FRAME_SIZE: usize = 4096;

/// Windowed real FFT producing an `N / 2` bin magnitude spectrum.
///
/// All buffers live inside the struct and are reused every call. The spectrum
/// returned by [`process`](Self::process) stays valid until the next call.
pub struct SpectralTransform<const N: usize = FFT_SIZE> {
    window: [f32; N],
    work: [f32; N],
    // only the first N / 2 entries are used
    magnitude: [f32; N],
}

impl<const N: usize> SpectralTransform<N> {
    pub fn new() -> Result<Self, Error> {
        if !N.is_power_of_two() || !(MIN_FRAME_SIZE..=MAX_FRAME_SIZE).contains(&N) {
            return Err(Error::UnsupportedFrameSize(N));
        }

        let mut window = [0.0; N];
        hamming_window(&mut window);

        Ok(Self {
            window,
            work: [0.0; N],
            magnitude: [0.0; N],
        })
    }

    pub const fn frame_size(&self) -> usize {
        N
    }

    pub const fn bin_count(&self) -> usize {
        N / 2
    }

    /// Window `frame`, transform it and overwrite the spectrum.
    pub fn process(&mut self, frame: &[f32; N]) -> &[f32] {
        for ((work, &sample), &coefficient) in self.work.iter_mut().zip(frame).zip(&self.window) {
            *work = sample * coefficient;
        }

        let fft_output = real_fft(&mut self.work);
        compute_magnitude(fft_output, &mut self.magnitude[..N / 2]);

        &self.magnitude[..N / 2]
    }

    /// The spectrum of the last processed frame.
    pub fn spectrum(&self) -> &[f32] {
        &self.magnitude[..N / 2]
    }
}

/// Fill `window` with Hamming coefficients, `0.54 - 0.46 cos(2πn / (N - 1))`.
pub fn hamming_window(window: &mut [f32]) {
    let last = window.len().saturating_sub(1).max(1) as f32;
    for (n, coefficient) in window.iter_mut().enumerate() {
        *coefficient = 0.54 - 0.46 * (2.0 * PI * n as f32 / last).cos();
    }
}

/// Compute the magnitude of the FFT output.
///
/// The real FFT packs the Nyquist term into the imaginary part of bin 0, so
/// bin 0 only reports the DC magnitude.
pub fn compute_magnitude(fft_output: &[Complex32], magnitude: &mut [f32]) {
    for (bin, component) in magnitude.iter_mut().zip(fft_output) {
        *bin = (component.re * component.re + component.im * component.im).sqrt();
    }
    if let (Some(dc), Some(first)) = (magnitude.first_mut(), fft_output.first()) {
        *dc = first.re.abs();
    }
}
