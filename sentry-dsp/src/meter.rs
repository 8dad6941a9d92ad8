use heapless::Vec;

use crate::band::{BandAnalyzer, FrequencyBand};
use crate::config::{FFT_SIZE, MAX_BANDS};
use crate::error::Error;
use crate::report::BandReading;
use crate::source::SampleSource;
use crate::spectrum::SpectralTransform;

/// Owns everything one measurement pipeline needs: the source, the frame
/// buffer, the transform and one analyzer per band.
///
/// [`cycle`](Self::cycle) and [`report`](Self::report) both take `&mut self`,
/// so a report can never observe a band halfway through an update.
pub struct Meter<S, const N: usize = FFT_SIZE> {
    source: S,
    frame: [f32; N],
    transform: SpectralTransform<N>,
    bands: Vec<BandAnalyzer, MAX_BANDS>,
    cycles: u32,
}

impl<S: SampleSource, const N: usize> Meter<S, N> {
    pub fn new(source: S, bands: &[FrequencyBand]) -> Result<Self, Error> {
        if source.frame_size() != N {
            return Err(Error::FrameSizeMismatch {
                expected: N,
                actual: source.frame_size(),
            });
        }
        let transform = SpectralTransform::new()?;

        let sample_rate = source.sample_rate();
        let mut analyzers = Vec::new();
        for band in bands {
            let analyzer = BandAnalyzer::new(*band, sample_rate, N);
            #[cfg(feature = "logging")]
            defmt::info!(
                "band {=str}: bins {} ({} Hz wide)",
                analyzer.name(),
                analyzer.bins(),
                analyzer.bin_width_hz()
            );
            analyzers
                .push(analyzer)
                .map_err(|_| Error::TooManyBands { max: MAX_BANDS })?;
        }

        Ok(Self {
            source,
            frame: [0.0; N],
            transform,
            bands: analyzers,
            cycles: 0,
        })
    }

    /// Acquire one frame, transform it and update every band once.
    ///
    /// Blocks for as long as the source blocks. On error no band is touched.
    pub fn cycle(&mut self) -> Result<(), Error> {
        self.source.acquire(&mut self.frame)?;

        let spectrum = self.transform.process(&self.frame);
        for band in self.bands.iter_mut() {
            let _smoothed = band.smoothed_level(spectrum);
            #[cfg(feature = "logging")]
            defmt::trace!("{=str}: {} dB", band.name(), _smoothed);
        }

        self.cycles = self.cycles.wrapping_add(1);
        Ok(())
    }

    /// Snapshot LEQ and max of every band, then start a new integration window.
    pub fn report(&mut self) -> Vec<BandReading, MAX_BANDS> {
        let readings = self.bands.iter().map(BandReading::from_analyzer).collect();
        for band in self.bands.iter_mut() {
            band.reset();
        }
        readings
    }

    pub fn bands(&self) -> &[BandAnalyzer] {
        &self.bands
    }

    pub fn band(&self, name: &str) -> Option<&BandAnalyzer> {
        self.bands.iter().find(|band| band.name() == name)
    }

    /// Spectrum of the last processed frame.
    pub fn spectrum(&self) -> &[f32] {
        self.transform.spectrum()
    }

    pub fn frame(&self) -> &[f32; N] {
        &self.frame
    }

    /// Completed cycles since construction (wrapping).
    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn into_source(self) -> S {
        self.source
    }
}
