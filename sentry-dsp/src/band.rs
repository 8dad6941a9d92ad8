//! Per-band level metering.
//!
//! A [`BandAnalyzer`] reads the shared magnitude spectrum and keeps two
//! independent pieces of state:
//!
//! * the smoothing filter (`previous_smoothed`), set only at construction and
//!   by each [`smoothed_level`](BandAnalyzer::smoothed_level) call;
//! * the integration window (linear power sum, sample count, running max),
//!   additionally cleared by [`reset`](BandAnalyzer::reset).
//!
//! `reset` never touches the smoothing filter, so the first reading of a new
//! reporting window continues from where the previous one left off.

/// Anything quieter is reported as exactly this level.
pub const LEVEL_FLOOR_DB: f32 = -160.0;
/// RMS magnitudes are clamped up to this before taking the logarithm.
pub const RMS_EPSILON: f64 = 1e-12;
/// Smoothing factor for the meter (0 = no smoothing, towards 1 = very slow).
pub const DEFAULT_SMOOTHING: f32 = 0.7;

const MAX_SMOOTHING: f32 = 1.0 - f32::EPSILON;

/// Running mean of dB levels taken in the linear power domain.
///
/// Once `count` reaches `u32::MAX` further levels are ignored, so the mean
/// stays a mean instead of drifting with an ever growing sum.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct PowerAverage {
    sum: f64,
    count: u32,
}

impl PowerAverage {
    pub(crate) fn add(&mut self, level_db: f32) {
        if self.count == u32::MAX {
            return;
        }
        self.sum += libm::pow(10.0, level_db as f64 / 10.0);
        self.count += 1;
    }

    /// `10 * log10(sum / count)`, `None` while empty.
    pub(crate) fn mean_db(&self) -> Option<f32> {
        if self.count == 0 {
            return None;
        }
        Some((10.0 * libm::log10(self.sum / self.count as f64)) as f32)
    }

    pub(crate) fn count(&self) -> u32 {
        self.count
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Static description of one metered band.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrequencyBand {
    name: &'static str,
    low_hz: f32,
    high_hz: f32,
    calibration_offset_db: f32,
    smoothing: f32,
}

impl FrequencyBand {
    pub const fn new(
        name: &'static str,
        low_hz: f32,
        high_hz: f32,
        calibration_offset_db: f32,
    ) -> Self {
        Self {
            name,
            low_hz,
            high_hz,
            calibration_offset_db,
            smoothing: DEFAULT_SMOOTHING,
        }
    }

    /// Set the smoothing coefficient, clamped into `[0, 1)`.
    pub fn with_smoothing(mut self, smoothing: f32) -> Self {
        self.smoothing = if smoothing.is_nan() {
            0.0
        } else {
            smoothing.clamp(0.0, MAX_SMOOTHING)
        };
        self
    }

    pub fn with_calibration_offset(mut self, calibration_offset_db: f32) -> Self {
        self.calibration_offset_db = calibration_offset_db;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn low_hz(&self) -> f32 {
        self.low_hz
    }

    pub fn high_hz(&self) -> f32 {
        self.high_hz
    }

    pub fn calibration_offset_db(&self) -> f32 {
        self.calibration_offset_db
    }

    pub fn smoothing(&self) -> f32 {
        self.smoothing
    }
}

/// Inclusive range of spectrum bins a band averages over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "logging", derive(defmt::Format))]
pub struct BinRange {
    pub low: usize,
    pub high: usize,
}

impl BinRange {
    pub fn len(&self) -> usize {
        (self.high + 1).saturating_sub(self.low)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct BandAnalyzer {
    band: FrequencyBand,
    bin_width_hz: f32,
    bin_count: usize,
    bins: BinRange,

    previous_smoothed: f32,

    window: PowerAverage,
    max_db: f32,
}

impl BandAnalyzer {
    /// `frame_size` is the transform length N; the spectrum has N / 2 bins.
    pub fn new(band: FrequencyBand, sample_rate: u32, frame_size: usize) -> Self {
        let mut analyzer = Self {
            band,
            bin_width_hz: sample_rate as f32 / frame_size as f32,
            bin_count: frame_size / 2,
            bins: BinRange { low: 0, high: 0 },
            previous_smoothed: 0.0,
            window: PowerAverage::default(),
            max_db: LEVEL_FLOOR_DB,
        };
        analyzer.bins = analyzer.resolve_bins();
        analyzer
    }

    pub fn band(&self) -> &FrequencyBand {
        &self.band
    }

    pub fn name(&self) -> &'static str {
        self.band.name
    }

    pub fn bin_width_hz(&self) -> f32 {
        self.bin_width_hz
    }

    /// Bins this band averages over, DC excluded.
    pub fn bins(&self) -> BinRange {
        self.bins
    }

    /// `floor(freq / bin_width)`, clamped to `[0, N/2 - 1]`.
    pub fn frequency_to_bin(&self, freq_hz: f32) -> usize {
        let last = self.bin_count.saturating_sub(1);
        let raw = libm::floorf(freq_hz / self.bin_width_hz);
        // NaN fails this comparison too
        if !(raw >= 0.0) {
            0
        } else if raw >= last as f32 {
            last
        } else {
            raw as usize
        }
    }

    fn resolve_bins(&self) -> BinRange {
        let last = self.bin_count.saturating_sub(1);
        let mut low = self.frequency_to_bin(self.band.low_hz);
        let mut high = self.frequency_to_bin(self.band.high_hz);

        // skip DC
        if low < 1 {
            low = 1;
        }
        if high <= low {
            high = low + 1;
        }
        if high > last {
            high = last;
        }
        BinRange { low, high }
    }

    /// Uncalibrated band level in dB relative to full scale, before flooring.
    fn band_dbfs(&self, spectrum: &[f32]) -> Option<f64> {
        let bins = spectrum
            .get(self.bins.low..=self.bins.high)
            .filter(|bins| !bins.is_empty())?;

        let sum_sq: f64 = bins.iter().map(|&m| m as f64 * m as f64).sum();
        let rms = libm::sqrt(sum_sq / bins.len() as f64);
        let rms = if rms < RMS_EPSILON { RMS_EPSILON } else { rms };

        Some(20.0 * libm::log10(rms))
    }

    /// dBFS-like level of the band before the calibration offset.
    pub fn uncalibrated_level(&self, spectrum: &[f32]) -> f32 {
        self.band_dbfs(spectrum).map_or(LEVEL_FLOOR_DB, floor_level)
    }

    /// Calibrated level of the band in this spectrum alone.
    pub fn instantaneous_level(&self, spectrum: &[f32]) -> f32 {
        self.band_dbfs(spectrum).map_or(LEVEL_FLOOR_DB, |dbfs| {
            floor_level(dbfs + self.band.calibration_offset_db as f64)
        })
    }

    /// Smooth this cycle's level and fold it into the integration window.
    ///
    /// Call exactly once per cycle; the LEQ assumes one entry per frame.
    pub fn smoothed_level(&mut self, spectrum: &[f32]) -> f32 {
        let level = self.instantaneous_level(spectrum);
        self.smooth(level)
    }

    /// The accumulation step of [`smoothed_level`](Self::smoothed_level) for
    /// an already computed instantaneous level.
    pub fn smooth(&mut self, level_db: f32) -> f32 {
        let alpha = self.band.smoothing;
        let smoothed = alpha * self.previous_smoothed + (1.0 - alpha) * level_db;
        self.previous_smoothed = smoothed;

        self.window.add(smoothed);
        if smoothed > self.max_db {
            self.max_db = smoothed;
        }

        smoothed
    }

    /// Equivalent continuous level since the last reset.
    pub fn leq_level(&self) -> f32 {
        self.window.mean_db().unwrap_or(LEVEL_FLOOR_DB)
    }

    /// Loudest smoothed level since the last reset.
    pub fn max_level(&self) -> f32 {
        self.max_db
    }

    /// Last smoothed level; the smoothing filter's memory.
    pub fn previous_smoothed(&self) -> f32 {
        self.previous_smoothed
    }

    /// Frames folded into the current integration window.
    pub fn sample_count(&self) -> u32 {
        self.window.count()
    }

    /// Start a new integration window. The smoothing filter is left alone.
    pub fn reset(&mut self) {
        self.window.clear();
        self.max_db = LEVEL_FLOOR_DB;
    }
}

fn floor_level(level_db: f64) -> f32 {
    let level = level_db as f32;
    if level < LEVEL_FLOOR_DB {
        LEVEL_FLOOR_DB
    } else {
        level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const SAMPLE_RATE: u32 = 48_000;
    const N: usize = 1024;

    fn analyzer(low_hz: f32, high_hz: f32) -> BandAnalyzer {
        BandAnalyzer::new(FrequencyBand::new("test", low_hz, high_hz, 0.0), SAMPLE_RATE, N)
    }

    #[test]
    fn test_bin_width_and_reference_bins() {
        let band = analyzer(20.0, 250.0);
        assert_abs_diff_eq!(band.bin_width_hz(), 46.875);
        assert_eq!(band.frequency_to_bin(20.0), 0);
        assert_eq!(band.frequency_to_bin(250.0), 5);
        assert_eq!(band.bins(), BinRange { low: 1, high: 5 });
    }

    #[test]
    fn test_frequency_to_bin_is_clamped_and_monotonic() {
        let band = analyzer(20.0, 250.0);
        let mut previous = 0;
        let mut freq = -500.0;
        while freq < 40_000.0 {
            let bin = band.frequency_to_bin(freq);
            assert!(bin <= N / 2 - 1);
            assert!(bin >= previous);
            previous = bin;
            freq += 13.7;
        }
        assert_eq!(band.frequency_to_bin(f32::NAN), 0);
        assert_eq!(band.frequency_to_bin(f32::INFINITY), N / 2 - 1);
    }

    #[test]
    fn test_narrow_and_inverted_bands_are_widened() {
        assert_eq!(analyzer(1000.0, 1000.0).bins(), BinRange { low: 21, high: 22 });
        assert_eq!(analyzer(5000.0, 100.0).bins(), BinRange { low: 106, high: 107 });
        assert_eq!(analyzer(0.0, 0.0).bins(), BinRange { low: 1, high: 2 });
        // pinned at the top of the spectrum
        assert_eq!(analyzer(30_000.0, 40_000.0).bins(), BinRange { low: 511, high: 511 });
    }

    #[test]
    fn test_instantaneous_level_rms_and_offset() {
        let band = BandAnalyzer::new(FrequencyBand::new("b", 20.0, 250.0, 35.0), SAMPLE_RATE, N);
        let mut spectrum = [0.0f32; N / 2];
        // bins 1..=5: rms of [3, 4, 0, 0, 0] is 5 / sqrt(5)
        spectrum[0] = 1_000.0;
        spectrum[1] = 3.0;
        spectrum[2] = 4.0;

        let expected = 20.0 * (5.0f64 / 5.0f64.sqrt()).log10() + 35.0;
        assert_abs_diff_eq!(band.instantaneous_level(&spectrum), expected as f32, epsilon = 1e-4);
        assert_abs_diff_eq!(
            band.uncalibrated_level(&spectrum),
            (expected - 35.0) as f32,
            epsilon = 1e-4
        );
    }

    #[test]
    fn test_silence_is_reported_at_the_floor() {
        let band = analyzer(250.0, 4000.0);
        let spectrum = [0.0f32; N / 2];
        assert_eq!(band.instantaneous_level(&spectrum), LEVEL_FLOOR_DB);
        assert_eq!(band.uncalibrated_level(&spectrum), LEVEL_FLOOR_DB);
    }

    #[test]
    fn test_short_spectrum_does_not_panic() {
        let band = analyzer(4000.0, 8000.0);
        assert_eq!(band.instantaneous_level(&[1.0; 16]), LEVEL_FLOOR_DB);
    }

    #[test]
    fn test_instantaneous_level_is_pure() {
        let mut band = analyzer(250.0, 4000.0);
        let spectrum = [0.25f32; N / 2];
        let first = band.instantaneous_level(&spectrum);
        band.smoothed_level(&spectrum);
        assert_eq!(band.instantaneous_level(&spectrum), first);
    }

    #[test]
    fn test_smoothing_converges_geometrically() {
        let alpha = 0.7f32;
        let mut band = BandAnalyzer::new(
            FrequencyBand::new("b", 20.0, 250.0, 0.0).with_smoothing(alpha),
            SAMPLE_RATE,
            N,
        );
        let target = 60.0f32;
        for k in 1..=20 {
            let smoothed = band.smooth(target);
            let expected_residual = target * alpha.powi(k);
            assert_abs_diff_eq!(target - smoothed, expected_residual, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_zero_smoothing_tracks_input() {
        let mut band = BandAnalyzer::new(
            FrequencyBand::new("b", 20.0, 250.0, 0.0).with_smoothing(0.0),
            SAMPLE_RATE,
            N,
        );
        assert_eq!(band.smooth(42.0), 42.0);
        assert_eq!(band.smooth(-3.5), -3.5);
    }

    #[test]
    fn test_smoothing_is_clamped_below_one() {
        let band = FrequencyBand::new("b", 0.0, 1.0, 0.0);
        assert_eq!(band.with_smoothing(-0.2).smoothing(), 0.0);
        assert!(band.with_smoothing(1.0).smoothing() < 1.0);
        assert_eq!(band.with_smoothing(f32::NAN).smoothing(), 0.0);
        assert_eq!(band.smoothing(), DEFAULT_SMOOTHING);
    }

    #[test]
    fn test_leq_of_empty_window_is_floor() {
        let band = analyzer(20.0, 250.0);
        assert_eq!(band.leq_level(), LEVEL_FLOOR_DB);
        assert_eq!(band.max_level(), LEVEL_FLOOR_DB);
    }

    #[test]
    fn test_leq_of_constant_level() {
        let mut band = BandAnalyzer::new(
            FrequencyBand::new("b", 20.0, 250.0, 0.0).with_smoothing(0.0),
            SAMPLE_RATE,
            N,
        );
        for _ in 0..50 {
            band.smooth(72.5);
        }
        assert_eq!(band.sample_count(), 50);
        assert_abs_diff_eq!(band.leq_level(), 72.5, epsilon = 1e-3);
        assert_eq!(band.max_level(), 72.5);
    }

    #[test]
    fn test_leq_is_energy_average() {
        let mut band = BandAnalyzer::new(
            FrequencyBand::new("b", 20.0, 250.0, 0.0).with_smoothing(0.0),
            SAMPLE_RATE,
            N,
        );
        band.smooth(80.0);
        band.smooth(60.0);
        // dominated by the louder frame: 10 log10((1e8 + 1e6) / 2)
        assert_abs_diff_eq!(band.leq_level(), 77.0329, epsilon = 1e-3);
        assert_eq!(band.max_level(), 80.0);
    }

    #[test]
    fn test_saturated_window_keeps_its_mean() {
        let mut band = BandAnalyzer::new(
            FrequencyBand::new("b", 20.0, 250.0, 0.0).with_smoothing(0.0),
            SAMPLE_RATE,
            N,
        );
        // a window one frame short of saturation, all at 60 dB
        band.window = PowerAverage {
            sum: (u32::MAX - 1) as f64 * 1e6,
            count: u32::MAX - 1,
        };
        assert_abs_diff_eq!(band.leq_level(), 60.0, epsilon = 1e-3);

        band.smooth(60.0);
        assert_eq!(band.sample_count(), u32::MAX);
        for _ in 0..100 {
            band.smooth(120.0);
        }
        assert_eq!(band.sample_count(), u32::MAX);
        assert_abs_diff_eq!(band.leq_level(), 60.0, epsilon = 1e-3);
        // the peak still follows the signal
        assert_eq!(band.max_level(), 120.0);
    }

    #[test]
    fn test_reset_clears_window_but_keeps_filter() {
        let mut band = analyzer(20.0, 250.0);
        for _ in 0..10 {
            band.smooth(70.0);
        }
        let filter_state = band.previous_smoothed();

        band.reset();
        assert_eq!(band.previous_smoothed(), filter_state);
        assert_eq!(band.sample_count(), 0);
        assert_eq!(band.leq_level(), LEVEL_FLOOR_DB);
        assert_eq!(band.max_level(), LEVEL_FLOOR_DB);

        let next = band.smooth(50.0);
        let alpha = DEFAULT_SMOOTHING;
        assert_abs_diff_eq!(next, alpha * filter_state + (1.0 - alpha) * 50.0);
        assert_eq!(band.max_level(), next);
        assert_abs_diff_eq!(band.leq_level(), next, epsilon = 1e-3);
    }

    #[test]
    fn test_low_band_dominates_for_low_frequency_energy() {
        let bass = analyzer(20.0, 250.0);
        let treble = analyzer(4000.0, 8000.0);
        let mut spectrum = [1e-6f32; N / 2];
        for bin in spectrum.iter_mut().take(6).skip(1) {
            *bin = 2.0;
        }

        let difference = bass.instantaneous_level(&spectrum) - treble.instantaneous_level(&spectrum);
        assert!(difference >= 20.0, "difference was {difference}");
    }
}
