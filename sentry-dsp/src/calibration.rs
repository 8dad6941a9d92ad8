//! Deriving per-band calibration offsets from a reference recording.
//!
//! Play a tone of known SPL at the microphone, feed the resulting spectra to a
//! [`Calibrator`] and the offset is the reference level minus the measured
//! dBFS-like level.

use crate::band::{BandAnalyzer, FrequencyBand, PowerAverage, LEVEL_FLOOR_DB};

/// `known_db_spl - measured_dbfs`
pub fn calibration_offset(reference_db: f32, measured_dbfs: f32) -> f32 {
    reference_db - measured_dbfs
}

pub struct Calibrator {
    analyzer: BandAnalyzer,
    levels: PowerAverage,
}

impl Calibrator {
    /// The band's own calibration offset is ignored.
    pub fn new(band: FrequencyBand, sample_rate: u32, frame_size: usize) -> Self {
        Self {
            analyzer: BandAnalyzer::new(band.with_calibration_offset(0.0), sample_rate, frame_size),
            levels: PowerAverage::default(),
        }
    }

    pub fn band(&self) -> &FrequencyBand {
        self.analyzer.band()
    }

    /// Add one spectrum; returns its uncalibrated level.
    pub fn observe(&mut self, spectrum: &[f32]) -> f32 {
        let dbfs = self.analyzer.uncalibrated_level(spectrum);
        self.levels.add(dbfs);
        dbfs
    }

    pub fn frames(&self) -> u32 {
        self.levels.count()
    }

    /// Energy average of all observed levels.
    pub fn measured_dbfs(&self) -> Option<f32> {
        self.levels
            .mean_db()
            .map(|level| level.max(LEVEL_FLOOR_DB))
    }

    /// Offset that maps the measured level onto `reference_db`.
    pub fn offset_for(&self, reference_db: f32) -> Option<f32> {
        self.measured_dbfs()
            .map(|measured| calibration_offset(reference_db, measured))
    }
}
