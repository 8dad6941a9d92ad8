use crate::band::FrequencyBand;

// --- Audio Config ---
pub const SAMPLE_RATE_HZ: u32 = 48_000; // I2S sample rate
pub const FFT_SIZE: usize = 1024; // Samples per frame, ~21 ms at 48 kHz

// --- Meter Config ---
pub const MAX_BANDS: usize = 8;
pub const REPORT_INTERVAL_MS: u32 = 1_000; // LEQ integration window

/// Calibration offsets convert the band's dBFS-like level to dB SPL
/// (known SPL at calibration minus measured dBFS at calibration).
pub const DEFAULT_BANDS: [FrequencyBand; 3] = [
    FrequencyBand::new("bass", 20.0, 250.0, 35.0),
    FrequencyBand::new("mid", 250.0, 4_000.0, 47.0),
    FrequencyBand::new("treble", 4_000.0, 8_000.0, 65.0), // limited by what the mic resolves
];
