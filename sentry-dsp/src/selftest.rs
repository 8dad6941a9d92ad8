//! Start-up sanity check for the microphone.
//!
//! A bus that returns nothing, or the same word over and over, usually means
//! bad wiring or a wrong channel select. A live but very quiet signal is only
//! worth a warning.

use crate::source::FULL_SCALE_24;

/// RMS (in 24-bit counts) under which a live microphone is called quiet.
pub const QUIET_RMS_COUNTS: f64 = 10.0;

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "logging", derive(defmt::Format))]
pub enum MicHealth {
    NoData,
    /// Every word identical.
    Stuck { word: i32 },
    /// Varying data with an RMS of `rms` normalized units.
    Quiet { rms: f32 },
    Alive { rms: f32 },
}

impl MicHealth {
    pub fn is_responding(&self) -> bool {
        matches!(self, MicHealth::Quiet { .. } | MicHealth::Alive { .. })
    }
}

/// Classify a burst of raw `Left24In32` words.
pub fn check_words(words: &[i32]) -> MicHealth {
    let Some(&first) = words.first() else {
        return MicHealth::NoData;
    };
    if words.iter().all(|&word| word == first) {
        return MicHealth::Stuck { word: first };
    }

    let sum_sq: f64 = words
        .iter()
        .map(|&word| {
            let sample = (word >> 8) as f64;
            sample * sample
        })
        .sum();
    let rms_counts = libm::sqrt(sum_sq / words.len() as f64);
    let rms = (rms_counts / FULL_SCALE_24 as f64) as f32;

    if rms_counts < QUIET_RMS_COUNTS {
        MicHealth::Quiet { rms }
    } else {
        MicHealth::Alive { rms }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_burst() {
        assert_eq!(check_words(&[]), MicHealth::NoData);
        assert!(!MicHealth::NoData.is_responding());
    }

    #[test]
    fn test_stuck_bus() {
        let health = check_words(&[-1; 64]);
        assert_eq!(health, MicHealth::Stuck { word: -1 });
        assert!(!health.is_responding());
    }

    #[test]
    fn test_quiet_but_alive() {
        let words = [0x0000_0100, -0x0000_0100, 0x0000_0200, 0];
        let health = check_words(&words);
        assert!(matches!(health, MicHealth::Quiet { .. }));
        assert!(health.is_responding());
    }

    #[test]
    fn test_loud_signal() {
        let words = [0x4000_0000, -0x4000_0000, 0x4000_0000, -0x4000_0000];
        match check_words(&words) {
            MicHealth::Alive { rms } => assert!((rms - 0.5).abs() < 1e-6),
            other => panic!("unexpected {other:?}"),
        }
    }
}
