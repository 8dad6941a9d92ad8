//! Boundary contract with the reporting side.
//!
//! Readings leave the meter as plain decimals with two fraction digits, keyed
//! by band name and device identity. How and when they are sent is up to the
//! caller.

use core::fmt::{self, Write};

use heapless::String;

use crate::band::BandAnalyzer;

pub const TOPIC_ROOT: &str = "db_sentry";
pub const LEVEL_TEXT_CAPACITY: usize = 16;
pub const TOPIC_CAPACITY: usize = 64;

pub type DeviceId = String<24>;

/// One band's statistics for a finished integration window.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "logging", derive(defmt::Format))]
pub struct BandReading {
    pub band: &'static str,
    pub leq_db: f32,
    pub max_db: f32,
}

impl BandReading {
    pub fn from_analyzer(analyzer: &BandAnalyzer) -> Self {
        Self {
            band: analyzer.name(),
            leq_db: analyzer.leq_level(),
            max_db: analyzer.max_level(),
        }
    }

    pub fn leq_text(&self) -> Result<String<LEVEL_TEXT_CAPACITY>, fmt::Error> {
        format_level(self.leq_db)
    }

    pub fn max_text(&self) -> Result<String<LEVEL_TEXT_CAPACITY>, fmt::Error> {
        format_level(self.max_db)
    }
}

/// `"%.2f"`, e.g. `-160.00` or `63.21`.
pub fn format_level(level_db: f32) -> Result<String<LEVEL_TEXT_CAPACITY>, fmt::Error> {
    let mut text = String::new();
    write!(text, "{:.2}", level_db)?;
    Ok(text)
}

/// `db_sentry/<device>/<band>`
pub fn topic(device: &str, band: &str) -> Result<String<TOPIC_CAPACITY>, fmt::Error> {
    let mut text = String::new();
    write!(text, "{}/{}/{}", TOPIC_ROOT, device, band)?;
    Ok(text)
}

/// Device identity derived from the low 32 bits of the factory MAC, `sensor-<hex>`.
pub fn device_id(mac: u64) -> Result<DeviceId, fmt::Error> {
    let mut text = String::new();
    write!(text, "sensor-{:x}", mac as u32)?;
    Ok(text)
}
