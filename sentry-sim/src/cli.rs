use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use sentry_dsp::REPORT_INTERVAL_MS;

/// Run the band level meter against recordings or synthetic tones.
#[derive(Debug, Parser)]
#[command(name = "sentry-sim", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Meter the input and print one LEQ/max line per band per interval.
    Measure {
        #[command(flatten)]
        input: InputArgs,

        /// Length of one integration window, in milliseconds of audio.
        #[arg(long, default_value_t = REPORT_INTERVAL_MS)]
        interval_ms: u32,

        /// Device name used in report topics.
        #[arg(long, default_value = "sentry-sim")]
        device: String,

        /// Override a band's calibration offset, e.g. `--band-offset mid=40.5`.
        #[arg(long = "band-offset", value_name = "BAND=DB", value_parser = parse_band_offset)]
        band_offsets: Vec<(String, f32)>,
    },
    /// Suggest per-band calibration offsets for a reference signal of known level.
    Calibrate {
        #[command(flatten)]
        input: InputArgs,

        /// Sound pressure level of the reference signal, in dB SPL.
        #[arg(long)]
        reference_db: f32,
    },
}

#[derive(Debug, Args)]
pub struct InputArgs {
    /// WAV file to read.
    #[arg(long, value_name = "PATH", conflicts_with = "tone", required_unless_present = "tone")]
    pub wav: Option<PathBuf>,

    /// Generate a sine tone at this frequency instead of reading a file.
    #[arg(long, value_name = "HZ")]
    pub tone: Option<f32>,

    /// Peak amplitude of the generated tone, relative to full scale.
    #[arg(long, default_value_t = 0.1)]
    pub amplitude: f32,

    /// Duration of the generated tone.
    #[arg(long, default_value_t = 5.0)]
    pub seconds: f32,
}

pub fn parse_band_offset(arg: &str) -> Result<(String, f32), String> {
    let (band, offset) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected BAND=DB, got `{arg}`"))?;
    let band = band.trim();
    if band.is_empty() {
        return Err(format!("missing band name in `{arg}`"));
    }
    let offset: f32 = offset
        .trim()
        .parse()
        .map_err(|err| format!("invalid offset in `{arg}`: {err}"))?;
    Ok((band.to_string(), offset))
}
