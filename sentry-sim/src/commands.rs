use std::fs::File;
use std::io::BufReader;

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use sentry_dsp::calibration::Calibrator;
use sentry_dsp::report::{self, BandReading};
use sentry_dsp::{
    AcquireError, Error, FrequencyBand, Meter, SampleSource, SpectralTransform, DEFAULT_BANDS,
    FFT_SIZE, SAMPLE_RATE_HZ,
};

use crate::cli::InputArgs;
use crate::tone::ToneSource;
use crate::wav::WavSource;

pub enum InputSource {
    Wav(WavSource<BufReader<File>>),
    Tone(ToneSource),
}

impl InputSource {
    pub fn open(args: &InputArgs) -> Result<Self> {
        match (&args.wav, args.tone) {
            (Some(path), _) => Ok(Self::Wav(WavSource::open(path, FFT_SIZE)?)),
            (None, Some(freq_hz)) => {
                if !(freq_hz > 0.0 && freq_hz < SAMPLE_RATE_HZ as f32 / 2.0) {
                    bail!("tone frequency must be between 0 and {} Hz", SAMPLE_RATE_HZ / 2);
                }
                Ok(Self::Tone(ToneSource::new(
                    freq_hz,
                    args.amplitude,
                    SAMPLE_RATE_HZ,
                    FFT_SIZE,
                    args.seconds,
                )))
            }
            (None, None) => bail!("either --wav or --tone is required"),
        }
    }
}

impl SampleSource for InputSource {
    fn sample_rate(&self) -> u32 {
        match self {
            Self::Wav(source) => source.sample_rate(),
            Self::Tone(source) => source.sample_rate(),
        }
    }

    fn frame_size(&self) -> usize {
        match self {
            Self::Wav(source) => source.frame_size(),
            Self::Tone(source) => source.frame_size(),
        }
    }

    fn acquire(&mut self, frame: &mut [f32]) -> Result<(), AcquireError> {
        match self {
            Self::Wav(source) => source.acquire(frame),
            Self::Tone(source) => source.acquire(frame),
        }
    }
}

/// Default bands with any `--band-offset` overrides applied.
pub fn configure_bands(overrides: &[(String, f32)]) -> Result<Vec<FrequencyBand>> {
    let mut bands = DEFAULT_BANDS.to_vec();
    for (name, offset) in overrides {
        let Some(band) = bands.iter_mut().find(|band| band.name() == name.as_str()) else {
            let known: Vec<_> = DEFAULT_BANDS.iter().map(|band| band.name()).collect();
            bail!("unknown band `{name}` (known: {})", known.join(", "));
        };
        *band = band.with_calibration_offset(*offset);
    }
    Ok(bands)
}

/// Whole frames covering one report interval of audio, at least one.
pub fn frames_per_report(interval_ms: u32, sample_rate: u32, frame_size: usize) -> u64 {
    let samples = interval_ms as u64 * sample_rate as u64;
    let per_frame = 1000 * frame_size as u64;
    samples.div_ceil(per_frame).max(1)
}

pub fn measure(
    input: &InputArgs,
    interval_ms: u32,
    device: &str,
    band_offsets: &[(String, f32)],
) -> Result<()> {
    let bands = configure_bands(band_offsets)?;
    let source = InputSource::open(input)?;
    let sample_rate = source.sample_rate();
    let mut meter =
        Meter::<_, FFT_SIZE>::new(source, &bands).context("failed to set up meter")?;

    let window = frames_per_report(interval_ms, sample_rate, FFT_SIZE);
    info!(
        "metering {} bands at {} Hz, reporting every {} frames",
        bands.len(),
        sample_rate,
        window
    );

    let mut frames_in_window = 0;
    let mut reports = 0;
    loop {
        match meter.cycle() {
            Ok(()) => frames_in_window += 1,
            Err(Error::Acquire(AcquireError::Exhausted)) => break,
            Err(err) => bail!("measurement stopped: {err}"),
        }
        if frames_in_window == window {
            print_readings(device, &meter.report())?;
            frames_in_window = 0;
            reports += 1;
        }
    }

    if frames_in_window > 0 {
        debug!("flushing partial window of {frames_in_window} frames");
        print_readings(device, &meter.report())?;
        reports += 1;
    }
    if reports == 0 {
        warn!("input ended before a single frame was metered");
    }
    info!("{} frames in {} reports", meter.cycles(), reports);
    Ok(())
}

fn print_readings(device: &str, readings: &[BandReading]) -> Result<()> {
    for reading in readings {
        let topic = report::topic(device, reading.band)
            .map_err(|_| anyhow::anyhow!("device name `{device}` is too long for a topic"))?;
        let leq = reading
            .leq_text()
            .map_err(|_| anyhow::anyhow!("failed to format level"))?;
        let max = reading
            .max_text()
            .map_err(|_| anyhow::anyhow!("failed to format level"))?;
        println!("{topic} leq={leq} max={max}");
    }
    Ok(())
}

pub fn calibrate(input: &InputArgs, reference_db: f32) -> Result<()> {
    let mut source = InputSource::open(input)?;
    let sample_rate = source.sample_rate();
    let mut transform = SpectralTransform::<FFT_SIZE>::new()?;
    let mut calibrators: Vec<Calibrator> = DEFAULT_BANDS
        .iter()
        .map(|band| Calibrator::new(*band, sample_rate, FFT_SIZE))
        .collect();

    let mut frame = [0.0; FFT_SIZE];
    loop {
        match source.acquire(&mut frame) {
            Ok(()) => {}
            Err(AcquireError::Exhausted) => break,
            Err(err) => bail!("calibration stopped: {err}"),
        }
        let spectrum = transform.process(&frame);
        for calibrator in calibrators.iter_mut() {
            calibrator.observe(spectrum);
        }
    }

    for calibrator in &calibrators {
        let name = calibrator.band().name();
        match (calibrator.measured_dbfs(), calibrator.offset_for(reference_db)) {
            (Some(measured), Some(offset)) => {
                println!("{name}: measured {measured:.2} dBFS, offset {offset:.2} dB")
            }
            _ => println!("{name}: no frames measured"),
        }
    }
    info!(
        "{} frames against a {reference_db} dB SPL reference",
        calibrators.first().map_or(0, |c| c.frames())
    );
    Ok(())
}
