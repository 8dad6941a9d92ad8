#![no_std]
#![no_main]

use db_sentry::config::{DMA_BUFFER_SIZE, FFT_SIZE, REPORT_INTERVAL_MS, SAMPLE_RATE_HZ};
use db_sentry::mic::{read_frames, FrameBus, FrameSignal, ReaderBuffers};
use defmt::{error, info, warn};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant};
use esp_backtrace as _;
use esp_hal::{
    dma_buffers,
    efuse::Efuse,
    i2s::master::{DataFormat, I2s, I2sRx, Standard},
    time::Rate,
    timer::{timg::TimerGroup, AnyTimer},
    Async,
};
use sentry_dsp::{
    report::{self, BandReading, DeviceId},
    selftest::{check_words, MicHealth},
    Meter, MicrophoneSource, RetryPolicy, SampleFormat, DEFAULT_BANDS,
};
use static_cell::{ConstStaticCell, StaticCell};

type SensorMeter = Meter<MicrophoneSource<FrameBus>, FFT_SIZE>;

// Large state lives in statics; the tasks only hold references to it.
static FRAME_SIGNAL: StaticCell<FrameSignal> = StaticCell::new();
static READER_BUFFERS: ConstStaticCell<ReaderBuffers> = ConstStaticCell::new(ReaderBuffers::new());
static METER: StaticCell<SensorMeter> = StaticCell::new();

#[embassy_executor::task]
async fn microphone_reader(
    i2s_rx: I2sRx<'static, Async>,
    dma_buffer: &'static mut [u8],
    buffers: &'static mut ReaderBuffers,
    signal: &'static FrameSignal,
) {
    info!("Starting microphone_reader task");
    read_frames(i2s_rx, dma_buffer, buffers, signal).await;
}

#[embassy_executor::task]
async fn sound_meter(
    signal: &'static FrameSignal,
    meter: &'static mut SensorMeter,
    device: DeviceId,
) {
    info!("Starting sound_meter task");

    {
        let first = signal.wait().await;
        match check_words(&first) {
            health @ MicHealth::Alive { .. } => info!("microphone ok: {}", health),
            health @ MicHealth::Quiet { .. } => warn!("microphone is very quiet: {}", health),
            health => error!("microphone not responding: {}", health),
        }
    }

    let interval = Duration::from_millis(REPORT_INTERVAL_MS as u64);
    let mut last_report = Instant::now();

    loop {
        let words = signal.wait().await;
        meter.source_mut().bus_mut().load(&words);
        if let Err(err) = meter.cycle() {
            warn!("frame dropped: {}", err);
            continue;
        }

        if last_report.elapsed() >= interval {
            last_report = Instant::now();
            publish(&device, &meter.report());
        }
    }
}

fn build_meter() -> Result<SensorMeter, sentry_dsp::Error> {
    // the frame is loaded whole before each cycle, so one read per slot is enough
    let source = MicrophoneSource::new(
        FrameBus::new(),
        SampleFormat::Left24In32,
        SAMPLE_RATE_HZ,
        FFT_SIZE,
    )
    .with_retry_policy(RetryPolicy::Bounded { max_attempts: 1 });
    Meter::new(source, &DEFAULT_BANDS)
}

fn publish(device: &str, readings: &[BandReading]) {
    for reading in readings {
        match (
            report::topic(device, reading.band),
            reading.leq_text(),
            reading.max_text(),
        ) {
            (Ok(topic), Ok(leq), Ok(max)) => info!(
                "{=str} leq={=str} max={=str}",
                topic.as_str(),
                leq.as_str(),
                max.as_str()
            ),
            _ => warn!("could not format reading for {=str}", reading.band),
        }
    }
}

/// Factory MAC as the little-endian integer the device id is cut from.
fn mac_to_u64(mac: [u8; 6]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes[..6].copy_from_slice(&mac);
    u64::from_le_bytes(bytes)
}

#[esp_hal_embassy::main]
async fn main(spawner: Spawner) {
    info!("Init!");

    let peripherals = esp_hal::init(esp_hal::Config::default());

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    let timer0: AnyTimer = timg0.timer0.into();

    let timg1 = TimerGroup::new(peripherals.TIMG1);
    let timer1: AnyTimer = timg1.timer0.into();

    esp_hal_embassy::init([timer0, timer1]);

    let device = report::device_id(mac_to_u64(Efuse::read_base_mac_address())).unwrap_or_default();
    info!("device id {=str}", device.as_str());

    let (rx_buffer, rx_descriptors, _, tx_descriptors) = dma_buffers!(DMA_BUFFER_SIZE, 0);

    let i2s = I2s::new(
        peripherals.I2S0,
        Standard::Philips,
        DataFormat::Data32Channel32,
        Rate::from_hz(SAMPLE_RATE_HZ),
        peripherals.DMA_CH0,
        rx_descriptors,
        tx_descriptors,
    )
    .into_async();

    let i2s_rx = i2s
        .i2s_rx
        .with_bclk(peripherals.GPIO4)
        .with_ws(peripherals.GPIO5)
        .with_din(peripherals.GPIO6)
        .build();

    let meter = match build_meter() {
        Ok(meter) => METER.init(meter),
        Err(err) => {
            error!("meter setup failed: {}", err);
            return;
        }
    };

    let frame_signal = &*FRAME_SIGNAL.init(Signal::new());

    spawner.must_spawn(microphone_reader(
        i2s_rx,
        rx_buffer,
        READER_BUFFERS.take(),
        frame_signal,
    ));
    spawner.must_spawn(sound_meter(frame_signal, meter, device));
}
