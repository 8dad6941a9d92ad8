//! ICS-43432 capture: the DMA reader task side and the [`WordBus`] the meter
//! reads from.

use defmt::{error, info, warn};
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, signal::Signal};
use esp_hal::{i2s::master::I2sRx, Async};
use sentry_dsp::{i2s::FrameAssembler, WordBus};

use crate::config::{FFT_SIZE, MIC_CHANNEL, POP_BUFFER_SIZE};

/// Latest complete frame of raw left-justified words.
pub type FrameSignal = Signal<CriticalSectionRawMutex, [i32; FFT_SIZE]>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, defmt::Format)]
pub enum BusError {
    /// Read past the end of the loaded frame.
    Underrun,
}

/// Replays one captured frame word by word.
pub struct FrameBus {
    words: [i32; FFT_SIZE],
    next: usize,
}

impl FrameBus {
    pub const fn new() -> Self {
        Self {
            words: [0; FFT_SIZE],
            next: FFT_SIZE,
        }
    }

    pub fn load(&mut self, words: &[i32; FFT_SIZE]) {
        self.words = *words;
        self.next = 0;
    }
}

impl Default for FrameBus {
    fn default() -> Self {
        Self::new()
    }
}

impl WordBus for FrameBus {
    type Error = BusError;

    fn read_word(&mut self) -> Result<i32, BusError> {
        let word = *self.words.get(self.next).ok_or(BusError::Underrun)?;
        self.next += 1;
        Ok(word)
    }
}

/// Working memory of the reader task. Lives in a static, not in the task.
pub struct ReaderBuffers {
    assembler: FrameAssembler<FFT_SIZE>,
    data: [u8; POP_BUFFER_SIZE],
}

impl ReaderBuffers {
    pub const fn new() -> Self {
        Self {
            assembler: FrameAssembler::new(MIC_CHANNEL),
            data: [0; POP_BUFFER_SIZE],
        }
    }
}

impl Default for ReaderBuffers {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the circular DMA transfer forever, signalling every completed frame.
///
/// A frame that has not been picked up yet is replaced by the newer one.
pub async fn read_frames(
    i2s_rx: I2sRx<'static, Async>,
    dma_buffer: &'static mut [u8],
    buffers: &'static mut ReaderBuffers,
    signal: &'static FrameSignal,
) {
    let mut transaction = match i2s_rx.read_dma_circular_async(dma_buffer) {
        Ok(transaction) => transaction,
        Err(err) => {
            error!("I2S DMA did not start: {:?}", err);
            return;
        }
    };
    info!("I2S DMA running");

    let ReaderBuffers { assembler, data } = buffers;

    loop {
        if let Err(err) = transaction.available().await {
            warn!("I2S DMA error, dropping partial frame: {:?}", err);
            assembler.clear();
            continue;
        }
        match transaction.pop(data).await {
            Ok(count) => {
                assembler.push_bytes(&data[..count], |words| signal.signal(*words));
            }
            Err(err) => {
                warn!("I2S DMA pop failed: {:?}", err);
                assembler.clear();
            }
        }
    }
}
