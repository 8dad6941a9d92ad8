//! Reassembly of raw I2S DMA bytes into frames of sample words.
//!
//! The microphone runs in 32-bit stereo slots (`left`, `right`, little
//! endian). DMA hands the bytes over in arbitrary chunk sizes, so a slot may
//! be split across two chunks.

/// Bytes per 32-bit slot.
pub const SLOT_BYTES: usize = 4;
/// Bytes per stereo frame (left then right slot).
pub const STEREO_BYTES: usize = 2 * SLOT_BYTES;

/// Which stereo slot carries the microphone (set by its L/R select pin).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "logging", derive(defmt::Format))]
pub enum Channel {
    #[default]
    Left,
    Right,
}

/// Collects words of one channel until `N` of them form a frame.
pub struct FrameAssembler<const N: usize> {
    channel: Channel,
    carry: [u8; STEREO_BYTES],
    carried: usize,
    words: [i32; N],
    filled: usize,
}

impl<const N: usize> FrameAssembler<N> {
    pub const fn new(channel: Channel) -> Self {
        Self {
            channel,
            carry: [0; STEREO_BYTES],
            carried: 0,
            words: [0; N],
            filled: 0,
        }
    }

    /// Feed a chunk of DMA bytes, calling `on_frame` for every completed frame.
    ///
    /// Returns the number of frames completed by this chunk.
    pub fn push_bytes(&mut self, mut bytes: &[u8], mut on_frame: impl FnMut(&[i32; N])) -> usize {
        let mut frames = 0;
        while !bytes.is_empty() {
            let take = (STEREO_BYTES - self.carried).min(bytes.len());
            self.carry[self.carried..self.carried + take].copy_from_slice(&bytes[..take]);
            self.carried += take;
            bytes = &bytes[take..];

            if self.carried < STEREO_BYTES {
                break;
            }
            self.carried = 0;

            let offset = match self.channel {
                Channel::Left => 0,
                Channel::Right => SLOT_BYTES,
            };
            let mut slot = [0; SLOT_BYTES];
            slot.copy_from_slice(&self.carry[offset..offset + SLOT_BYTES]);
            self.words[self.filled] = i32::from_le_bytes(slot);
            self.filled += 1;

            if self.filled == N {
                self.filled = 0;
                frames += 1;
                on_frame(&self.words);
            }
        }
        frames
    }

    /// Words already collected towards the next frame.
    pub fn pending(&self) -> usize {
        self.filled
    }

    /// Drop any partial frame, e.g. after a DMA overrun.
    pub fn clear(&mut self) {
        self.carried = 0;
        self.filled = 0;
    }
}
