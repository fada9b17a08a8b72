//! Value types shared across the capture pipeline

use serde::{Deserialize, Serialize};

/// Location and shape of the pixel payload inside a raw capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFrameDescriptor {
    pub width: u32,
    pub height: u32,
    pub max_value: u32,
    /// Byte offset of the first pixel from the start of the capture buffer
    pub payload_offset: usize,
}

impl RawFrameDescriptor {
    /// Size of the packed RGB payload in bytes, `None` if it does not fit
    /// in `usize`
    pub fn payload_len(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(3)
    }
}

/// Encoder timebase; one tick lasts `num / den` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timebase {
    pub num: u32,
    pub den: u32,
}

impl Timebase {
    pub fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    /// Nominal output frame rate when one frame is emitted per tick
    pub fn fps(&self) -> f64 {
        if self.num == 0 {
            0.0
        } else {
            self.den as f64 / self.num as f64
        }
    }
}

impl Default for Timebase {
    /// One frame every fifth of a second
    fn default() -> Self {
        Self { num: 1, den: 5 }
    }
}

/// Opaque compressed bytes produced by an encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPacket {
    pub data: Vec<u8>,
    /// Presentation timestamp in timebase ticks
    pub pts: i64,
    pub is_keyframe: bool,
}

/// Parameters handed to an encoder factory once the first frame's
/// dimensions are known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderSettings {
    pub width: u32,
    pub height: u32,
    pub timebase: Timebase,
    pub lossless: bool,
}
