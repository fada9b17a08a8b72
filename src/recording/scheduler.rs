//! Frame indexing, keyframe cadence and end-of-stream draining

use std::io::{Seek, Write};

use super::encoder::FrameEncoder;
use super::ivf::IvfWriter;
use crate::errors::CaptureError;
use crate::yuv::PlanarImage;

/// Frames between forced keyframes; two seconds at the default 5 fps.
pub const KEYFRAME_INTERVAL: u32 = 10;

/// Frame index submitted with flush requests
pub const FLUSH_FRAME_INDEX: i64 = -1;

/// Drives an encoder one frame at a time and routes every packet it emits
/// into the container, in the order the encoder produced them.
pub struct EncodeScheduler<E: FrameEncoder> {
    encoder: E,
    keyframe_interval: i64,
    next_index: i64,
    packets_written: u64,
}

impl<E: FrameEncoder> EncodeScheduler<E> {
    pub fn new(encoder: E) -> Self {
        Self::with_keyframe_interval(encoder, KEYFRAME_INTERVAL)
    }

    /// A zero interval is treated as 1 (every frame is a keyframe).
    pub fn with_keyframe_interval(encoder: E, keyframe_interval: u32) -> Self {
        Self {
            encoder,
            keyframe_interval: i64::from(keyframe_interval.max(1)),
            next_index: 0,
            packets_written: 0,
        }
    }

    /// Whether the frame at `frame_index` is submitted with a forced keyframe.
    pub fn keyframe_due(&self, frame_index: i64) -> bool {
        frame_index >= 0 && frame_index % self.keyframe_interval == 0
    }

    /// Submit one live frame and write out whatever packets are ready.
    ///
    /// Returns the number of packets written.
    pub fn encode_frame<W: Write + Seek>(
        &mut self,
        image: &PlanarImage,
        writer: &mut IvfWriter<W>,
    ) -> Result<usize, CaptureError> {
        let index = self.next_index;
        let force_keyframe = self.keyframe_due(index);
        self.next_index += 1;

        log::debug!("Encoding frame {} (keyframe: {})", index, force_keyframe);
        self.encoder.encode(Some(image), index, force_keyframe)?;
        self.drain(writer)
    }

    /// Submit flush requests until the encoder stops producing packets.
    pub fn flush<W: Write + Seek>(
        &mut self,
        writer: &mut IvfWriter<W>,
    ) -> Result<usize, CaptureError> {
        let mut total = 0;
        loop {
            log::debug!("Flushing encoder");
            self.encoder.encode(None, FLUSH_FRAME_INDEX, false)?;
            let written = self.drain(writer)?;
            if written == 0 {
                break;
            }
            total += written;
        }
        Ok(total)
    }

    fn drain<W: Write + Seek>(&mut self, writer: &mut IvfWriter<W>) -> Result<usize, CaptureError> {
        let mut written = 0;
        while let Some(packet) = self.encoder.next_packet() {
            writer.write_frame(&packet.data, packet.pts)?;
            written += 1;
        }
        self.packets_written += written as u64;
        Ok(written)
    }

    /// Live frames submitted so far
    pub fn frames_encoded(&self) -> u64 {
        self.next_index as u64
    }

    pub fn packets_written(&self) -> u64 {
        self.packets_written
    }

    pub fn fourcc(&self) -> [u8; 4] {
        self.encoder.fourcc()
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }
}
