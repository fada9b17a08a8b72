//! Encoder interface and the openh264 backend

use crate::errors::CaptureError;
use crate::types::{EncodedPacket, EncoderSettings};
use crate::yuv::PlanarImage;

/// A compressor the scheduler can drive.
///
/// `encode` submits one image (or `None` to flush buffered frames) and
/// `next_packet` pulls whatever compressed output is ready, oldest first.
pub trait FrameEncoder {
    /// Four-character codec tag written into the container header
    fn fourcc(&self) -> [u8; 4];

    fn encode(
        &mut self,
        image: Option<&PlanarImage>,
        frame_index: i64,
        force_keyframe: bool,
    ) -> Result<(), CaptureError>;

    fn next_packet(&mut self) -> Option<EncodedPacket>;
}

impl<E: FrameEncoder + ?Sized> FrameEncoder for Box<E> {
    fn fourcc(&self) -> [u8; 4] {
        (**self).fourcc()
    }

    fn encode(
        &mut self,
        image: Option<&PlanarImage>,
        frame_index: i64,
        force_keyframe: bool,
    ) -> Result<(), CaptureError> {
        (**self).encode(image, frame_index, force_keyframe)
    }

    fn next_packet(&mut self) -> Option<EncodedPacket> {
        (**self).next_packet()
    }
}

/// Builds an encoder once the first frame fixes the session dimensions.
pub trait EncoderFactory {
    type Encoder: FrameEncoder;

    fn create(&mut self, settings: &EncoderSettings) -> Result<Self::Encoder, CaptureError>;
}

impl<E, F> EncoderFactory for F
where
    E: FrameEncoder,
    F: FnMut(&EncoderSettings) -> Result<E, CaptureError>,
{
    type Encoder = E;

    fn create(&mut self, settings: &EncoderSettings) -> Result<E, CaptureError> {
        self(settings)
    }
}

#[cfg(feature = "h264")]
pub use self::h264::H264Encoder;

#[cfg(feature = "h264")]
mod h264 {
    use super::*;
    use std::collections::VecDeque;

    use openh264::encoder::{
        BitRate, Encoder, EncoderConfig, FrameRate, FrameType, RateControlMode,
    };
    use openh264::formats::YUVBuffer;
    use openh264::OpenH264API;

    const MIN_BITRATE_BPS: u32 = 1_000_000;
    const MAX_BITRATE_BPS: u32 = 20_000_000;

    /// Target bitrate: 4 bits per luma sample of one frame, clamped.
    fn bitrate_for(width: u32, height: u32) -> u32 {
        width
            .saturating_mul(height)
            .saturating_mul(4)
            .clamp(MIN_BITRATE_BPS, MAX_BITRATE_BPS)
    }

    /// H.264 encoder using openh264
    ///
    /// openh264 has no lookahead, so every submitted image yields its packet
    /// immediately and a flush submission yields nothing. Frame skipping is
    /// disabled; a live frame without output is an error.
    pub struct H264Encoder {
        encoder: Encoder,
        width: u32,
        height: u32,
        pending: VecDeque<EncodedPacket>,
    }

    impl H264Encoder {
        /// Codec tag of every stream this encoder produces
        pub const FOURCC: [u8; 4] = *b"H264";

        pub fn new(settings: &EncoderSettings) -> Result<Self, CaptureError> {
            if settings.width % 2 != 0 || settings.height % 2 != 0 {
                return Err(CaptureError::EncodingError(format!(
                    "H.264 needs even dimensions, got {}x{}",
                    settings.width, settings.height
                )));
            }
            if settings.lossless {
                log::warn!("openh264 has no lossless mode; encoding lossy");
            }

            let bitrate = bitrate_for(settings.width, settings.height);
            let config = EncoderConfig::new()
                .bitrate(BitRate::from_bps(bitrate))
                .max_frame_rate(FrameRate::from_hz(settings.timebase.fps() as f32))
                .rate_control_mode(RateControlMode::Quality)
                .skip_frames(false);

            // Dimensions are inferred from the YUVSource at encode time
            let encoder = Encoder::with_api_config(OpenH264API::from_source(), config).map_err(
                |e| CaptureError::EncodingError(format!("Failed to create encoder: {}", e)),
            )?;
            log::debug!(
                "openh264 encoder {}x{} at {} bps",
                settings.width,
                settings.height,
                bitrate
            );

            Ok(Self {
                encoder,
                width: settings.width,
                height: settings.height,
                pending: VecDeque::new(),
            })
        }
    }

    impl FrameEncoder for H264Encoder {
        fn fourcc(&self) -> [u8; 4] {
            Self::FOURCC
        }

        fn encode(
            &mut self,
            image: Option<&PlanarImage>,
            frame_index: i64,
            force_keyframe: bool,
        ) -> Result<(), CaptureError> {
            let Some(image) = image else {
                return Ok(());
            };
            if image.width() != self.width || image.height() != self.height {
                return Err(CaptureError::EncodingError(format!(
                    "Frame dimensions {}x{} don't match encoder {}x{}",
                    image.width(),
                    image.height(),
                    self.width,
                    self.height
                )));
            }

            if force_keyframe {
                self.encoder.force_intra_frame();
            }

            let yuv_buffer =
                YUVBuffer::from_vec(image.to_i420(), self.width as usize, self.height as usize);
            let bitstream = self
                .encoder
                .encode(&yuv_buffer)
                .map_err(|e| CaptureError::EncodingError(format!("Encoding failed: {}", e)))?;

            let frame_type = bitstream.frame_type();
            let is_keyframe = matches!(frame_type, FrameType::IDR | FrameType::I);
            let data = bitstream.to_vec();

            // No lookahead: an empty bitstream means the frame was dropped
            if data.is_empty() || matches!(frame_type, FrameType::Skip) {
                return Err(CaptureError::EncodingError(format!(
                    "encoder produced no output for frame {}",
                    frame_index
                )));
            }
            self.pending.push_back(EncodedPacket {
                data,
                pts: frame_index,
                is_keyframe,
            });
            Ok(())
        }

        fn next_packet(&mut self) -> Option<EncodedPacket> {
            self.pending.pop_front()
        }
    }

}
