//! Encoding and container output
//!
//! - [`EncodeScheduler`] numbers frames, forces keyframes on a fixed cadence
//!   and drains the encoder at end of stream
//! - [`IvfWriter`] frames the compressed packets into an IVF file whose
//!   header stays valid after every append
//! - [`FrameEncoder`] is the seam for the compressor; the `h264` feature
//!   provides an openh264 implementation
//!
//! # Example
//! ```rust,ignore
//! use virtcap::recording::{EncodeScheduler, H264Encoder, IvfWriter};
//!
//! let encoder = H264Encoder::new(&settings)?;
//! let mut writer = IvfWriter::create("out.ivf", *b"H264", 1024, 768, settings.timebase)?;
//! let mut scheduler = EncodeScheduler::new(encoder);
//!
//! // For each captured frame:
//! scheduler.encode_frame(&image, &mut writer)?;
//!
//! // When done:
//! scheduler.flush(&mut writer)?;
//! let stats = writer.finish()?;
//! ```

mod encoder;
pub mod ivf;
mod scheduler;

#[cfg(feature = "h264")]
pub use encoder::H264Encoder;
pub use encoder::{EncoderFactory, FrameEncoder};
pub use ivf::{ContainerStats, IvfHeader, IvfWriter};
pub use scheduler::{EncodeScheduler, FLUSH_FRAME_INDEX, KEYFRAME_INTERVAL};
