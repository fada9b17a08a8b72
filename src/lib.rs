//! virtcap: record a running virtual machine's display as video
//!
//! Screenshots are pulled from libvirt at whatever rate the hypervisor can
//! deliver, converted from RGB24 to I420, compressed, and appended to an IVF
//! elementary stream that an external muxer later turns into a playable file.
//!
//! # Pipeline
//! - [`capture`]: screenshot sources writing into one fixed capture buffer
//! - [`ppm`]: locating the pixel payload of a raw PPM screenshot
//! - [`yuv`]: RGB24 to planar YUV 4:2:0
//! - [`recording`]: encoder seam, keyframe cadence and the IVF writer
//! - [`session`]: the capture-until-stopped loop and its shutdown protocol
//! - [`remux`]: hand-off to `mkvmerge` or `ffmpeg`
//!
//! # Usage
//! ```rust,ignore
//! use virtcap::{CaptureSession, SessionConfig, StopFlag, VirshSettings, VirshSource};
//! use virtcap::recording::H264Encoder;
//!
//! let stop = StopFlag::new();
//! stop.install_ctrlc_handler()?;
//!
//! let source = VirshSource::connect(VirshSettings::new("qemu:///system", "guest"))?;
//! let mut session = CaptureSession::new(
//!     source,
//!     |settings: &_| H264Encoder::new(settings),
//!     SessionConfig::new("/tmp/guest.ivf"),
//!     stop,
//! );
//! let summary = session.run()?;
//! ```
pub mod capture;
pub mod config;
pub mod errors;
pub mod ppm;
pub mod recording;
pub mod remux;
pub mod session;
pub mod types;
pub mod yuv;

// Testing utilities - synthetic screenshots and scripted collaborators
pub mod testing;

// Re-exports for convenience
pub use capture::{CaptureBuffer, ScreenshotSource, VirshSettings, VirshSource};
pub use config::VirtcapConfig;
pub use errors::CaptureError;
pub use remux::{RemuxTool, Remuxer};
pub use session::{CaptureSession, SessionConfig, SessionSummary, StopFlag};
pub use types::{EncodedPacket, EncoderSettings, RawFrameDescriptor, Timebase};

/// Initialize logging, defaulting to `info` (or `debug` when `verbose`).
///
/// `RUST_LOG` takes precedence when set.
pub fn init_logging(verbose: bool) {
    let default_filter = if verbose { "virtcap=debug" } else { "virtcap=info" };
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter),
    )
    .try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod lib_tests {
    use super::*;

    #[test]
    fn test_crate_name() {
        assert_eq!(NAME, "virtcap");
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_init_logging_twice_is_harmless() {
        init_logging(false);
        init_logging(true);
    }
}
