//! Capture loop and session lifecycle
//!
//! A session runs until its [`StopFlag`] is raised. The IVF writer and the
//! encoder are created lazily from the first successfully captured frame and
//! are flushed and finalized exactly once when the loop ends, on error paths
//! included.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::capture::{CaptureBuffer, ScreenshotSource, DEFAULT_BUFFER_CAPACITY};
use crate::errors::CaptureError;
use crate::ppm;
use crate::recording::{
    EncodeScheduler, EncoderFactory, FrameEncoder, IvfWriter, KEYFRAME_INTERVAL,
};
use crate::types::{EncoderSettings, RawFrameDescriptor, Timebase};
use crate::yuv::PlanarImage;

/// Stop request shared between the interrupt handler and the capture loop.
///
/// The handler side only ever stores `true`.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Raise this flag on Ctrl+C / SIGTERM.
    pub fn install_ctrlc_handler(&self) -> Result<(), CaptureError> {
        let flag = self.clone();
        ctrlc::set_handler(move || flag.request_stop()).map_err(|e| {
            CaptureError::ConfigError(format!("Failed to install interrupt handler: {}", e))
        })
    }
}

/// Parameters fixed for the lifetime of a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Intermediate IVF file, created on the first frame
    pub container_path: PathBuf,
    pub buffer_capacity: usize,
    pub timebase: Timebase,
    pub keyframe_interval: u32,
    pub lossless: bool,
}

impl SessionConfig {
    pub fn new(container_path: impl Into<PathBuf>) -> Self {
        Self {
            container_path: container_path.into(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            timebase: Timebase::default(),
            keyframe_interval: KEYFRAME_INTERVAL,
            lossless: false,
        }
    }
}

/// What a finished session produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub frames_captured: u64,
    /// Packets in the container, equal to its header frame count
    pub frames_written: u32,
    pub transient_failures: u64,
    pub width: u32,
    pub height: u32,
    pub container_path: PathBuf,
    pub bytes_written: u64,
}

/// Writer, scheduler and image that exist once dimensions are known.
struct Pipeline<E: FrameEncoder> {
    writer: IvfWriter<BufWriter<File>>,
    scheduler: EncodeScheduler<E>,
    image: PlanarImage,
}

impl<E: FrameEncoder> Pipeline<E> {
    fn open<F>(
        factory: &mut F,
        config: &SessionConfig,
        desc: &RawFrameDescriptor,
    ) -> Result<Self, CaptureError>
    where
        F: EncoderFactory<Encoder = E>,
    {
        log::info!(
            "Creating writer for {} of size {}x{}",
            config.container_path.display(),
            desc.width,
            desc.height
        );
        let encoder = factory.create(&EncoderSettings {
            width: desc.width,
            height: desc.height,
            timebase: config.timebase,
            lossless: config.lossless,
        })?;
        let writer = IvfWriter::create(
            &config.container_path,
            encoder.fourcc(),
            desc.width,
            desc.height,
            config.timebase,
        )?;

        Ok(Self {
            writer,
            scheduler: EncodeScheduler::with_keyframe_interval(encoder, config.keyframe_interval),
            image: PlanarImage::new(desc.width, desc.height),
        })
    }

    fn process(&mut self, desc: &RawFrameDescriptor, pixels: &[u8]) -> Result<(), CaptureError> {
        if desc.width != self.image.width() || desc.height != self.image.height() {
            return Err(CaptureError::DimensionMismatch(format!(
                "capture changed from {}x{} to {}x{} mid-session",
                self.image.width(),
                self.image.height(),
                desc.width,
                desc.height
            )));
        }
        self.image.fill_from_rgb(pixels)?;
        self.scheduler.encode_frame(&self.image, &mut self.writer)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Counters {
    frames_captured: u64,
    transient_failures: u64,
}

/// Capture-until-stopped controller.
pub struct CaptureSession<S: ScreenshotSource, F: EncoderFactory> {
    source: S,
    factory: F,
    config: SessionConfig,
    stop: StopFlag,
    buffer: CaptureBuffer,
}

impl<S: ScreenshotSource, F: EncoderFactory> CaptureSession<S, F> {
    pub fn new(source: S, factory: F, config: SessionConfig, stop: StopFlag) -> Self {
        let buffer = CaptureBuffer::with_capacity(config.buffer_capacity);
        Self {
            source,
            factory,
            config,
            stop,
            buffer,
        }
    }

    pub fn stop_flag(&self) -> &StopFlag {
        &self.stop
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn container_path(&self) -> &Path {
        &self.config.container_path
    }

    /// Capture until stopped, then drain the encoder and finalize the file.
    ///
    /// A session stopped before any frame was captured produces no container
    /// and fails with [`CaptureError::NoFramesCaptured`].
    pub fn run(&mut self) -> Result<SessionSummary, CaptureError> {
        let mut pipeline: Option<Pipeline<F::Encoder>> = None;
        let mut counters = Counters::default();

        let outcome = self.capture_loop(&mut pipeline, &mut counters);

        let Some(mut pipeline) = pipeline else {
            outcome?;
            return Err(CaptureError::NoFramesCaptured);
        };

        log::info!(
            "Ending capture. {} frames captured. Flushing streams",
            counters.frames_captured
        );
        let drained = outcome.and_then(|_| pipeline.scheduler.flush(&mut pipeline.writer));
        let finished = pipeline.writer.finish();
        drained?;
        let stats = finished?;

        Ok(SessionSummary {
            frames_captured: counters.frames_captured,
            frames_written: stats.frames_written,
            transient_failures: counters.transient_failures,
            width: pipeline.image.width(),
            height: pipeline.image.height(),
            container_path: self.config.container_path.clone(),
            bytes_written: stats.bytes_written,
        })
    }

    fn capture_loop(
        &mut self,
        pipeline: &mut Option<Pipeline<F::Encoder>>,
        counters: &mut Counters,
    ) -> Result<(), CaptureError> {
        while !self.stop.is_stop_requested() {
            if !self.buffer.fill_from(&mut self.source)? {
                counters.transient_failures += 1;
                continue;
            }

            let frame = self.buffer.filled();
            let desc = ppm::parse_header(frame)?;
            let pixels = ppm::pixel_payload(frame, &desc)?;

            if pipeline.is_none() {
                *pipeline = Some(Pipeline::open(&mut self.factory, &self.config, &desc)?);
            }
            if let Some(pipeline) = pipeline.as_mut() {
                pipeline.process(&desc, pixels)?;
            }
            counters.frames_captured += 1;
        }
        Ok(())
    }
}
