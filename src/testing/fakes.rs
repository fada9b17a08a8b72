//! Scriptable stand-ins for the hypervisor and the compressor

use std::collections::VecDeque;

use crate::capture::ScreenshotSource;
use crate::errors::CaptureError;
use crate::recording::FrameEncoder;
use crate::session::StopFlag;
use crate::types::EncodedPacket;
use crate::yuv::PlanarImage;

/// One scripted response from [`ScriptedSource`].
#[derive(Debug, Clone)]
pub enum SourceStep {
    Frame(Vec<u8>),
    /// Screenshot produced no data
    Transient,
    Fatal(String),
}

/// Replays a fixed list of captures, then optionally raises a stop request
/// the way a Ctrl+C would.
#[derive(Debug)]
pub struct ScriptedSource {
    steps: VecDeque<SourceStep>,
    stop_when_exhausted: Option<StopFlag>,
    calls: usize,
}

impl ScriptedSource {
    pub fn new(steps: impl IntoIterator<Item = SourceStep>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            stop_when_exhausted: None,
            calls: 0,
        }
    }

    /// `count` copies of the same capture
    pub fn repeat(frame: Vec<u8>, count: usize) -> Self {
        Self::new(std::iter::repeat(SourceStep::Frame(frame)).take(count))
    }

    pub fn stop_when_exhausted(mut self, stop: StopFlag) -> Self {
        self.stop_when_exhausted = Some(stop);
        self
    }

    /// Number of capture requests served so far
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl ScreenshotSource for ScriptedSource {
    fn capture(&mut self, buf: &mut [u8]) -> Result<Option<usize>, CaptureError> {
        self.calls += 1;
        match self.steps.pop_front() {
            Some(SourceStep::Frame(bytes)) => {
                if bytes.len() > buf.len() {
                    return Err(CaptureError::FrameTooLarge(format!(
                        "{} byte capture exceeds {} byte buffer",
                        bytes.len(),
                        buf.len()
                    )));
                }
                buf[..bytes.len()].copy_from_slice(&bytes);
                Ok(Some(bytes.len()))
            }
            Some(SourceStep::Transient) => Ok(None),
            Some(SourceStep::Fatal(message)) => Err(CaptureError::SourceError(message)),
            None => {
                if let Some(stop) = &self.stop_when_exhausted {
                    stop.request_stop();
                }
                Ok(None)
            }
        }
    }
}

/// What the scheduler asked of a [`LookaheadEncoder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    pub frame_index: i64,
    pub force_keyframe: bool,
    pub had_image: bool,
}

/// Encoder that holds back `depth` frames before emitting, like a
/// lookahead-enabled codec, and releases one held frame per flush request.
#[derive(Debug)]
pub struct LookaheadEncoder {
    depth: usize,
    held: VecDeque<EncodedPacket>,
    ready: VecDeque<EncodedPacket>,
    submissions: Vec<Submission>,
    fail_at: Option<usize>,
}

impl LookaheadEncoder {
    pub fn new(depth: usize) -> Self {
        Self {
            depth,
            held: VecDeque::new(),
            ready: VecDeque::new(),
            submissions: Vec::new(),
            fail_at: None,
        }
    }

    /// Fail the submission with this zero-based position
    pub fn fail_at(mut self, submission: usize) -> Self {
        self.fail_at = Some(submission);
        self
    }

    pub fn submissions(&self) -> &[Submission] {
        &self.submissions
    }

    /// Deterministic payload for a frame index
    pub fn payload_for(frame_index: i64, image: &PlanarImage) -> Vec<u8> {
        let len = 1 + (frame_index.rem_euclid(7)) as usize;
        let seed = image.y_plane().first().copied().unwrap_or(0);
        vec![seed.wrapping_add(frame_index as u8); len]
    }
}

impl FrameEncoder for LookaheadEncoder {
    fn fourcc(&self) -> [u8; 4] {
        *b"TEST"
    }

    fn encode(
        &mut self,
        image: Option<&PlanarImage>,
        frame_index: i64,
        force_keyframe: bool,
    ) -> Result<(), CaptureError> {
        if self.fail_at == Some(self.submissions.len()) {
            return Err(CaptureError::EncodingError(format!(
                "Failed to encode frame {}",
                frame_index
            )));
        }
        self.submissions.push(Submission {
            frame_index,
            force_keyframe,
            had_image: image.is_some(),
        });

        match image {
            Some(image) => {
                self.held.push_back(EncodedPacket {
                    data: Self::payload_for(frame_index, image),
                    pts: frame_index,
                    is_keyframe: force_keyframe,
                });
                while self.held.len() > self.depth {
                    if let Some(packet) = self.held.pop_front() {
                        self.ready.push_back(packet);
                    }
                }
            }
            None => {
                if let Some(packet) = self.held.pop_front() {
                    self.ready.push_back(packet);
                }
            }
        }
        Ok(())
    }

    fn next_packet(&mut self) -> Option<EncodedPacket> {
        self.ready.pop_front()
    }
}
