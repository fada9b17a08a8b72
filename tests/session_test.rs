//! End-to-end capture sessions against scripted screenshot sources
//!
//! Run with: cargo test --test session_test

use tempfile::tempdir;
use virtcap::recording::ivf::{IvfHeader, FILE_HEADER_LEN, FRAME_HEADER_LEN};
use virtcap::testing::{
    solid_ppm_frame, synthetic_ppm_frame, LookaheadEncoder, ScriptedSource, SourceStep,
};
use virtcap::{CaptureError, CaptureSession, EncoderSettings, SessionConfig, StopFlag};

fn lookahead(
    depth: usize,
) -> impl FnMut(&EncoderSettings) -> Result<LookaheadEncoder, CaptureError> {
    move |_| Ok(LookaheadEncoder::new(depth))
}

fn pts_of(bytes: &[u8]) -> Vec<i64> {
    let mut pts = Vec::new();
    let mut pos = FILE_HEADER_LEN;
    while pos + FRAME_HEADER_LEN <= bytes.len() {
        let h = &bytes[pos..pos + FRAME_HEADER_LEN];
        let size = u32::from_le_bytes([h[0], h[1], h[2], h[3]]) as usize;
        pts.push(i64::from(u32::from_le_bytes([h[4], h[5], h[6], h[7]])));
        pos += FRAME_HEADER_LEN + size;
    }
    assert_eq!(pos, bytes.len());
    pts
}

#[test]
fn ten_frames_with_lookahead_are_all_written() {
    let dir = tempdir().unwrap();
    let stop = StopFlag::new();
    let source = ScriptedSource::new(
        (0..10).map(|n| SourceStep::Frame(synthetic_ppm_frame(n, 16, 8))),
    )
    .stop_when_exhausted(stop.clone());

    let mut config = SessionConfig::new(dir.path().join("guest.ivf"));
    config.buffer_capacity = 1024;
    let mut session = CaptureSession::new(source, lookahead(3), config, stop);
    let summary = session.run().unwrap();

    assert_eq!(summary.frames_captured, 10);
    assert_eq!(summary.frames_written, 10);
    assert_eq!((summary.width, summary.height), (16, 8));

    let bytes = std::fs::read(&summary.container_path).unwrap();
    assert_eq!(bytes.len() as u64, summary.bytes_written);

    let header = IvfHeader::decode(&bytes).unwrap();
    assert_eq!(header.frame_count, 10);
    assert_eq!((header.width, header.height), (16, 8));
    assert_eq!(header.timebase.den, 5);
    assert_eq!(header.timebase.num, 1);
    assert_eq!(pts_of(&bytes), (0..10).collect::<Vec<_>>());
}

#[test]
fn stop_before_first_frame_leaves_no_output() {
    let dir = tempdir().unwrap();
    let stop = StopFlag::new();
    let source = ScriptedSource::new([SourceStep::Transient, SourceStep::Transient])
        .stop_when_exhausted(stop.clone());

    let path = dir.path().join("guest.ivf");
    let mut session = CaptureSession::new(source, lookahead(2), SessionConfig::new(&path), stop);
    assert!(matches!(session.run(), Err(CaptureError::NoFramesCaptured)));
    assert!(!path.exists());
}

#[test]
fn source_failure_still_finalizes_the_container() {
    let dir = tempdir().unwrap();
    let stop = StopFlag::new();
    let frame = solid_ppm_frame(4, 4, [10, 200, 30]);
    let mut steps: Vec<SourceStep> = std::iter::repeat(SourceStep::Frame(frame)).take(5).collect();
    steps.push(SourceStep::Fatal("domain went away".to_string()));
    let source = ScriptedSource::new(steps);

    let mut config = SessionConfig::new(dir.path().join("guest.ivf"));
    config.buffer_capacity = 256;
    let mut session = CaptureSession::new(source, lookahead(2), config, stop);
    let err = session.run().unwrap_err();
    assert!(matches!(err, CaptureError::SourceError(ref msg) if msg == "domain went away"));

    // Frames still held by the encoder are not drained after a failure, but
    // the header agrees with what made it to disk.
    let bytes = std::fs::read(dir.path().join("guest.ivf")).unwrap();
    assert_eq!(IvfHeader::decode(&bytes).unwrap().frame_count, 3);
    assert_eq!(pts_of(&bytes), vec![0, 1, 2]);
}

#[test]
fn encoder_failure_is_fatal() {
    let dir = tempdir().unwrap();
    let stop = StopFlag::new();
    let source = ScriptedSource::repeat(solid_ppm_frame(2, 2, [0, 0, 0]), 4);

    let mut config = SessionConfig::new(dir.path().join("guest.ivf"));
    config.buffer_capacity = 64;
    let factory = |_: &EncoderSettings| -> Result<LookaheadEncoder, CaptureError> {
        Ok(LookaheadEncoder::new(0).fail_at(2))
    };
    let mut session = CaptureSession::new(source, factory, config, stop);
    assert!(matches!(session.run(), Err(CaptureError::EncodingError(_))));

    let bytes = std::fs::read(dir.path().join("guest.ivf")).unwrap();
    assert_eq!(IvfHeader::decode(&bytes).unwrap().frame_count, 2);
}

#[test]
fn factory_failure_creates_no_container() {
    let dir = tempdir().unwrap();
    let stop = StopFlag::new();
    let source = ScriptedSource::repeat(solid_ppm_frame(2, 2, [0, 0, 0]), 1);

    let path = dir.path().join("guest.ivf");
    let factory = |settings: &EncoderSettings| -> Result<LookaheadEncoder, CaptureError> {
        Err(CaptureError::EncodingError(format!(
            "cannot encode {}x{}",
            settings.width, settings.height
        )))
    };
    let mut config = SessionConfig::new(&path);
    config.buffer_capacity = 64;
    let mut session = CaptureSession::new(source, factory, config, stop);
    assert!(matches!(
        session.run(),
        Err(CaptureError::EncodingError(ref m)) if m == "cannot encode 2x2"
    ));
    assert!(!path.exists());
}

#[test]
fn odd_dimensions_are_recorded() {
    let dir = tempdir().unwrap();
    let stop = StopFlag::new();
    let source = ScriptedSource::repeat(solid_ppm_frame(5, 3, [255, 0, 0]), 3)
        .stop_when_exhausted(stop.clone());

    let mut config = SessionConfig::new(dir.path().join("odd.ivf"));
    config.buffer_capacity = 128;
    let mut session = CaptureSession::new(source, lookahead(1), config, stop);
    let summary = session.run().unwrap();
    assert_eq!(summary.frames_written, 3);
    assert_eq!((summary.width, summary.height), (5, 3));
}
