//! Screenshot acquisition into a fixed, reused capture buffer

mod virsh;

use std::io::{ErrorKind, Read};

use crate::errors::CaptureError;

pub use virsh::{VirshSettings, VirshSource};

/// Default capture buffer size: ten 1024x768 RGB24 frames worth of bytes.
pub const DEFAULT_BUFFER_CAPACITY: usize = 1024 * 768 * 3 * 10;

/// Something that can deposit one raw screenshot into a caller buffer.
pub trait ScreenshotSource {
    /// Write one capture into `buf`.
    ///
    /// `Ok(Some(n))` means `n <= buf.len()` bytes were written. `Ok(None)`
    /// reports a transient failure that the caller retries. A capture that
    /// does not fit is `Err(CaptureError::FrameTooLarge)`.
    fn capture(&mut self, buf: &mut [u8]) -> Result<Option<usize>, CaptureError>;
}

impl<S: ScreenshotSource + ?Sized> ScreenshotSource for Box<S> {
    fn capture(&mut self, buf: &mut [u8]) -> Result<Option<usize>, CaptureError> {
        (**self).capture(buf)
    }
}

/// Fixed-capacity byte region that every capture is written into.
///
/// Allocated once and never resized.
pub struct CaptureBuffer {
    bytes: Box<[u8]>,
    len: usize,
}

impl CaptureBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: vec![0u8; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Bytes produced by the most recent successful capture
    pub fn filled(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Run one capture. Returns `false` on a transient failure.
    pub fn fill_from<S: ScreenshotSource + ?Sized>(
        &mut self,
        source: &mut S,
    ) -> Result<bool, CaptureError> {
        self.len = 0;
        match source.capture(&mut self.bytes)? {
            Some(n) if n > self.bytes.len() => Err(CaptureError::FrameTooLarge(format!(
                "source reported {} bytes for a {} byte buffer",
                n,
                self.bytes.len()
            ))),
            Some(n) => {
                self.len = n;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Stream `reader` into `buf` until EOF, failing if it does not fit.
pub fn read_into<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize, CaptureError> {
    let mut filled = 0;
    loop {
        if filled == buf.len() {
            let mut probe = [0u8; 1];
            return match reader.read(&mut probe) {
                Ok(0) => Ok(filled),
                Ok(_) => Err(CaptureError::FrameTooLarge(format!(
                    "screenshot exceeds the {} byte capture buffer",
                    buf.len()
                ))),
                Err(e) => Err(e.into()),
            };
        }
        match reader.read(&mut buf[filled..]) {
            Ok(0) => return Ok(filled),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedSource, SourceStep};
    use std::io::Cursor;

    #[test]
    fn test_read_into_exact_fit() {
        let mut buf = [0u8; 4];
        let n = read_into(&mut Cursor::new(vec![1, 2, 3, 4]), &mut buf).unwrap();
        assert_eq!(n, 4);
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn test_read_into_short_input() {
        let mut buf = [0u8; 8];
        assert_eq!(read_into(&mut Cursor::new(vec![7; 3]), &mut buf).unwrap(), 3);
    }

    #[test]
    fn test_read_into_overflow_is_fatal() {
        let mut buf = [0u8; 4];
        assert!(matches!(
            read_into(&mut Cursor::new(vec![0; 5]), &mut buf),
            Err(CaptureError::FrameTooLarge(_))
        ));
    }

    #[test]
    fn test_capture_buffer_fill() {
        let mut buffer = CaptureBuffer::with_capacity(16);
        let mut source = ScriptedSource::new([
            SourceStep::Frame(vec![5; 10]),
            SourceStep::Transient,
        ]);

        assert!(buffer.fill_from(&mut source).unwrap());
        assert_eq!(buffer.filled(), &[5; 10]);

        assert!(!buffer.fill_from(&mut source).unwrap());
        assert!(buffer.filled().is_empty());
        assert_eq!(buffer.capacity(), 16);
    }

    struct LyingSource;

    impl ScreenshotSource for LyingSource {
        fn capture(&mut self, buf: &mut [u8]) -> Result<Option<usize>, CaptureError> {
            Ok(Some(buf.len() + 1))
        }
    }

    #[test]
    fn test_capture_buffer_rejects_overlong_report() {
        let mut buffer = CaptureBuffer::with_capacity(4);
        assert!(matches!(
            buffer.fill_from(&mut LyingSource),
            Err(CaptureError::FrameTooLarge(_))
        ));
    }
}
