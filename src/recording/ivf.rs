//! IVF elementary stream writer
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! file header, 32 bytes
//!   0  "DKIF"          4  version (0)      6  header size (32)
//!   8  fourcc         12  width           14  height
//!  16  rate (timebase denominator)        20  scale (timebase numerator)
//!  24  frame count    28  reserved (0)
//! frame record, 12 bytes + payload
//!   0  payload size    4  pts low 32 bits  8  pts high 32 bits
//! ```
//!
//! The frame count is patched after every append so the file is a valid
//! stream at all times.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use bytes::{BufMut, BytesMut};

use crate::errors::CaptureError;
use crate::types::Timebase;

pub const IVF_SIGNATURE: [u8; 4] = *b"DKIF";
pub const FILE_HEADER_LEN: usize = 32;
pub const FRAME_HEADER_LEN: usize = 12;
pub const FRAME_COUNT_OFFSET: u64 = 24;

/// Values carried in the 32-byte file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IvfHeader {
    pub fourcc: [u8; 4],
    pub width: u16,
    pub height: u16,
    pub timebase: Timebase,
    pub frame_count: u32,
}

impl IvfHeader {
    pub fn encode(&self) -> [u8; FILE_HEADER_LEN] {
        let mut buf = BytesMut::with_capacity(FILE_HEADER_LEN);
        buf.put_slice(&IVF_SIGNATURE);
        buf.put_u16_le(0);
        buf.put_u16_le(FILE_HEADER_LEN as u16);
        buf.put_slice(&self.fourcc);
        buf.put_u16_le(self.width);
        buf.put_u16_le(self.height);
        buf.put_u32_le(self.timebase.den);
        buf.put_u32_le(self.timebase.num);
        buf.put_u32_le(self.frame_count);
        buf.put_u32_le(0);

        let mut out = [0u8; FILE_HEADER_LEN];
        out.copy_from_slice(&buf);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CaptureError> {
        if bytes.len() < FILE_HEADER_LEN || bytes[..4] != IVF_SIGNATURE {
            return Err(CaptureError::ContainerError(
                "not an IVF file header".to_string(),
            ));
        }
        let header_len = u16::from_le_bytes([bytes[6], bytes[7]]);
        if header_len as usize != FILE_HEADER_LEN {
            return Err(CaptureError::ContainerError(format!(
                "unexpected IVF header length {}",
                header_len
            )));
        }
        let le32 = |at: usize| {
            u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };

        Ok(Self {
            fourcc: [bytes[8], bytes[9], bytes[10], bytes[11]],
            width: u16::from_le_bytes([bytes[12], bytes[13]]),
            height: u16::from_le_bytes([bytes[14], bytes[15]]),
            timebase: Timebase::new(le32(20), le32(16)),
            frame_count: le32(24),
        })
    }
}

/// Encode the 12-byte record header that precedes each payload.
pub fn encode_frame_header(payload_len: u32, pts: i64) -> [u8; FRAME_HEADER_LEN] {
    let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN);
    buf.put_u32_le(payload_len);
    buf.put_u32_le((pts & 0xFFFF_FFFF) as u32);
    buf.put_u32_le((pts >> 32) as u32);

    let mut out = [0u8; FRAME_HEADER_LEN];
    out.copy_from_slice(&buf);
    out
}

/// Totals reported when a writer is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerStats {
    pub frames_written: u32,
    pub bytes_written: u64,
}

/// Owns the output handle of an IVF stream.
///
/// `finish` is idempotent; dropping an unfinished writer finishes it.
pub struct IvfWriter<W: Write + Seek> {
    out: Option<W>,
    header: IvfHeader,
    bytes_written: u64,
}

impl IvfWriter<BufWriter<File>> {
    /// Create (truncate) `path` and write the initial header.
    pub fn create<P: AsRef<Path>>(
        path: P,
        fourcc: [u8; 4],
        width: u32,
        height: u32,
        timebase: Timebase,
    ) -> Result<Self, CaptureError> {
        let file = File::create(path.as_ref()).map_err(|e| {
            CaptureError::IoError(format!(
                "Failed to create output file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::new(BufWriter::new(file), fourcc, width, height, timebase)
    }
}

impl<W: Write + Seek> IvfWriter<W> {
    pub fn new(
        mut out: W,
        fourcc: [u8; 4],
        width: u32,
        height: u32,
        timebase: Timebase,
    ) -> Result<Self, CaptureError> {
        let (width, height) = match (u16::try_from(width), u16::try_from(height)) {
            (Ok(w), Ok(h)) => (w, h),
            _ => {
                return Err(CaptureError::ContainerError(format!(
                    "dimensions {}x{} exceed the 16-bit IVF header fields",
                    width, height
                )))
            }
        };

        let header = IvfHeader {
            fourcc,
            width,
            height,
            timebase,
            frame_count: 0,
        };
        log::debug!("Writing IVF header for {}x{}", width, height);
        out.seek(SeekFrom::Start(0))?;
        out.write_all(&header.encode())?;

        Ok(Self {
            out: Some(out),
            header,
            bytes_written: FILE_HEADER_LEN as u64,
        })
    }

    /// Append one compressed payload and patch the header's frame count.
    pub fn write_frame(&mut self, payload: &[u8], pts: i64) -> Result<(), CaptureError> {
        let out = self.out.as_mut().ok_or_else(|| {
            CaptureError::ContainerError("write after the stream was finished".to_string())
        })?;
        let size = u32::try_from(payload.len()).map_err(|_| {
            CaptureError::ContainerError(format!("frame of {} bytes is too large", payload.len()))
        })?;

        log::debug!("Writing frame: {} bytes, pts {}", size, pts);
        out.write_all(&encode_frame_header(size, pts))
            .and_then(|_| out.write_all(payload))
            .map_err(|e| {
                CaptureError::ContainerError(format!("Failed to write compressed frame: {}", e))
            })?;

        self.header.frame_count += 1;
        self.bytes_written += (FRAME_HEADER_LEN + payload.len()) as u64;
        Self::patch_frame_count(out, self.header.frame_count)?;
        Ok(())
    }

    fn patch_frame_count(out: &mut W, count: u32) -> Result<(), CaptureError> {
        let end = out.stream_position()?;
        out.seek(SeekFrom::Start(FRAME_COUNT_OFFSET))?;
        out.write_all(&count.to_le_bytes())?;
        out.seek(SeekFrom::Start(end))?;
        Ok(())
    }

    pub fn frames_written(&self) -> u32 {
        self.header.frame_count
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn header(&self) -> &IvfHeader {
        &self.header
    }

    pub fn is_finished(&self) -> bool {
        self.out.is_none()
    }

    /// Rewrite the header, flush and release the handle. Later calls only
    /// report the totals.
    pub fn finish(&mut self) -> Result<ContainerStats, CaptureError> {
        if let Some(mut out) = self.out.take() {
            log::debug!("Finishing IVF stream with {} frames", self.header.frame_count);
            Self::rewrite_header(&mut out, &self.header)?;
        }
        Ok(self.stats())
    }

    /// Finish and hand back the underlying writer.
    pub fn into_inner(mut self) -> Result<W, CaptureError> {
        let mut out = self
            .out
            .take()
            .ok_or_else(|| CaptureError::ContainerError("stream already finished".to_string()))?;
        Self::rewrite_header(&mut out, &self.header)?;
        Ok(out)
    }

    fn rewrite_header(out: &mut W, header: &IvfHeader) -> Result<(), CaptureError> {
        let end = out.stream_position()?;
        out.seek(SeekFrom::Start(0))?;
        out.write_all(&header.encode())?;
        out.seek(SeekFrom::Start(end))?;
        out.flush()?;
        Ok(())
    }

    pub fn stats(&self) -> ContainerStats {
        ContainerStats {
            frames_written: self.header.frame_count,
            bytes_written: self.bytes_written,
        }
    }
}

impl<W: Write + Seek> Drop for IvfWriter<W> {
    fn drop(&mut self) {
        if !self.is_finished() {
            if let Err(e) = self.finish() {
                log::warn!("Failed to finalize IVF stream on drop: {}", e);
            }
        }
    }
}
