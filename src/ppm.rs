//! Binary PPM (`P6`) header parsing for raw screenshots
//!
//! libvirt screenshots of QEMU domains arrive as binary PPM images: an ASCII
//! header `P6 <width> <height> <maxval>` followed by exactly one whitespace
//! byte and then packed 8-bit RGB triples.

use crate::errors::CaptureError;
use crate::types::RawFrameDescriptor;

const MAGIC: &[u8] = b"P6";
/// Longest decimal field accepted; keeps `u32` parsing overflow-free.
const MAX_FIELD_DIGITS: usize = 9;

/// Parse the header at the start of `buf` and locate the pixel payload.
pub fn parse_header(buf: &[u8]) -> Result<RawFrameDescriptor, CaptureError> {
    if !buf.starts_with(MAGIC) {
        return Err(CaptureError::MalformedFrame(
            "missing P6 magic at start of capture".to_string(),
        ));
    }

    let mut pos = MAGIC.len();
    let width = read_field(buf, &mut pos, "width")?;
    let height = read_field(buf, &mut pos, "height")?;
    let max_value = read_field(buf, &mut pos, "maxval")?;

    // Exactly one whitespace byte separates the header from the pixels.
    match buf.get(pos) {
        Some(b) if b.is_ascii_whitespace() => pos += 1,
        _ => {
            return Err(CaptureError::MalformedFrame(
                "header is not terminated by whitespace".to_string(),
            ))
        }
    }

    if width == 0 || height == 0 {
        return Err(CaptureError::MalformedFrame(format!(
            "invalid dimensions {}x{}",
            width, height
        )));
    }
    if max_value == 0 || max_value > 255 {
        return Err(CaptureError::MalformedFrame(format!(
            "unsupported maxval {} (only 8-bit samples are handled)",
            max_value
        )));
    }

    Ok(RawFrameDescriptor {
        width,
        height,
        max_value,
        payload_offset: pos,
    })
}

/// Borrow the packed RGB payload described by `desc` out of `buf`.
pub fn pixel_payload<'a>(
    buf: &'a [u8],
    desc: &RawFrameDescriptor,
) -> Result<&'a [u8], CaptureError> {
    let len = desc
        .payload_len()
        .ok_or_else(|| CaptureError::MalformedFrame("payload size overflows".to_string()))?;
    let end = desc
        .payload_offset
        .checked_add(len)
        .ok_or_else(|| CaptureError::MalformedFrame("payload size overflows".to_string()))?;

    buf.get(desc.payload_offset..end).ok_or_else(|| {
        CaptureError::MalformedFrame(format!(
            "truncated pixel data: need {} bytes after header, have {}",
            len,
            buf.len().saturating_sub(desc.payload_offset)
        ))
    })
}

fn read_field(buf: &[u8], pos: &mut usize, name: &str) -> Result<u32, CaptureError> {
    let start = *pos;
    while buf.get(*pos).is_some_and(|b| b.is_ascii_whitespace()) {
        *pos += 1;
    }
    if *pos == start {
        return Err(CaptureError::MalformedFrame(format!(
            "expected whitespace before {}",
            name
        )));
    }

    let digits_start = *pos;
    while buf.get(*pos).is_some_and(|b| b.is_ascii_digit()) {
        *pos += 1;
    }
    let digits = &buf[digits_start..*pos];
    if digits.is_empty() || digits.len() > MAX_FIELD_DIGITS {
        return Err(CaptureError::MalformedFrame(format!(
            "unparsable {} field",
            name
        )));
    }

    Ok(digits
        .iter()
        .fold(0u32, |acc, d| acc * 10 + u32::from(d - b'0')))
}
