//! Packed RGB24 to planar YUV 4:2:0 conversion

use crate::errors::CaptureError;

/// I420 image with three separately owned planes.
///
/// Allocated once per session and overwritten in place for every frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanarImage {
    width: u32,
    height: u32,
    y: Vec<u8>,
    u: Vec<u8>,
    v: Vec<u8>,
}

impl PlanarImage {
    pub fn new(width: u32, height: u32) -> Self {
        let (cw, ch) = chroma_dimensions(width, height);
        Self {
            width,
            height,
            y: vec![0; width as usize * height as usize],
            u: vec![0; cw * ch],
            v: vec![0; cw * ch],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn y_plane(&self) -> &[u8] {
        &self.y
    }

    pub fn u_plane(&self) -> &[u8] {
        &self.u
    }

    pub fn v_plane(&self) -> &[u8] {
        &self.v
    }

    /// Width of a chroma row in samples
    pub fn chroma_width(&self) -> usize {
        chroma_dimensions(self.width, self.height).0
    }

    /// Overwrite all three planes from a packed RGB24 buffer.
    pub fn fill_from_rgb(&mut self, rgb: &[u8]) -> Result<(), CaptureError> {
        let expected = self.y.len() * 3;
        if rgb.len() != expected {
            return Err(CaptureError::MalformedFrame(format!(
                "Invalid frame size: expected {} bytes, got {}",
                expected,
                rgb.len()
            )));
        }
        rgb_to_yuv420(rgb, self.width, self.height, &mut self.y, &mut self.u, &mut self.v);
        Ok(())
    }

    /// Planes concatenated as a contiguous I420 buffer
    pub fn to_i420(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.y.len() + self.u.len() * 2);
        out.extend_from_slice(&self.y);
        out.extend_from_slice(&self.u);
        out.extend_from_slice(&self.v);
        out
    }
}

/// Chroma plane dimensions: half of each axis, rounded up.
pub fn chroma_dimensions(width: u32, height: u32) -> (usize, usize) {
    (width.div_ceil(2) as usize, height.div_ceil(2) as usize)
}

#[inline]
fn clamp(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

// Division is `/` on signed values (truncates toward zero), not `>> 8`;
// the two disagree for negative chroma intermediates.
#[inline]
pub fn luma(r: i32, g: i32, b: i32) -> u8 {
    clamp((66 * r + 129 * g + 25 * b + 128) / 256 + 16)
}

#[inline]
pub fn chroma_u(r: i32, g: i32, b: i32) -> u8 {
    clamp((-38 * r - 74 * g + 112 * b + 128) / 256 + 128)
}

#[inline]
pub fn chroma_v(r: i32, g: i32, b: i32) -> u8 {
    clamp((112 * r - 94 * g - 18 * b + 128) / 256 + 128)
}

/// Convert RGB24 into caller-provided I420 planes.
///
/// Chroma is point-sampled at even coordinates. Sample `(cx, cy)` reads pixel
/// `(2cx, 2cy)`, which exists for odd dimensions too, so the trailing
/// row/column of an odd-sized image is covered.
pub fn rgb_to_yuv420(
    rgb: &[u8],
    width: u32,
    height: u32,
    y_plane: &mut [u8],
    u_plane: &mut [u8],
    v_plane: &mut [u8],
) {
    let w = width as usize;
    let h = height as usize;
    let (cw, _) = chroma_dimensions(width, height);

    for (row, (src, dst)) in rgb
        .chunks_exact(w * 3)
        .zip(y_plane.chunks_exact_mut(w))
        .take(h)
        .enumerate()
    {
        for (px, out) in src.chunks_exact(3).zip(dst.iter_mut()) {
            *out = luma(px[0] as i32, px[1] as i32, px[2] as i32);
        }

        if row % 2 == 0 {
            let chroma_row = row / 2;
            let u_row = &mut u_plane[chroma_row * cw..(chroma_row + 1) * cw];
            let v_row = &mut v_plane[chroma_row * cw..(chroma_row + 1) * cw];
            for (cx, px) in src.chunks_exact(3).step_by(2).enumerate() {
                let (r, g, b) = (px[0] as i32, px[1] as i32, px[2] as i32);
                u_row[cx] = chroma_u(r, g, b);
                v_row[cx] = chroma_v(r, g, b);
            }
        }
    }
}
