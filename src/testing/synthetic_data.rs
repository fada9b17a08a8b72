//! Synthetic screenshots shaped like libvirt's QEMU PPM output
//!
//! virsh writes `P6\n<width> <height>\n255\n` followed by packed RGB24, so
//! these helpers use the same header layout.

/// PPM header exactly as QEMU emits it
pub fn ppm_header(width: u32, height: u32) -> Vec<u8> {
    format!("P6\n{} {}\n255\n", width, height).into_bytes()
}

/// A complete PPM capture filled with one colour
pub fn solid_ppm_frame(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let mut frame = ppm_header(width, height);
    frame.extend(
        rgb.iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3),
    );
    frame
}

/// A gradient that shifts with `frame_number`, so consecutive frames differ
pub fn synthetic_ppm_frame(frame_number: u64, width: u32, height: u32) -> Vec<u8> {
    let mut frame = ppm_header(width, height);
    let header_len = frame.len();
    frame.resize(header_len + width as usize * height as usize * 3, 0);

    let base = (frame_number % 256) as u8;
    let pixels = &mut frame[header_len..];
    for y in 0..height {
        for x in 0..width {
            let idx = ((y * width + x) * 3) as usize;
            pixels[idx] = base.wrapping_add((x % 256) as u8);
            pixels[idx + 1] = base.wrapping_add((y % 256) as u8);
            pixels[idx + 2] = base.wrapping_add(((x + y) % 256) as u8);
        }
    }
    frame
}
