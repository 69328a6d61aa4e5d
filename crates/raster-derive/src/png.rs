//! PNG encoding for RGBA canvases.
//!
//! Classified imagery is one fixed-size canvas per artifact, so a plain
//! 8-bit RGBA encoding (color type 6) is all that is needed.

use std::io::Write;

use climate_common::{PipelineError, PipelineResult};
use flate2::write::ZlibEncoder;
use flate2::Compression;

/// Encode RGBA pixel data (4 bytes per pixel) as a PNG file.
pub fn encode_rgba(pixels: &[u8], width: usize, height: usize) -> PipelineResult<Vec<u8>> {
    if pixels.len() != width * height * 4 {
        return Err(PipelineError::backend(format!(
            "pixel buffer length {} does not match {}x{} RGBA",
            pixels.len(),
            width,
            height
        )));
    }

    let mut png = Vec::new();
    png.extend_from_slice(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);

    // IHDR: 8-bit depth, color type 6 (RGBA), default methods.
    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&(width as u32).to_be_bytes());
    ihdr.extend_from_slice(&(height as u32).to_be_bytes());
    ihdr.extend_from_slice(&[8, 6, 0, 0, 0]);
    write_chunk(&mut png, b"IHDR", &ihdr);

    // IDAT: filter byte 0 per scanline, zlib-compressed.
    let mut raw = Vec::with_capacity(height * (1 + width * 4));
    for row in pixels.chunks_exact(width * 4) {
        raw.push(0);
        raw.extend_from_slice(row);
    }
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&raw)
        .and_then(|_| encoder.finish())
        .map(|compressed| write_chunk(&mut png, b"IDAT", &compressed))
        .map_err(|e| PipelineError::backend(format!("PNG compression failed: {e}")))?;

    write_chunk(&mut png, b"IEND", &[]);
    Ok(png)
}

fn write_chunk(out: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(kind);
    hasher.update(data);
    out.extend_from_slice(&hasher.finalize().to_be_bytes());
}
