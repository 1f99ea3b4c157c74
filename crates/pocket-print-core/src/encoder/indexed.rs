//! Palette PNG writer.
//!
//! Produces signature, IHDR (8-bit, color type 3), PLTE with the four
//! shades, a single zlib-compressed IDAT with filter type 0 on every
//! scanline, and IEND.

use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Write;

use super::chunk::{write_chunk, PNG_SIGNATURE};
use super::PngBackend;
use crate::raster::image::validate_indexed;
use crate::raster::Shades;
use crate::Result;

/// IHDR bit depth.
const BIT_DEPTH: u8 = 8;

/// IHDR color type for palette images.
const COLOR_TYPE_INDEXED: u8 = 3;

/// Scanline filter type "none".
const FILTER_NONE: u8 = 0;

/// Encodes indexed pixels as a palette PNG.
pub fn encode_indexed(
    pixels: &[u8],
    width: u32,
    height: u32,
    shades: &Shades,
    level: u32,
) -> Result<Vec<u8>> {
    validate_indexed(pixels, width, height)?;

    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&height.to_be_bytes());
    // Bit depth, color type, compression, filter, interlace
    ihdr.extend_from_slice(&[BIT_DEPTH, COLOR_TYPE_INDEXED, 0, 0, 0]);

    let mut scanlines = Vec::with_capacity(pixels.len() + height as usize);
    for row in pixels.chunks_exact(width as usize) {
        scanlines.push(FILTER_NONE);
        scanlines.extend_from_slice(row);
    }

    let mut zlib = ZlibEncoder::new(Vec::new(), Compression::new(level.min(9)));
    zlib.write_all(&scanlines)?;
    let idat = zlib.finish()?;

    let mut png = Vec::with_capacity(PNG_SIGNATURE.len() + idat.len() + 64);
    png.extend_from_slice(&PNG_SIGNATURE);
    write_chunk(&mut png, b"IHDR", &ihdr);
    write_chunk(&mut png, b"PLTE", &shades.plte());
    write_chunk(&mut png, b"IDAT", &idat);
    write_chunk(&mut png, b"IEND", &[]);
    Ok(png)
}

/// Backend that writes palette PNGs itself.
#[derive(Debug, Clone)]
pub struct IndexedPng {
    shades: Shades,
    level: u32,
}

impl IndexedPng {
    /// Creates a backend with the given shades and zlib level (0-9).
    pub fn new(shades: Shades, level: u32) -> Self {
        Self { shades, level }
    }
}

impl Default for IndexedPng {
    fn default() -> Self {
        Self::new(Shades::default(), 6)
    }
}

impl PngBackend for IndexedPng {
    fn name(&self) -> &str {
        "indexed"
    }

    fn encode(&self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
        encode_indexed(pixels, width, height, &self.shades, self.level)
    }
}
