//! Tile memory and strip compositing.
//!
//! Fill commands append 2bpp tile data to VRAM, Print commands snapshot it
//! together with a palette byte, and at the end of a session every snapshot
//! is decoded and stacked top to bottom into one image.
//!
//! VRAM layout: 20 tiles per 8-pixel strip, 16 bytes per tile (one low and
//! one high bit-plane byte per tile row), so 40 bytes cover one pixel row.

use tracing::{debug, warn};

use super::image::RasterImage;
use super::palette::Palette;
use crate::protocol::{rle, Command, Packet};
use crate::IMAGE_WIDTH;

/// Tile edge in pixels.
pub const TILE_SIZE: u32 = 8;

/// Tiles across one strip.
pub const TILES_PER_STRIP: u32 = IMAGE_WIDTH / TILE_SIZE;

/// VRAM bytes per pixel row.
pub const BYTES_PER_ROW: usize = 40;

/// Offset of the palette byte in a Print payload.
const PRINT_PALETTE_OFFSET: usize = 2;

/// One Print command's snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePart {
    pub palette: Palette,
    pub tiles: Vec<u8>,
}

impl ImagePart {
    /// Pixel rows this part contributes, rounded up to whole strips.
    pub fn rows(&self) -> u32 {
        let rows = (self.tiles.len() / BYTES_PER_ROW) as u32;
        rows.div_ceil(TILE_SIZE) * TILE_SIZE
    }

    /// Decodes this part into `image`, starting at pixel row `top`.
    ///
    /// Tile bytes missing from a partial final strip decode as zero.
    fn draw(&self, image: &mut RasterImage, top: u32) {
        let mut offset = 0;
        for strip in 0..self.rows() / TILE_SIZE {
            let y = top + strip * TILE_SIZE;
            for tile in 0..TILES_PER_STRIP {
                let x = tile * TILE_SIZE;
                for py in 0..TILE_SIZE {
                    let mut lo = self.tiles.get(offset).copied().unwrap_or(0);
                    let mut hi = self.tiles.get(offset + 1).copied().unwrap_or(0);
                    offset += 2;
                    for px in 0..TILE_SIZE {
                        let index = (lo >> 7) | ((hi >> 7) << 1);
                        image.set_pixel(x + px, y + py, self.palette.map(index));
                        lo <<= 1;
                        hi <<= 1;
                    }
                }
            }
        }
    }
}

/// Accumulates VRAM and image parts for one session.
#[derive(Debug, Default)]
pub struct Compositor {
    vram: Vec<u8>,
    parts: Vec<ImagePart>,
    height: u32,
}

impl Compositor {
    /// Creates an empty compositor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one packet.
    pub fn apply(&mut self, packet: &Packet) {
        match packet.command {
            Command::Init => self.init(),
            Command::Fill => self.fill(packet.is_compressed(), &packet.payload),
            Command::Print => self.print(&packet.payload),
            Command::Status | Command::Unknown(_) => {}
        }
    }

    /// Clears VRAM.
    pub fn init(&mut self) {
        self.vram.clear();
    }

    /// Appends tile data, expanding it first when `compressed`.
    pub fn fill(&mut self, compressed: bool, payload: &[u8]) {
        if compressed {
            if let Err(e) = rle::decompress_into(payload, &mut self.vram) {
                warn!("Truncated compressed fill: {}", e);
            }
        } else {
            self.vram.extend_from_slice(payload);
        }
    }

    /// Records a snapshot of VRAM with the palette from `payload`.
    pub fn print(&mut self, payload: &[u8]) {
        let palette = match payload.get(PRINT_PALETTE_OFFSET) {
            Some(&byte) => Palette::new(byte),
            None => {
                warn!(
                    "Print payload has {} bytes, using default palette",
                    payload.len()
                );
                Palette::default()
            }
        };
        let part = ImagePart {
            palette,
            tiles: self.vram.clone(),
        };
        self.height += part.rows();
        debug!(
            "Image part {}: {} bytes, palette {:#04X}, height now {}",
            self.parts.len(),
            part.tiles.len(),
            palette.byte(),
            self.height
        );
        self.parts.push(part);
    }

    /// Current VRAM contents.
    pub fn vram(&self) -> &[u8] {
        &self.vram
    }

    /// Parts recorded so far.
    pub fn parts(&self) -> &[ImagePart] {
        &self.parts
    }

    /// Total height of the image in pixel rows.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns true if no Print command has been seen.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Stitches all parts into one image.
    ///
    /// Returns `None` when there is nothing to draw: no parts, or parts that
    /// held less than one pixel row of VRAM.
    pub fn render(&self) -> Option<RasterImage> {
        if self.height == 0 {
            if !self.parts.is_empty() {
                warn!("{} image parts without tile data", self.parts.len());
            }
            return None;
        }

        let mut image = RasterImage::new(self.height);
        let mut top = 0;
        for part in &self.parts {
            part.draw(&mut image, top);
            top += part.rows();
        }
        Some(image)
    }
}
