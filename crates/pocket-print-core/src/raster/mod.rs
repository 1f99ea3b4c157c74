//! Raster module.
//!
//! Turns accumulated tile data into an indexed 160-pixel-wide image.

pub mod compositor;
pub mod image;
pub mod palette;

pub use compositor::{Compositor, ImagePart};
pub use image::RasterImage;
pub use palette::{parse_hex_color, Palette, Shades};
