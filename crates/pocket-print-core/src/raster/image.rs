//! Indexed raster produced by the compositor.

use super::palette::{Shades, SHADE_COUNT};
use crate::{Error, Result, IMAGE_WIDTH};

/// Indexed pixel buffer; each byte is a shade in `0..4`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RasterImage {
    /// Pixel shades, row-major.
    data: Vec<u8>,
    /// Width of the image.
    width: u32,
    /// Height of the image.
    height: u32,
}

impl RasterImage {
    /// Creates a printer-width image of the given height, filled with shade 0.
    pub fn new(height: u32) -> Self {
        Self::with_dimensions(IMAGE_WIDTH, height)
    }

    /// Creates an image with custom dimensions.
    pub fn with_dimensions(width: u32, height: u32) -> Self {
        let size = width as usize * height as usize;
        Self {
            data: vec![0; size],
            width,
            height,
        }
    }

    /// Wraps an existing pixel buffer, checking its size and values.
    pub fn from_pixels(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        validate_indexed(&data, width, height)?;
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Returns the width of the image.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the height of the image.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns a reference to the raw pixel data.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Sets a pixel at the given coordinates.
    pub fn set_pixel(&mut self, x: u32, y: u32, shade: u8) {
        if x < self.width && y < self.height {
            let idx = y as usize * self.width as usize + x as usize;
            self.data[idx] = shade;
        }
    }

    /// Gets a pixel at the given coordinates.
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<u8> {
        if x < self.width && y < self.height {
            let idx = y as usize * self.width as usize + x as usize;
            Some(self.data[idx])
        } else {
            None
        }
    }

    /// Returns one pixel row.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let start = y as usize * self.width as usize;
        Some(&self.data[start..start + self.width as usize])
    }

    /// Expands the image to RGBA8 bytes through the given shades.
    pub fn to_rgba8(&self, shades: &Shades) -> Vec<u8> {
        expand_rgba8(&self.data, shades)
    }
}

/// Expands indexed pixels to RGBA8 bytes.
pub fn expand_rgba8(pixels: &[u8], shades: &Shades) -> Vec<u8> {
    let mut rgba = Vec::with_capacity(pixels.len() * 4);
    for &shade in pixels {
        rgba.extend_from_slice(&shades.rgba(shade));
    }
    rgba
}

/// Checks that an indexed buffer can be encoded as a PNG of the given size.
pub fn validate_indexed(pixels: &[u8], width: u32, height: u32) -> Result<()> {
    // PNG dimensions are limited to 2^31 - 1.
    if width == 0 || height == 0 || width > i32::MAX as u32 || height > i32::MAX as u32 {
        return Err(Error::InvalidDimensions { width, height });
    }
    let expected = width as usize * height as usize;
    if pixels.len() != expected {
        return Err(Error::PixelCount {
            expected,
            actual: pixels.len(),
        });
    }
    if let Some(&bad) = pixels.iter().find(|&&p| p as usize >= SHADE_COUNT) {
        return Err(Error::PaletteIndex(bad));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_ops() {
        let mut image = RasterImage::new(8);
        assert_eq!(image.width(), 160);
        assert_eq!(image.height(), 8);

        image.set_pixel(10, 7, 3);
        assert_eq!(image.get_pixel(10, 7), Some(3));
        assert_eq!(image.get_pixel(160, 0), None);
        assert_eq!(image.row(7).unwrap()[10], 3);
        assert!(image.row(8).is_none());
    }

    #[test]
    fn test_from_pixels_validation() {
        assert!(RasterImage::from_pixels(2, 2, vec![0, 1, 2, 3]).is_ok());
        assert!(matches!(
            RasterImage::from_pixels(2, 2, vec![0, 1, 2]),
            Err(Error::PixelCount {
                expected: 4,
                actual: 3
            })
        ));
        assert!(matches!(
            RasterImage::from_pixels(2, 1, vec![0, 4]),
            Err(Error::PaletteIndex(4))
        ));
        assert!(matches!(
            RasterImage::from_pixels(0, 1, vec![]),
            Err(Error::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_to_rgba8() {
        let image = RasterImage::from_pixels(2, 1, vec![0, 3]).unwrap();
        assert_eq!(
            image.to_rgba8(&Shades::grayscale()),
            vec![0, 0, 0, 255, 255, 255, 255, 255]
        );
    }
}
