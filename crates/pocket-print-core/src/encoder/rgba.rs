//! Truecolor PNG backend built on the `png` crate.

use super::PngBackend;
use crate::raster::image::{expand_rgba8, validate_indexed};
use crate::raster::Shades;
use crate::Result;

/// Backend that expands shades to RGBA and hands them to the `png` encoder.
#[derive(Debug, Clone, Default)]
pub struct RgbaPng {
    shades: Shades,
}

impl RgbaPng {
    /// Creates a backend with the given shades.
    pub fn new(shades: Shades) -> Self {
        Self { shades }
    }
}

impl PngBackend for RgbaPng {
    fn name(&self) -> &str {
        "rgba"
    }

    fn encode(&self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
        validate_indexed(pixels, width, height)?;
        let rgba = expand_rgba8(pixels, &self.shades);

        let mut png_data = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut png_data, width, height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header()?;
            writer.write_image_data(&rgba)?;
        }

        Ok(png_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_signature_and_validation() {
        let png = RgbaPng::default().encode(&[0, 3], 2, 1).unwrap();
        assert_eq!(&png[1..4], b"PNG");

        assert!(matches!(
            RgbaPng::default().encode(&[0, 3], 1, 1),
            Err(Error::PixelCount { .. })
        ));
    }
}
