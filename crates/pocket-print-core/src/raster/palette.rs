//! Palette byte mapping and output shades.

use crate::{Error, Result};

/// Palette byte that maps every pixel index to its own shade (3, 2, 1, 0).
pub const DEFAULT_PALETTE_BYTE: u8 = 0xE4;

/// Number of shades a pixel can take.
pub const SHADE_COUNT: usize = 4;

/// Fixed RGBA lookup for the four shades, darkest first.
pub const DEFAULT_RGBA: [u32; SHADE_COUNT] = [0xff000000, 0xff555555, 0xffaaaaaa, 0xffffffff];

/// Remaps 2-bit tile indices through the palette byte of a Print command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette(u8);

impl Default for Palette {
    fn default() -> Self {
        Self(DEFAULT_PALETTE_BYTE)
    }
}

impl Palette {
    /// Creates a palette from the raw byte.
    pub fn new(byte: u8) -> Self {
        Self(byte)
    }

    /// Returns the raw palette byte.
    pub fn byte(&self) -> u8 {
        self.0
    }

    /// Maps a 2-bit tile index to a shade, 0 being darkest.
    #[inline]
    pub fn map(&self, index: u8) -> u8 {
        3 - ((self.0 >> ((index & 3) << 1)) & 3)
    }
}

/// RGB colors for the four shades, darkest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shades([[u8; 3]; SHADE_COUNT]);

impl Default for Shades {
    fn default() -> Self {
        Self::grayscale()
    }
}

impl Shades {
    /// Creates shades from explicit colors.
    pub fn new(colors: [[u8; 3]; SHADE_COUNT]) -> Self {
        Self(colors)
    }

    /// Evenly spaced grays: shade × 85.
    pub fn grayscale() -> Self {
        let mut colors = [[0u8; 3]; SHADE_COUNT];
        for (shade, color) in colors.iter_mut().enumerate() {
            let level = shade as u8 * 85;
            *color = [level, level, level];
        }
        Self(colors)
    }

    /// Parses four hex colors such as `#AAAAAA`.
    pub fn from_hex<S: AsRef<str>>(colors: &[S]) -> Result<Self> {
        if colors.len() != SHADE_COUNT {
            return Err(Error::InvalidColor(format!(
                "expected {} colors, got {}",
                SHADE_COUNT,
                colors.len()
            )));
        }
        let mut parsed = [[0u8; 3]; SHADE_COUNT];
        for (slot, hex) in parsed.iter_mut().zip(colors) {
            let hex = hex.as_ref();
            *slot = parse_hex_color(hex).ok_or_else(|| Error::InvalidColor(hex.to_string()))?;
        }
        Ok(Self(parsed))
    }

    /// Formats the shades as `#RRGGBB` strings.
    pub fn to_hex(&self) -> Vec<String> {
        self.0
            .iter()
            .map(|[r, g, b]| format!("#{:02X}{:02X}{:02X}", r, g, b))
            .collect()
    }

    /// RGB color of a shade.
    pub fn rgb(&self, shade: u8) -> [u8; 3] {
        self.0[(shade & 3) as usize]
    }

    /// Opaque RGBA color of a shade.
    pub fn rgba(&self, shade: u8) -> [u8; 4] {
        let [r, g, b] = self.rgb(shade);
        [r, g, b, 0xFF]
    }

    /// PLTE chunk body: four RGB triples in index order.
    pub fn plte(&self) -> [u8; SHADE_COUNT * 3] {
        let mut out = [0u8; SHADE_COUNT * 3];
        for (chunk, color) in out.chunks_exact_mut(3).zip(self.0.iter()) {
            chunk.copy_from_slice(color);
        }
        out
    }
}

/// Parses a hex color string to RGB.
pub fn parse_hex_color(hex: &str) -> Option<[u8; 3]> {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some([r, g, b])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_palette() {
        let palette = Palette::default();
        assert_eq!(palette.map(0), 3);
        assert_eq!(palette.map(1), 2);
        assert_eq!(palette.map(2), 1);
        assert_eq!(palette.map(3), 0);
    }

    #[test]
    fn test_inverted_palette() {
        // 0b00_01_10_11
        let palette = Palette::new(0x1B);
        assert_eq!(palette.map(0), 0);
        assert_eq!(palette.map(3), 3);
    }

    #[test]
    fn test_grayscale_matches_rgba_lookup() {
        let shades = Shades::grayscale();
        for (shade, argb) in DEFAULT_RGBA.iter().enumerate() {
            let [r, g, b, a] = shades.rgba(shade as u8);
            assert_eq!(u32::from_be_bytes([a, r, g, b]), *argb);
        }
        assert_eq!(
            shades.plte(),
            [0, 0, 0, 85, 85, 85, 170, 170, 170, 255, 255, 255]
        );
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#FF0000"), Some([255, 0, 0]));
        assert_eq!(parse_hex_color("0f380f"), Some([0x0F, 0x38, 0x0F]));
        assert_eq!(parse_hex_color("invalid"), None);
        assert_eq!(parse_hex_color("#12345"), None);
    }

    #[test]
    fn test_shades_from_hex() {
        let shades = Shades::from_hex(&["#0F380F", "#306230", "#8BAC0F", "#9BBC0F"]).unwrap();
        assert_eq!(shades.rgb(3), [0x9B, 0xBC, 0x0F]);
        assert_eq!(shades.to_hex()[0], "#0F380F");

        assert!(Shades::from_hex(&["#000000"]).is_err());
        assert!(Shades::from_hex(&["#000000", "#111111", "#222222", "nope"]).is_err());
    }
}
