//! PNG encoding.
//!
//! Two interchangeable backends share the `encode(pixels, width, height)`
//! contract: [`IndexedPng`] assembles a palette PNG chunk by chunk, and
//! [`RgbaPng`] expands to truecolor and uses the `png` crate.

mod chunk;
mod indexed;
mod rgba;

use std::str::FromStr;
use std::sync::Arc;

pub use chunk::{chunk_crc, write_chunk, PNG_SIGNATURE};
pub use indexed::{encode_indexed, IndexedPng};
pub use rgba::RgbaPng;

use crate::raster::Shades;
use crate::{Error, Result};

/// Default zlib compression level.
pub const DEFAULT_COMPRESSION: u32 = 6;

/// Trait for PNG encoders.
pub trait PngBackend: Send + Sync {
    /// Returns the backend name.
    fn name(&self) -> &str;

    /// Encodes indexed pixels (shades `0..4`, row-major) as PNG bytes.
    fn encode(&self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>>;
}

/// Available PNG backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Palette PNG written by this crate.
    #[default]
    Indexed,
    /// RGBA PNG written by the `png` crate.
    Rgba,
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "indexed" => Ok(BackendKind::Indexed),
            "rgba" => Ok(BackendKind::Rgba),
            _ => Err(Error::InvalidBackend(s.to_string())),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Indexed => write!(f, "indexed"),
            BackendKind::Rgba => write!(f, "rgba"),
        }
    }
}

/// PNG output settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PngOptions {
    pub backend: BackendKind,
    pub shades: Shades,
    pub compression: u32,
}

impl Default for PngOptions {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            shades: Shades::default(),
            compression: DEFAULT_COMPRESSION,
        }
    }
}

impl PngOptions {
    /// Builds the configured backend.
    pub fn build(&self) -> Arc<dyn PngBackend> {
        match self.backend {
            BackendKind::Indexed => Arc::new(IndexedPng::new(self.shades, self.compression)),
            BackendKind::Rgba => Arc::new(RgbaPng::new(self.shades)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_from_str() {
        assert_eq!(
            "indexed".parse::<BackendKind>().unwrap(),
            BackendKind::Indexed
        );
        assert_eq!("RGBA".parse::<BackendKind>().unwrap(), BackendKind::Rgba);
        assert!("jpeg".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_options_build() {
        let mut options = PngOptions::default();
        assert_eq!(options.build().name(), "indexed");
        options.backend = BackendKind::Rgba;
        assert_eq!(options.build().name(), "rgba");
    }
}
