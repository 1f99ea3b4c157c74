//! Error types for the printer decoding library.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while receiving, decoding or encoding a print.
#[derive(Error, Debug)]
pub enum Error {
    /// Packet did not start with the 0x3388 magic word.
    #[error("Protocol desync: bad magic {magic:#06X} (unreliable connection?)")]
    ProtocolDesync { magic: u16 },

    /// Checksum mismatch that the peer reported as a successful transfer.
    #[error("Checksum mismatch: transmitted {transmitted:#06X}, computed {computed:#06X}")]
    ChecksumMismatch { transmitted: u16, computed: u16 },

    /// Session ended while a packet was still being read.
    #[error("Stream truncated: needed {needed} bytes, {available} available")]
    TruncatedStream { needed: usize, available: usize },

    /// RLE run or span extends past the end of the payload.
    #[error("Malformed RLE payload at offset {offset}")]
    MalformedRle { offset: usize },

    /// Pixel buffer does not match the image dimensions.
    #[error("Pixel count mismatch: expected {expected}, got {actual}")]
    PixelCount { expected: usize, actual: usize },

    /// Image dimensions are zero or too large.
    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// Pixel value outside the 4-entry palette.
    #[error("Palette index out of range: {0}")]
    PaletteIndex(u8),

    /// PNG encoding error from the `png` crate backend.
    #[error("PNG error: {0}")]
    Png(String),

    /// Serial port communication error.
    #[error("Serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// Serial or file I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial device does not exist.
    #[error("Serial port not found at {0}")]
    PortNotFound(String),

    /// Invalid hex color string.
    #[error("Invalid color: {0}")]
    InvalidColor(String),

    /// Unknown checksum policy name.
    #[error("Invalid checksum policy: {0}")]
    InvalidChecksumPolicy(String),

    /// Unknown PNG backend name.
    #[error("Invalid PNG backend: {0}")]
    InvalidBackend(String),

    /// Decode task panicked or was cancelled.
    #[error("Decode task failed: {0}")]
    DecodeTask(String),
}

impl Error {
    /// Returns true if this error invalidates everything the session has
    /// accumulated so far.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ProtocolDesync { .. } | Error::ChecksumMismatch { .. } | Error::DecodeTask(_)
        )
    }
}

impl From<png::EncodingError> for Error {
    fn from(e: png::EncodingError) -> Self {
        Error::Png(e.to_string())
    }
}
