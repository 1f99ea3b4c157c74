//! Pocket Print Core Library
//!
//! Decodes the packet stream a handheld console sends to its printer
//! peripheral and turns each print job into a PNG image.

pub mod artifact;
pub mod encoder;
pub mod error;
pub mod protocol;
pub mod raster;
pub mod session;
pub mod transport;

pub use artifact::PrintedImage;
pub use encoder::{BackendKind, PngBackend, PngOptions};
pub use error::{Error, Result};
pub use protocol::{ChecksumPolicy, Command, Packet};
pub use raster::{RasterImage, Shades};
pub use session::{
    decode_capture, start_session, SessionConfig, SessionController, SessionOutcome,
    TransportHandle,
};
pub use transport::SerialTransport;

/// Printed image width in pixels.
pub const IMAGE_WIDTH: u32 = 160;
