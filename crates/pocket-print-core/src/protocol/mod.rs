//! Printer link protocol.
//!
//! Provides packet framing, checksum validation and tile data decompression
//! for the byte stream sent by the console.

pub mod packet;
pub mod rle;
pub mod source;

pub use packet::{build_packet, checksum, ChecksumPolicy, Command, Packet, PacketFramer, MAGIC};
pub use source::{channel, ByteSink, ByteSource};
