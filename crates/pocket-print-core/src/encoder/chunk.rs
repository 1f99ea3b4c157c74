//! PNG chunk framing.

use crc::{Crc, CRC_32_ISO_HDLC};

/// PNG file signature.
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// The CRC-32 used by PNG and zlib.
const PNG_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// CRC of a chunk, computed over its type and data.
pub fn chunk_crc(kind: &[u8; 4], data: &[u8]) -> u32 {
    let mut digest = PNG_CRC.digest();
    digest.update(kind);
    digest.update(data);
    digest.finalize()
}

/// Appends one chunk: length, type, data, CRC.
pub fn write_chunk(out: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(data);
    out.extend_from_slice(&chunk_crc(kind, data).to_be_bytes());
}
