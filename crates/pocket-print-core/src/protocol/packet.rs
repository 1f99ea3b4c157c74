//! Printer packet definitions, checksum and framing.
//!
//! Packet structure (multi-byte fields little-endian):
//! - Magic: 0x88 0x33
//! - Command (1), compression flag (1), payload size (2)
//! - Payload (size bytes)
//! - Checksum (2): sum of command, compression, size bytes and payload
//! - Ack (1, ignored), status (1)

use std::str::FromStr;
use tracing::{debug, warn};

use super::source::ByteSource;
use crate::{Error, Result};

/// Magic word that starts every packet.
pub const MAGIC: u16 = 0x3388;

/// Bytes before the payload: magic, command, compression, size.
pub const HEADER_SIZE: usize = 6;

/// Bytes after the payload: checksum, ack, status.
pub const TRAILER_SIZE: usize = 4;

/// Status bit 0: set when the peer considers the transfer good.
const STATUS_ACCEPTED_BIT: u8 = 0x01;

/// Printer command types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Clears tile memory.
    Init,
    /// Snapshots tile memory as one strip of the image.
    Print,
    /// Appends tile data.
    Fill,
    /// Status poll.
    Status,
    /// Any other command byte.
    Unknown(u8),
}

impl Command {
    /// Converts a wire byte to a Command.
    pub fn from_byte(value: u8) -> Self {
        match value {
            0x01 => Command::Init,
            0x02 => Command::Print,
            0x04 => Command::Fill,
            0x0F => Command::Status,
            other => Command::Unknown(other),
        }
    }

    /// Returns the wire byte.
    pub fn as_byte(self) -> u8 {
        match self {
            Command::Init => 0x01,
            Command::Print => 0x02,
            Command::Fill => 0x04,
            Command::Status => 0x0F,
            Command::Unknown(value) => value,
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Init => write!(f, "init"),
            Command::Print => write!(f, "print"),
            Command::Fill => write!(f, "fill"),
            Command::Status => write!(f, "status"),
            Command::Unknown(value) => write!(f, "unknown({:#04X})", value),
        }
    }
}

/// What to do when a packet fails its checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumPolicy {
    /// Skip the packet when the status bit is clear; abort the session when
    /// it is set.
    #[default]
    Strict,
    /// Always skip the packet and keep decoding.
    Lenient,
}

impl FromStr for ChecksumPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(ChecksumPolicy::Strict),
            "lenient" => Ok(ChecksumPolicy::Lenient),
            _ => Err(Error::InvalidChecksumPolicy(s.to_string())),
        }
    }
}

impl std::fmt::Display for ChecksumPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChecksumPolicy::Strict => write!(f, "strict"),
            ChecksumPolicy::Lenient => write!(f, "lenient"),
        }
    }
}

/// A decoded packet. The ack byte is not kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub command: Command,
    pub compression: u8,
    pub payload: Vec<u8>,
    pub checksum: u16,
    pub status: u8,
}

impl Packet {
    /// Creates a packet with a correct checksum and a zero status.
    pub fn new(command: Command, compression: u8, payload: Vec<u8>) -> Self {
        let checksum = checksum(command.as_byte(), compression, &payload);
        Self {
            command,
            compression,
            payload,
            checksum,
            status: 0,
        }
    }

    /// Returns true if the Fill payload is RLE-compressed.
    pub fn is_compressed(&self) -> bool {
        self.compression != 0
    }

    /// Checksum computed from the packet contents.
    pub fn computed_checksum(&self) -> u16 {
        checksum(self.command.as_byte(), self.compression, &self.payload)
    }

    /// Returns true if the transmitted checksum matches the contents.
    pub fn is_valid(&self) -> bool {
        self.checksum == self.computed_checksum()
    }

    /// Serializes the packet to its wire form.
    pub fn to_bytes(&self) -> Vec<u8> {
        build_packet(
            self.command.as_byte(),
            self.compression,
            &self.payload,
            self.checksum,
            self.status,
        )
    }
}

/// Computes the 16-bit packet checksum.
///
/// Payloads longer than `u16::MAX` cannot be framed; only the low 16 bits of
/// the length take part.
pub fn checksum(command: u8, compression: u8, payload: &[u8]) -> u16 {
    let size = payload.len() as u16;
    let seed = command as u16 + compression as u16 + (size & 0xFF) + (size >> 8);
    payload
        .iter()
        .fold(seed, |acc, &byte| acc.wrapping_add(byte as u16))
}

/// Builds a wire packet with an explicit checksum and status byte.
pub fn build_packet(
    command: u8,
    compression: u8,
    payload: &[u8],
    checksum: u16,
    status: u8,
) -> Vec<u8> {
    let size = payload.len() as u16;
    let mut buffer = Vec::with_capacity(HEADER_SIZE + payload.len() + TRAILER_SIZE);
    buffer.extend_from_slice(&MAGIC.to_le_bytes());
    buffer.push(command);
    buffer.push(compression);
    buffer.extend_from_slice(&size.to_le_bytes());
    buffer.extend_from_slice(payload);
    buffer.extend_from_slice(&checksum.to_le_bytes());
    // Ack byte (the printer answers 0x81 here)
    buffer.push(0x81);
    buffer.push(status);
    buffer
}

/// Reads packets off a [`ByteSource`] and validates their checksums.
#[derive(Debug, Default)]
pub struct PacketFramer {
    policy: ChecksumPolicy,
    resync: bool,
    accepted: usize,
    skipped: usize,
}

impl PacketFramer {
    /// Creates a framer with the given checksum policy.
    pub fn new(policy: ChecksumPolicy) -> Self {
        Self {
            policy,
            resync: false,
            accepted: 0,
            skipped: 0,
        }
    }

    /// Creates a framer that discards leading bytes up to the first magic
    /// word. Used for a stream that picks up after a failed session.
    pub fn resyncing(policy: ChecksumPolicy) -> Self {
        Self {
            resync: true,
            ..Self::new(policy)
        }
    }

    /// Returns the next valid packet, or `None` if the session ends at a
    /// packet boundary.
    ///
    /// Packets with a bad checksum are skipped, unless the policy is strict
    /// and the peer's status byte claims the transfer succeeded, in which
    /// case [`Error::ChecksumMismatch`] is returned.
    pub async fn next_packet(&mut self, source: &mut ByteSource) -> Result<Option<Packet>> {
        if self.resync {
            match source.skip_until(&MAGIC.to_le_bytes()).await {
                Some(0) => {}
                Some(n) => debug!("Skipped {} bytes before the next packet", n),
                None => return Ok(None),
            }
            self.resync = false;
        }

        loop {
            if !source.has_more().await {
                return Ok(None);
            }

            let magic = source.read_u16_le().await?;
            if magic != MAGIC {
                return Err(Error::ProtocolDesync { magic });
            }
            let command = Command::from_byte(source.read_u8().await?);
            let compression = source.read_u8().await?;
            let size = source.read_u16_le().await? as usize;
            let payload = source.read_exact(size).await?;
            let transmitted = source.read_u16_le().await?;
            let _ack = source.read_u8().await?;
            let status = source.read_u8().await?;

            let packet = Packet {
                command,
                compression,
                payload,
                checksum: transmitted,
                status,
            };

            let computed = packet.computed_checksum();
            if computed != transmitted {
                if self.policy == ChecksumPolicy::Strict && status & STATUS_ACCEPTED_BIT != 0 {
                    return Err(Error::ChecksumMismatch {
                        transmitted,
                        computed,
                    });
                }
                self.skipped += 1;
                warn!(
                    "Skipping {} packet: checksum {:#06X} != {:#06X} (status {:#04X})",
                    command, transmitted, computed, status
                );
                continue;
            }

            self.accepted += 1;
            debug!(
                "Packet: {} compression={} size={}",
                command,
                compression,
                packet.payload.len()
            );
            return Ok(Some(packet));
        }
    }

    /// Number of packets returned so far.
    pub fn accepted(&self) -> usize {
        self.accepted
    }

    /// Number of packets dropped for a bad checksum.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}
