//! A single BLE notification from the launcher characteristic.
//!
//! Notification layout:
//! ```text
//! HEADER PAYLOAD...
//! ```
//! The header selects the decoder; payload field offsets below are counted
//! from the header byte (offset 0).

use std::fmt;

use crate::codec;
use crate::error::{ProtocolError, Result};
use crate::header::Header;

/// Minimum notification length: header plus one payload byte.
pub const MIN_PACKET_LEN: usize = 2;

/// A parsed notification with owned bytes. Immutable once built.
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Packet {
    timestamp_ms: u64,
    header: Header,
    bytes: Vec<u8>,
}

impl Packet {
    /// Copy `raw` into a packet, validating only its length and header byte.
    ///
    /// Per-connection length checks live in
    /// [`ProtocolState::parse_packet`](crate::ProtocolState::parse_packet).
    pub fn parse(raw: &[u8], timestamp_ms: u64) -> Result<Self> {
        if raw.len() < MIN_PACKET_LEN {
            return Err(ProtocolError::too_short("packet", MIN_PACKET_LEN, raw.len()));
        }
        let header = Header::from_byte(raw[0])?;
        Ok(Self {
            timestamp_ms,
            header,
            bytes: raw.to_vec(),
        })
    }

    /// Arrival time supplied by the transport (ms).
    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    pub fn header(&self) -> Header {
        self.header
    }

    /// Full notification bytes, header included.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Payload bytes after the header.
    pub fn payload(&self) -> &[u8] {
        self.bytes.get(1..).unwrap_or(&[])
    }

    /// `"B0 12 34 ..."`
    pub fn hex_dump(&self) -> String {
        codec::hex_dump(&self.bytes)
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // "Packet [LIST_B0 20B @1234ms | B0 E8 03 ...]"
        write!(
            f,
            "Packet [{} {}B @{}ms | {}]",
            self.header,
            self.bytes.len(),
            self.timestamp_ms,
            self.hex_dump()
        )
    }
}
