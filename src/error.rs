use std::fmt;

use thiserror::Error;

use crate::header::Header;

/// Errors arising from packet parsing and shot reassembly.
///
/// Every variant is non-fatal: [`ProtocolState`](crate::ProtocolState) clears
/// its accumulated headers and stays usable for the next shot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("unsupported header 0x{header:02X}")]
    UnsupportedHeader { header: u8 },

    #[error("invalid packet length (expected {expected} bytes, got {got})")]
    InvalidPacketLength { expected: usize, got: usize },

    #[error("missing headers before trigger 0x{trigger:02X}: {}", format_headers(missing))]
    MissingHeaders { trigger: u8, missing: Vec<Header> },

    #[error(
        "checksum mismatch (expected 0x{expected:02X}, sum B0..B6 0x{sum_b0_b6:02X}, sum B0..B7 0x{sum_b0_b7:02X})"
    )]
    ChecksumMismatch { expected: u8, sum_b0_b6: u8, sum_b0_b7: u8 },

    #[error("invalid shot count {count} (expected 1..=50)")]
    InvalidShotCount { count: u8 },

    #[error("packet too short for {what}: need {need} bytes, got {got}")]
    PacketTooShort {
        what: &'static str,
        need: usize,
        got: usize,
    },
}

/// Category of a [`ProtocolError`], without diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ErrorKind {
    UnsupportedHeader,
    InvalidPacketLength,
    MissingHeaders,
    ChecksumMismatch,
    InvalidShotCount,
    PacketTooShort,
}

impl ProtocolError {
    pub(crate) fn too_short(what: &'static str, need: usize, got: usize) -> Self {
        Self::PacketTooShort { what, need, got }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedHeader { .. } => ErrorKind::UnsupportedHeader,
            Self::InvalidPacketLength { .. } => ErrorKind::InvalidPacketLength,
            Self::MissingHeaders { .. } => ErrorKind::MissingHeaders,
            Self::ChecksumMismatch { .. } => ErrorKind::ChecksumMismatch,
            Self::InvalidShotCount { .. } => ErrorKind::InvalidShotCount,
            Self::PacketTooShort { .. } => ErrorKind::PacketTooShort,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::UnsupportedHeader => "unsupported_header",
            Self::InvalidPacketLength => "invalid_packet_length",
            Self::MissingHeaders => "missing_headers",
            Self::ChecksumMismatch => "checksum_mismatch",
            Self::InvalidShotCount => "invalid_shot_count",
            Self::PacketTooShort => "packet_too_short",
        };
        f.write_str(s)
    }
}

/// Format headers as "B3, 71" (empty list renders as "none").
fn format_headers(headers: &[Header]) -> String {
    if headers.is_empty() {
        return "none".into();
    }
    headers
        .iter()
        .map(|h| format!("{:02X}", h.as_byte()))
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
