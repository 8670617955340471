//! Field codecs for the BBP notification payloads.
//!
//! All multi-byte integers are little-endian and unsigned.

use crate::error::{ProtocolError, Result};

// ---------------------------------------------------------------------------
// Read helpers
// ---------------------------------------------------------------------------

/// Read a little-endian unsigned 16-bit integer.
pub fn read_u16_le(data: &[u8], offset: usize) -> Result<u16> {
    check_len(data, offset, 2, "UINT16")?;
    Ok(u16::from_le_bytes([data[offset], data[offset + 1]]))
}

/// Iterate the 16-bit fields of `data` starting at `offset` with stride 2.
///
/// A trailing odd byte is ignored.
pub fn u16_le_fields(data: &[u8], offset: usize) -> impl Iterator<Item = u16> + '_ {
    data.get(offset..)
        .unwrap_or(&[])
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
}

/// Wrapping byte sum of `data`, as used by the CHECKSUM header.
pub fn byte_sum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

// ---------------------------------------------------------------------------
// Hex text
// ---------------------------------------------------------------------------

/// Format bytes as space-separated uppercase hex: `"B0 12 34"`.
pub fn hex_dump(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse hex text such as `"b0 12 34"`, `"B01234"` or `"b0:12:34"`.
///
/// Returns `None` on odd digit count or non-hex characters.
pub fn parse_hex(text: &str) -> Option<Vec<u8>> {
    let digits: Vec<u8> = text
        .bytes()
        .filter(|b| !b.is_ascii_whitespace() && *b != b':' && *b != b'-')
        .collect();
    if digits.len() % 2 != 0 {
        return None;
    }
    digits
        .chunks_exact(2)
        .map(|pair| {
            let hi = (pair[0] as char).to_digit(16)?;
            let lo = (pair[1] as char).to_digit(16)?;
            Some((hi * 16 + lo) as u8)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Internal
// ---------------------------------------------------------------------------

fn check_len(data: &[u8], offset: usize, need: usize, name: &'static str) -> Result<()> {
    if data.len() < offset + need {
        Err(ProtocolError::too_short(name, offset + need, data.len()))
    } else {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
