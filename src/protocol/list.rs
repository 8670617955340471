//! LIST (0xB0..0xB6) score table and CHECKSUM (0xB7).
//!
//! Each LIST page holds up to 8 UINT16 speeds at offsets `1 + 2k`. Shot `n`
//! (1-based) lives on page `0xB0 + (n-1)/8`, slot `(n-1) % 8`. Page 0xB6
//! carries the shot count at byte 11.

use crate::codec;
use crate::error::{ProtocolError, Result};
use crate::header::{Header, LIST_HEADERS};
use crate::protocol::{CHECKSUM_OFFSET, FIELDS_OFFSET, MAX_SHOTS, SHOT_COUNT_OFFSET, SPEEDS_PER_PAGE};

/// The seven LIST pages in wire order, header byte included.
pub type ListPages<'a> = [&'a [u8]; 7];

/// Checksum comparison for one reassembled shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ChecksumReport {
    /// CHECKSUM byte 16
    pub expected: u8,
    /// Sum of `bytes[1..]` over LIST B0..B6, mod 256. Gates validity.
    pub sum_b0_b6: u8,
    /// `sum_b0_b6` plus CHECKSUM `bytes[1..]`. Diagnostic only.
    pub sum_b0_b7: u8,
}

impl ChecksumReport {
    pub fn compute(lists: &ListPages<'_>, checksum: &[u8]) -> Result<Self> {
        let expected = checksum.get(CHECKSUM_OFFSET).copied().ok_or_else(|| {
            ProtocolError::too_short("CHECKSUM", CHECKSUM_OFFSET + 1, checksum.len())
        })?;
        let sum_b0_b6 = lists
            .iter()
            .fold(0u8, |acc, page| acc.wrapping_add(codec::byte_sum(payload(page))));
        let sum_b0_b7 = sum_b0_b6.wrapping_add(codec::byte_sum(payload(checksum)));
        Ok(Self {
            expected,
            sum_b0_b6,
            sum_b0_b7,
        })
    }

    pub fn is_valid(&self) -> bool {
        self.sum_b0_b6 == self.expected
    }

    pub(crate) fn into_error(self) -> ProtocolError {
        ProtocolError::ChecksumMismatch {
            expected: self.expected,
            sum_b0_b6: self.sum_b0_b6,
            sum_b0_b7: self.sum_b0_b7,
        }
    }
}

/// Read and range-check the shot count from LIST 0xB6.
pub fn shot_count(b6: &[u8]) -> Result<u8> {
    let n = b6
        .get(SHOT_COUNT_OFFSET)
        .copied()
        .ok_or_else(|| ProtocolError::too_short("LIST_B6 shot count", SHOT_COUNT_OFFSET + 1, b6.len()))?;
    if !(1..=MAX_SHOTS).contains(&n) {
        return Err(ProtocolError::InvalidShotCount { count: n });
    }
    Ok(n)
}

/// Page header and byte offset holding the speed of shot `n` (1-based).
pub fn speed_location(n: u8) -> (Header, usize) {
    let idx = usize::from(n.max(1) - 1);
    let page = LIST_HEADERS[(idx / SPEEDS_PER_PAGE).min(LIST_HEADERS.len() - 1)];
    let offset = FIELDS_OFFSET + (idx % SPEEDS_PER_PAGE) * 2;
    (page, offset)
}

/// Device-declared speed of shot `n`.
pub fn declared_speed(lists: &ListPages<'_>, n: u8) -> Result<u16> {
    let (page, offset) = speed_location(n);
    let bytes = lists[page.slot().unwrap_or(0)];
    codec::read_u16_le(bytes, offset)
}

/// Declared speeds of shots `1..=n`, stopping at the first unreadable slot.
pub fn score_table(lists: &ListPages<'_>, n: u8) -> Vec<u16> {
    (1..=n)
        .map_while(|shot| declared_speed(lists, shot).ok())
        .collect()
}

fn payload(page: &[u8]) -> &[u8] {
    page.get(1..).unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEN: usize = 20;

    fn pages() -> Vec<Vec<u8>> {
        LIST_HEADERS
            .iter()
            .map(|h| {
                let mut b = vec![0u8; LEN];
                b[0] = h.as_byte();
                b
            })
            .collect()
    }

    fn as_pages(v: &[Vec<u8>]) -> ListPages<'_> {
        std::array::from_fn(|i| v[i].as_slice())
    }

    #[test]
    fn checksum_sums_payload_bytes_only() {
        let mut v = pages();
        v[0][1] = 0x10;
        v[6][19] = 0xF5;
        let mut cks = vec![0u8; LEN];
        cks[0] = 0xB7;
        cks[16] = 0x05;
        cks[2] = 0x01;
        let r = ChecksumReport::compute(&as_pages(&v), &cks).unwrap();
        assert_eq!(r.sum_b0_b6, 0x05);
        assert!(r.is_valid());
        // 0x05 + CHECKSUM[1..] (0x01 + 0x05)
        assert_eq!(r.sum_b0_b7, 0x0B);
    }

    #[test]
    fn checksum_packet_must_reach_byte_16() {
        let v = pages();
        let cks = vec![0xB7; 16];
        assert!(matches!(
            ChecksumReport::compute(&as_pages(&v), &cks),
            Err(ProtocolError::PacketTooShort { need: 17, got: 16, .. })
        ));
    }

    #[test]
    fn mismatch_error_carries_sums() {
        let r = ChecksumReport {
            expected: 1,
            sum_b0_b6: 2,
            sum_b0_b7: 3,
        };
        assert!(!r.is_valid());
        assert_eq!(
            r.into_error(),
            ProtocolError::ChecksumMismatch {
                expected: 1,
                sum_b0_b6: 2,
                sum_b0_b7: 3
            }
        );
    }

    #[test]
    fn shot_count_range() {
        let mut b6 = vec![0u8; LEN];
        b6[11] = 1;
        assert_eq!(shot_count(&b6).unwrap(), 1);
        b6[11] = 50;
        assert_eq!(shot_count(&b6).unwrap(), 50);
        b6[11] = 0;
        assert_eq!(shot_count(&b6), Err(ProtocolError::InvalidShotCount { count: 0 }));
        b6[11] = 51;
        assert_eq!(shot_count(&b6), Err(ProtocolError::InvalidShotCount { count: 51 }));
        assert!(matches!(shot_count(&b6[..11]), Err(ProtocolError::PacketTooShort { .. })));
    }

    #[test]
    fn speed_locations() {
        assert_eq!(speed_location(1), (Header::ListB0, 1));
        assert_eq!(speed_location(8), (Header::ListB0, 15));
        assert_eq!(speed_location(9), (Header::ListB1, 1));
        assert_eq!(speed_location(50), (Header::ListB6, 3));
    }

    #[test]
    fn declared_speed_reads_little_endian() {
        let mut v = pages();
        // shot 10 → B1 offset 3
        v[1][3] = 0x10;
        v[1][4] = 0x27;
        assert_eq!(declared_speed(&as_pages(&v), 10).unwrap(), 10_000);
    }

    #[test]
    fn declared_speed_past_packet_end() {
        let mut v = pages();
        v[0].truncate(10);
        // shot 8 → B0 offset 15, beyond a 10-byte packet
        assert!(matches!(
            declared_speed(&as_pages(&v), 8),
            Err(ProtocolError::PacketTooShort { .. })
        ));
    }

    #[test]
    fn score_table_stops_at_short_page() {
        let mut v = pages();
        v[0][1] = 0xE8;
        v[0][2] = 0x03;
        v[0].truncate(5);
        let scores = score_table(&as_pages(&v), 4);
        assert_eq!(scores, vec![1000, 0]);
    }
}
