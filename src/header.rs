use std::fmt;

use crate::error::{ProtocolError, Result};

/// Number of headers that take part in shot reassembly (everything but ATTACH).
pub const SLOT_COUNT: usize = 12;

/// Header byte (payload byte 0) of a BBP notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(u8)]
pub enum Header {
    /// Device / attachment status
    Attach = 0xA0,
    /// Per-shot score table, speeds 1..=8
    ListB0 = 0xB0,
    ListB1 = 0xB1,
    ListB2 = 0xB2,
    ListB3 = 0xB3,
    ListB4 = 0xB4,
    ListB5 = 0xB5,
    /// Last score table page; byte 11 carries the shot count
    ListB6 = 0xB6,
    /// Checksum over the score table, byte 16
    Checksum = 0xB7,
    /// Raw rotation-interval stream, four pages
    Profile70 = 0x70,
    Profile71 = 0x71,
    Profile72 = 0x72,
    /// Last profile page; also a reassembly trigger
    Profile73 = 0x73,
}

/// Score table headers in wire order.
pub const LIST_HEADERS: [Header; 7] = [
    Header::ListB0,
    Header::ListB1,
    Header::ListB2,
    Header::ListB3,
    Header::ListB4,
    Header::ListB5,
    Header::ListB6,
];

/// Profile headers in concatenation order.
pub const PROFILE_HEADERS: [Header; 4] = [
    Header::Profile70,
    Header::Profile71,
    Header::Profile72,
    Header::Profile73,
];

impl Header {
    pub fn from_byte(b: u8) -> Result<Self> {
        match b {
            0xA0 => Ok(Self::Attach),
            0xB0 => Ok(Self::ListB0),
            0xB1 => Ok(Self::ListB1),
            0xB2 => Ok(Self::ListB2),
            0xB3 => Ok(Self::ListB3),
            0xB4 => Ok(Self::ListB4),
            0xB5 => Ok(Self::ListB5),
            0xB6 => Ok(Self::ListB6),
            0xB7 => Ok(Self::Checksum),
            0x70 => Ok(Self::Profile70),
            0x71 => Ok(Self::Profile71),
            0x72 => Ok(Self::Profile72),
            0x73 => Ok(Self::Profile73),
            _ => Err(ProtocolError::UnsupportedHeader { header: b }),
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Reassembly table slot, or `None` for ATTACH.
    ///
    /// LIST B0..B6 → 0..=6, CHECKSUM → 7, PROFILE 70..73 → 8..=11.
    pub fn slot(self) -> Option<usize> {
        match self {
            Self::Checksum => Some(7),
            h if h.is_list() => Some((h.as_byte() - 0xB0) as usize),
            h if h.is_profile() => Some(8 + (h.as_byte() - 0x70) as usize),
            _ => None,
        }
    }

    /// Inverse of [`slot`](Self::slot).
    pub fn from_slot(slot: usize) -> Option<Self> {
        match slot {
            0..=6 => Some(LIST_HEADERS[slot]),
            7 => Some(Self::Checksum),
            8..=11 => Some(PROFILE_HEADERS[slot - 8]),
            _ => None,
        }
    }

    pub fn is_list(self) -> bool {
        (0xB0..=0xB6).contains(&self.as_byte())
    }

    pub fn is_profile(self) -> bool {
        (0x70..=0x73).contains(&self.as_byte())
    }

    /// CHECKSUM and the last PROFILE page complete a shot.
    pub fn is_trigger(self) -> bool {
        matches!(self, Self::Checksum | Self::Profile73)
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attach => write!(f, "ATTACH"),
            Self::Checksum => write!(f, "CHECKSUM"),
            h if h.is_list() => write!(f, "LIST_{:02X}", h.as_byte()),
            h => write!(f, "PROFILE_{:02X}", h.as_byte()),
        }
    }
}

// ---------------------------------------------------------------------------
// HeaderSet
// ---------------------------------------------------------------------------

/// Bitmask over the reassembly slots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeaderSet(u16);

impl HeaderSet {
    const FULL: u16 = (1 << SLOT_COUNT) - 1;

    pub fn new() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, header: Header) {
        if let Some(slot) = header.slot() {
            self.0 |= 1 << slot;
        }
    }

    pub fn contains(&self, header: Header) -> bool {
        header.slot().is_some_and(|slot| self.0 & (1 << slot) != 0)
    }

    pub fn is_complete(&self) -> bool {
        self.0 == Self::FULL
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    /// Headers present, in slot order.
    pub fn present(&self) -> Vec<Header> {
        (0..SLOT_COUNT)
            .filter(|s| self.0 & (1 << s) != 0)
            .filter_map(Header::from_slot)
            .collect()
    }

    /// Headers not yet seen, in slot order.
    pub fn missing(&self) -> Vec<Header> {
        (0..SLOT_COUNT)
            .filter(|s| self.0 & (1 << s) == 0)
            .filter_map(Header::from_slot)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        for b in (0x70..=0x73).chain(0xB0..=0xB7).chain([0xA0]) {
            assert_eq!(Header::from_byte(b).unwrap().as_byte(), b);
        }
    }

    #[test]
    fn unsupported() {
        for b in [0x00, 0x6F, 0x74, 0xA1, 0xAF, 0xB8, 0xFF] {
            assert_eq!(
                Header::from_byte(b),
                Err(ProtocolError::UnsupportedHeader { header: b })
            );
        }
    }

    #[test]
    fn slots_are_dense_and_invertible() {
        for slot in 0..SLOT_COUNT {
            let h = Header::from_slot(slot).unwrap();
            assert_eq!(h.slot(), Some(slot));
        }
        assert_eq!(Header::Attach.slot(), None);
        assert_eq!(Header::from_slot(SLOT_COUNT), None);
    }

    #[test]
    fn triggers() {
        assert!(Header::Checksum.is_trigger());
        assert!(Header::Profile73.is_trigger());
        assert!(!Header::Profile72.is_trigger());
        assert!(!Header::ListB6.is_trigger());
    }

    #[test]
    fn header_set_completeness() {
        let mut set = HeaderSet::new();
        assert!(set.is_empty());
        for h in LIST_HEADERS {
            set.insert(h);
        }
        set.insert(Header::Attach);
        assert!(!set.is_complete());
        assert_eq!(set.missing().len(), 5);
        set.insert(Header::Checksum);
        for h in PROFILE_HEADERS {
            set.insert(h);
        }
        assert!(set.is_complete());
        assert!(set.missing().is_empty());
        assert_eq!(set.present().len(), SLOT_COUNT);
        set.clear();
        assert!(!set.contains(Header::ListB0));
    }

    #[test]
    fn display() {
        assert_eq!(Header::ListB3.to_string(), "LIST_B3");
        assert_eq!(Header::Profile70.to_string(), "PROFILE_70");
        assert_eq!(Header::Checksum.to_string(), "CHECKSUM");
    }
}
