//! ATTACH (0xA0): device / attachment status.

use crate::codec;
use crate::protocol::{ATTACH_CODE_OFFSET, TOTAL_SHOTS_OFFSET};

/// Attachment code: nothing on the launcher. Also marks a release event.
pub const CODE_DETACHED: u8 = 0x00;
/// Attachment codes meaning a top is mounted.
pub const CODES_ATTACHED: [u8; 2] = [0x04, 0x14];

/// Decoded ATTACH notification. Never fails; absent fields are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AttachStatus {
    /// Raw attachment code (byte 3)
    pub code: Option<u8>,
    /// Lifetime shot counter (bytes 9..11)
    pub total_shots: Option<u16>,
}

impl AttachStatus {
    pub fn decode(bytes: &[u8]) -> Self {
        Self {
            code: bytes.get(ATTACH_CODE_OFFSET).copied(),
            total_shots: codec::read_u16_le(bytes, TOTAL_SHOTS_OFFSET).ok(),
        }
    }

    /// `Some(true)` for attached codes, `Some(false)` for detached, `None` otherwise.
    pub fn attached(&self) -> Option<bool> {
        match self.code {
            Some(c) if CODES_ATTACHED.contains(&c) => Some(true),
            Some(CODE_DETACHED) => Some(false),
            _ => None,
        }
    }

    /// A detached code doubles as the release event used for launch timing.
    pub fn is_release(&self) -> bool {
        self.code == Some(CODE_DETACHED)
    }
}
