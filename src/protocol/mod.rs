//! Per-header decoders for BBP notifications.
//!
//! - [`attach`]: ATTACH (0xA0) attachment status, outside shot reassembly
//! - [`list`]: LIST (0xB0..0xB6) score table and CHECKSUM (0xB7)
//! - [`profile`]: PROFILE (0x70..0x73) reference-tick stream
//! - [`estimate`]: peak-speed extrapolation and launch-marker timing
//!
//! Decoders are pure functions over byte slices. Reassembly, latching, and
//! reset policy live in [`ProtocolState`](crate::ProtocolState).

pub mod attach;
pub mod estimate;
pub mod list;
pub mod profile;

// ---------------------------------------------------------------------------
// Byte offsets (from the header byte)
// ---------------------------------------------------------------------------

/// ATTACH: attachment code.
pub const ATTACH_CODE_OFFSET: usize = 3;
/// ATTACH: total shot counter (UINT16), present only when length > 10.
pub const TOTAL_SHOTS_OFFSET: usize = 9;
/// LIST 0xB6: number of shots in the score table.
pub const SHOT_COUNT_OFFSET: usize = 11;
/// CHECKSUM: checksum byte.
pub const CHECKSUM_OFFSET: usize = 16;
/// LIST / PROFILE: first 16-bit field.
pub const FIELDS_OFFSET: usize = 1;

// ---------------------------------------------------------------------------
// Device constants
// ---------------------------------------------------------------------------

/// Speed values per LIST page.
pub const SPEEDS_PER_PAGE: usize = 8;
/// Largest shot count the score table can hold.
pub const MAX_SHOTS: u8 = 50;
/// Reference clock ticks per millisecond.
pub const TICKS_PER_MS: f64 = 125.0;
/// `SP = SP_NUMERATOR / nRefs`.
pub const SP_NUMERATOR: u32 = 7_500_000;
