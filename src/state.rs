//! Shot reassembly state machine.
//!
//! One [`ProtocolState`] per BLE connection. Notifications are fed in
//! arrival order; each reassembly header overwrites the previous bytes for
//! that header. A shot is emitted once both trigger headers (CHECKSUM and
//! PROFILE_73) have arrived and every other reassembly header is present.
//!
//! Any error clears the buffered headers so the next complete set starts
//! clean. The latched packet length and ATTACH state survive errors and are
//! only dropped by [`ProtocolState::disconnect`].

use log::{debug, info, warn};

use crate::analysis::peak::FirstPeakConfig;
use crate::error::{ProtocolError, Result};
use crate::header::{Header, HeaderSet, LIST_HEADERS, PROFILE_HEADERS, SLOT_COUNT};
use crate::packet::{MIN_PACKET_LEN, Packet};
use crate::protocol::attach::AttachStatus;
use crate::protocol::estimate::{
    EstReason, EstimateConfig, LaunchMarkerConfig, MarkerSource, MarkerTiming, estimate_peak,
    launch_marker,
};
use crate::protocol::list::{self, ChecksumReport, ListPages};
use crate::protocol::profile::{ProfilePages, ShotProfile};

/// Parser-side tuning.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct ParserConfig {
    pub estimate: EstimateConfig,
    pub launch_marker: LaunchMarkerConfig,
    /// First-peak search used to sanity-check the launch marker.
    pub first_peak: FirstPeakConfig,
}

/// A validated shot, handed to consumers.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ShotSnapshot {
    /// Device-declared speed of the latest shot
    pub your_sp: u16,
    /// Extrapolated peak estimate (or `your_sp` on fallback)
    pub est_sp: f64,
    /// Raw maximum profile sample
    pub max_sp: f64,
    pub shot_count: u8,
    pub profile: ShotProfile,
    pub launch_marker_ms: f64,
    pub launch_marker_source: MarkerSource,
    pub est_reason: EstReason,
    pub est_peak_index: Option<usize>,
    /// Trigger packet timestamp
    pub received_at_ms: u64,
    /// Declared speeds of shots `1..=shot_count`
    pub scores: Vec<u16>,
    pub checksum: ChecksumReport,
}

/// Diagnostic view of the parser for observability tooling.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ParserStatus {
    pub expected_length: Option<usize>,
    pub last_length: Option<usize>,
    pub last_trigger_header: Option<Header>,
    pub last_checksum: Option<ChecksumReport>,
    pub bey_attached: bool,
    pub total_shots: Option<u16>,
    /// Reassembly headers buffered since the last reset
    pub present: Vec<Header>,
}

#[derive(Debug, Clone)]
struct Slot {
    bytes: Vec<u8>,
    received_ms: u64,
}

/// Per-connection reassembly state.
///
/// # Example
///
/// ```
/// use beyscope::ProtocolState;
///
/// let mut state = ProtocolState::new();
/// // ATTACH: a top was mounted
/// let attach = [0xA0, 0, 0, 0x04, 0, 0, 0, 0, 0, 7, 0, 0];
/// assert!(state.feed(&attach, 1000)?.is_none());
/// assert!(state.status().bey_attached);
/// assert_eq!(state.status().total_shots, Some(7));
/// # Ok::<(), beyscope::ProtocolError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ProtocolState {
    cfg: ParserConfig,
    slots: [Option<Slot>; SLOT_COUNT],
    present: HeaderSet,
    expected_length: Option<usize>,
    last_length: Option<usize>,
    last_trigger: Option<Header>,
    last_checksum: Option<ChecksumReport>,
    bey_attached: bool,
    total_shots: Option<u16>,
    release_ms: Option<u64>,
}

impl Default for ProtocolState {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolState {
    pub fn new() -> Self {
        Self::with_config(ParserConfig::default())
    }

    pub fn with_config(cfg: ParserConfig) -> Self {
        Self {
            cfg,
            slots: std::array::from_fn(|_| None),
            present: HeaderSet::new(),
            expected_length: None,
            last_length: None,
            last_trigger: None,
            last_checksum: None,
            bey_attached: false,
            total_shots: None,
            release_ms: None,
        }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.cfg
    }

    /// Validate a raw notification and copy it into a [`Packet`].
    ///
    /// The first packet that passes the minimum-length check latches the
    /// connection's packet length; later packets must match it exactly.
    pub fn parse_packet(&mut self, raw: &[u8], timestamp_ms: u64) -> Result<Packet> {
        self.last_length = Some(raw.len());
        match self.parse_inner(raw, timestamp_ms) {
            Ok(packet) => {
                debug!("{packet:?}");
                Ok(packet)
            }
            Err(e) => {
                self.discard(&e);
                Err(e)
            }
        }
    }

    fn parse_inner(&mut self, raw: &[u8], timestamp_ms: u64) -> Result<Packet> {
        if raw.len() < MIN_PACKET_LEN {
            return Err(ProtocolError::too_short("packet", MIN_PACKET_LEN, raw.len()));
        }
        match self.expected_length {
            None => self.expected_length = Some(raw.len()),
            Some(expected) if expected != raw.len() => {
                return Err(ProtocolError::InvalidPacketLength {
                    expected,
                    got: raw.len(),
                });
            }
            Some(_) => {}
        }
        Packet::parse(raw, timestamp_ms)
    }

    /// Apply a parsed packet. Returns a snapshot when it completes a shot.
    ///
    /// A shot whose profile reconstructs to zero samples is dropped with a
    /// warning and yields `Ok(None)`.
    pub fn update(&mut self, packet: &Packet) -> Result<Option<ShotSnapshot>> {
        let header = packet.header();
        let Some(slot) = header.slot() else {
            self.apply_attach(packet);
            return Ok(None);
        };

        self.slots[slot] = Some(Slot {
            bytes: packet.bytes().to_vec(),
            received_ms: packet.timestamp_ms(),
        });
        self.present.insert(header);
        if !header.is_trigger() {
            return Ok(None);
        }

        self.last_trigger = Some(header);
        let other = if header == Header::Checksum {
            Header::Profile73
        } else {
            Header::Checksum
        };
        if !self.present.contains(other) {
            debug!("trigger {header}: waiting for {other}");
            return Ok(None);
        }

        debug!("trigger {header}: assembling shot");
        let result = self.assemble(header, packet.timestamp_ms());
        match &result {
            Err(e) => self.discard(e),
            Ok(_) => self.reset(),
        }
        result
    }

    /// [`parse_packet`](Self::parse_packet) then [`update`](Self::update).
    pub fn feed(&mut self, raw: &[u8], timestamp_ms: u64) -> Result<Option<ShotSnapshot>> {
        let packet = self.parse_packet(raw, timestamp_ms)?;
        self.update(&packet)
    }

    pub fn status(&self) -> ParserStatus {
        ParserStatus {
            expected_length: self.expected_length,
            last_length: self.last_length,
            last_trigger_header: self.last_trigger,
            last_checksum: self.last_checksum,
            bey_attached: self.bey_attached,
            total_shots: self.total_shots,
            present: self.present.present(),
        }
    }

    /// Clear all buffered reassembly headers.
    pub fn reset(&mut self) {
        self.slots = std::array::from_fn(|_| None);
        self.present.clear();
    }

    /// Forget everything tied to the current connection, including the
    /// latched packet length. Configuration is kept.
    pub fn disconnect(&mut self) {
        debug!("disconnect: dropping parser state");
        *self = Self::with_config(self.cfg);
    }

    fn discard(&mut self, err: &ProtocolError) {
        warn!(
            "{err}; discarding {} buffered headers",
            self.present.present().len()
        );
        self.reset();
    }

    fn apply_attach(&mut self, packet: &Packet) {
        let status = AttachStatus::decode(packet.bytes());
        if let Some(attached) = status.attached() {
            self.bey_attached = attached;
        }
        if status.is_release() {
            self.release_ms = Some(packet.timestamp_ms());
        }
        if status.total_shots.is_some() {
            self.total_shots = status.total_shots;
        }
        debug!(
            "ATTACH code {:?} attached={} total_shots={:?}",
            status.code, self.bey_attached, self.total_shots
        );
    }

    fn assemble(&mut self, trigger: Header, shot_ms: u64) -> Result<Option<ShotSnapshot>> {
        if !self.present.is_complete() {
            return Err(ProtocolError::MissingHeaders {
                trigger: trigger.as_byte(),
                missing: self.present.missing(),
            });
        }

        let slots = &self.slots;
        let lists: ListPages<'_> = std::array::from_fn(|i| slot_bytes(slots, LIST_HEADERS[i]));
        let report = ChecksumReport::compute(&lists, slot_bytes(slots, Header::Checksum))?;
        self.last_checksum = Some(report);
        if !report.is_valid() {
            return Err(report.into_error());
        }

        let shot_count = list::shot_count(lists[6])?;
        let your_sp = list::declared_speed(&lists, shot_count)?;
        let pages: ProfilePages<'_> = std::array::from_fn(|i| slot_bytes(slots, PROFILE_HEADERS[i]));
        let profile = ShotProfile::reconstruct(&pages);
        if profile.is_empty() {
            warn!("shot {shot_count}: profile has no samples, dropping");
            return Ok(None);
        }

        let estimate = estimate_peak(&profile, your_sp, &self.cfg.estimate);
        let timing = MarkerTiming {
            release_ms: self.release_ms,
            shot_ms,
            first_profile_ms: slot_time(slots, Header::Profile70),
            last_profile_ms: slot_time(slots, Header::Profile73),
        };
        let (launch_marker_ms, launch_marker_source) =
            launch_marker(&profile, &timing, &self.cfg.launch_marker, &self.cfg.first_peak);

        info!(
            "shot {shot_count}: your_sp={your_sp} est_sp={:.0} ({}) samples={} marker={launch_marker_ms:.1}ms",
            estimate.est_sp,
            estimate.reason,
            profile.len()
        );

        Ok(Some(ShotSnapshot {
            your_sp,
            est_sp: estimate.est_sp,
            max_sp: profile.max_sp(),
            shot_count,
            launch_marker_ms,
            launch_marker_source,
            est_reason: estimate.reason,
            est_peak_index: estimate.peak_index,
            received_at_ms: shot_ms,
            scores: list::score_table(&lists, shot_count),
            checksum: report,
            profile,
        }))
    }
}

fn slot_bytes(slots: &[Option<Slot>; SLOT_COUNT], header: Header) -> &[u8] {
    header
        .slot()
        .and_then(|i| slots[i].as_ref())
        .map_or(&[][..], |s| s.bytes.as_slice())
}

fn slot_time(slots: &[Option<Slot>; SLOT_COUNT], header: Header) -> u64 {
    header
        .slot()
        .and_then(|i| slots[i].as_ref())
        .map_or(0, |s| s.received_ms)
}
