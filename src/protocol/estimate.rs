//! Peak-speed extrapolation and launch-marker timing.
//!
//! The rotation sensor lags the true speed near the peak, so the raw maximum
//! under-reads. The estimator walks the early profile for the first genuine
//! falling edge and picks the sample that best represents the peak, then
//! cross-checks it against the device-declared speed.
//!
//! The fallback cascade is order-sensitive: changing it changes output on
//! real captures.

use std::fmt;

use crate::analysis::peak::{FirstPeakConfig, first_peak_index};
use crate::protocol::profile::ShotProfile;

/// Tuning for [`estimate_peak`]. Defaults are empirical.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct EstimateConfig {
    /// Profiles shorter than this use the declared speed.
    pub min_points: usize,
    /// Only the first `window` samples are scanned.
    pub window: usize,
    /// First scanned index (at least 4, the extrapolation needs `i-4`).
    pub start_index: usize,
    /// Headroom applied to the extrapolated value.
    pub margin: f64,
}

impl Default for EstimateConfig {
    fn default() -> Self {
        Self {
            min_points: 7,
            window: 14,
            start_index: 4,
            margin: 1.04,
        }
    }
}

/// How `est_sp` was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(rename_all = "snake_case"))]
pub enum EstReason {
    /// Peak chosen at the first confirmed falling edge.
    FallingEdge,
    /// No falling edge inside the window; running local maximum used.
    NoFallingEdgeLocalMax,
    /// Chosen peak was the last profile sample; running local maximum used.
    LastSampleLocalMax,
    /// Chosen peak index was below the start index; declared speed used.
    EarlyPeakFallback,
    /// Estimate exceeded the declared speed; declared speed used.
    ExceedsDeclaredFallback,
    /// Too few samples to estimate; declared speed used.
    ProfileShortFallback,
}

impl EstReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FallingEdge => "falling_edge",
            Self::NoFallingEdgeLocalMax => "no_falling_edge_local_max",
            Self::LastSampleLocalMax => "last_sample_local_max",
            Self::EarlyPeakFallback => "early_peak_fallback",
            Self::ExceedsDeclaredFallback => "exceeds_declared_fallback",
            Self::ProfileShortFallback => "profile_short_fallback",
        }
    }

    /// True when `est_sp` is the declared speed rather than a profile sample.
    pub fn is_declared(self) -> bool {
        matches!(
            self,
            Self::EarlyPeakFallback | Self::ExceedsDeclaredFallback | Self::ProfileShortFallback
        )
    }
}

impl fmt::Display for EstReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of [`estimate_peak`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PeakEstimate {
    pub est_sp: f64,
    pub reason: EstReason,
    /// Profile index of the chosen peak (set even when a later check fell
    /// back to the declared speed).
    pub peak_index: Option<usize>,
}

/// Estimate the true peak speed of a shot.
pub fn estimate_peak(profile: &ShotProfile, declared: u16, cfg: &EstimateConfig) -> PeakEstimate {
    let declared_sp = f64::from(declared);
    let fallback = |reason, peak_index| PeakEstimate {
        est_sp: declared_sp,
        reason,
        peak_index,
    };

    let sp = profile.sp();
    let t = profile.t_ms();
    let n = sp.len();
    if n < cfg.min_points.max(1) {
        return fallback(EstReason::ProfileShortFallback, None);
    }

    let window = n.min(cfg.window);
    let start = cfg.start_index.max(4);

    // Running maximum seeded with the samples before the scan starts.
    let mut local_max = 0;
    for i in 1..start.min(window) {
        if sp[i] > sp[local_max] {
            local_max = i;
        }
    }

    let mut edge_peak = None;
    for i in start..window {
        if sp[i] > sp[local_max] {
            local_max = i;
        }
        if sp[i] >= sp[i - 1] || !falling_edge_confirmed(sp, i, window) {
            continue;
        }
        let dt = t[i - 2] - t[i - 4];
        let slope = if dt > 0.0 { (sp[i - 2] - sp[i - 4]) / dt } else { 0.0 };
        let projected = (sp[i - 2] + slope * (t[i - 1] - t[i - 2])) * cfg.margin;
        edge_peak = Some(if projected < sp[i - 1] { i - 2 } else { i - 1 });
        break;
    }

    let (mut peak, mut reason) = match edge_peak {
        Some(p) => (p, EstReason::FallingEdge),
        None => (local_max, EstReason::NoFallingEdgeLocalMax),
    };
    if peak == n - 1 {
        peak = local_max;
        reason = EstReason::LastSampleLocalMax;
    }
    if peak < start {
        return fallback(EstReason::EarlyPeakFallback, Some(peak));
    }
    let est_sp = sp[peak];
    if est_sp > declared_sp {
        return fallback(EstReason::ExceedsDeclaredFallback, Some(peak));
    }
    PeakEstimate {
        est_sp,
        reason,
        peak_index: Some(peak),
    }
}

/// A drop at `i` counts when the next two samples keep falling, or only the
/// next one when `i` is second-to-last in the window. A drop on the last
/// window sample cannot be confirmed.
fn falling_edge_confirmed(sp: &[f64], i: usize, window: usize) -> bool {
    if i + 2 < window {
        sp[i + 1] < sp[i] && sp[i + 2] < sp[i + 1]
    } else if i + 1 < window {
        sp[i + 1] < sp[i]
    } else {
        false
    }
}

// ---------------------------------------------------------------------------
// Launch marker
// ---------------------------------------------------------------------------

/// Tuning for [`launch_marker`]. Defaults are empirical.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct LaunchMarkerConfig {
    /// Release events older than this before the shot are ignored (ms).
    pub release_window_ms: u64,
    /// Markers beyond this elapsed time are rejected (ms).
    pub max_marker_ms: f64,
    /// Markers further than this from the first peak are rejected (ms).
    pub max_peak_distance_ms: f64,
}

impl Default for LaunchMarkerConfig {
    fn default() -> Self {
        Self {
            release_window_ms: 2000,
            max_marker_ms: 400.0,
            max_peak_distance_ms: 180.0,
        }
    }
}

/// Where the launch marker came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(rename_all = "snake_case"))]
pub enum MarkerSource {
    /// Release event mapped onto the profile axis.
    ReleaseEvent,
    /// First-peak time of the profile.
    FirstPeak,
}

/// Receive-time inputs for [`launch_marker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerTiming {
    /// Release event (ATTACH code 0x00) timestamp, if any.
    pub release_ms: Option<u64>,
    /// Shot (trigger) timestamp.
    pub shot_ms: u64,
    /// Arrival of the first PROFILE page.
    pub first_profile_ms: u64,
    /// Arrival of the last PROFILE page.
    pub last_profile_ms: u64,
}

/// Estimate the launch time within the profile (ms from profile start).
///
/// The release timestamp is mapped linearly between the first and last
/// PROFILE page arrivals onto the profile's elapsed-time axis. The result
/// must agree with the visible waveform; otherwise the first-peak time is
/// used.
pub fn launch_marker(
    profile: &ShotProfile,
    timing: &MarkerTiming,
    cfg: &LaunchMarkerConfig,
    peak_cfg: &FirstPeakConfig,
) -> (f64, MarkerSource) {
    let first_peak_ms = first_peak_index(profile.t_ms(), profile.sp(), peak_cfg)
        .map_or(0.0, |i| profile.t_ms()[i]);

    let mapped = timing
        .release_ms
        .filter(|&r| r <= timing.shot_ms && timing.shot_ms - r <= cfg.release_window_ms)
        .and_then(|r| map_release(profile.duration_ms(), r, timing));

    match mapped {
        Some(m)
            if (0.0..=cfg.max_marker_ms).contains(&m)
                && (m - first_peak_ms).abs() <= cfg.max_peak_distance_ms =>
        {
            (m, MarkerSource::ReleaseEvent)
        }
        _ => (first_peak_ms, MarkerSource::FirstPeak),
    }
}

fn map_release(last_t_ms: f64, release_ms: u64, timing: &MarkerTiming) -> Option<f64> {
    let span = timing.last_profile_ms as f64 - timing.first_profile_ms as f64;
    let ratio = (release_ms as f64 - timing.first_profile_ms as f64) / span;
    let marker = ratio * last_t_ms;
    marker.is_finite().then(|| marker.clamp(0.0, last_t_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Profile with 10ms spacing from raw speeds.
    fn profile(sp: &[f64]) -> ShotProfile {
        let t: Vec<f64> = (1..=sp.len()).map(|i| i as f64 * 10.0).collect();
        ShotProfile::from_samples(&t, sp)
    }

    #[test]
    fn short_profile_uses_declared() {
        let p = profile(&[1000.0, 2000.0, 3000.0, 4000.0, 5000.0, 6000.0]);
        let e = estimate_peak(&p, 5500, &EstimateConfig::default());
        assert_eq!(e.est_sp, 5500.0);
        assert_eq!(e.reason, EstReason::ProfileShortFallback);
        assert_eq!(e.reason.as_str(), "profile_short_fallback");
        assert!(e.reason.is_declared());
    }

    #[test]
    fn falling_edge_takes_previous_sample() {
        // Linear rise of 1000/10ms; drop at i=6. Projection to t[5] is
        // (5000 + 1000) * 1.04 = 6240 >= 6000 → peak at i-1 = 5.
        let p = profile(&[
            1000.0, 2000.0, 3000.0, 4000.0, 5000.0, 6000.0, 5800.0, 5500.0, 5200.0, 5000.0,
        ]);
        let e = estimate_peak(&p, 7000, &EstimateConfig::default());
        assert_eq!(e.reason, EstReason::FallingEdge);
        assert_eq!(e.peak_index, Some(5));
        assert_eq!(e.est_sp, 6000.0);
    }

    #[test]
    fn falling_edge_spike_takes_earlier_sample() {
        // Sample 5 jumps well above the trend: projection 6240 < 8000 → peak at 4.
        let p = profile(&[
            1000.0, 2000.0, 3000.0, 4000.0, 5000.0, 8000.0, 4900.0, 4800.0, 4700.0, 4600.0,
        ]);
        let e = estimate_peak(&p, 7000, &EstimateConfig::default());
        assert_eq!(e.reason, EstReason::FallingEdge);
        assert_eq!(e.peak_index, Some(4));
        assert_eq!(e.est_sp, 5000.0);
    }

    #[test]
    fn unconfirmed_drop_is_ignored() {
        // Drop at 6 recovers at 7, real edge at 9.
        let p = profile(&[
            1000.0, 2000.0, 3000.0, 4000.0, 5000.0, 6000.0, 5900.0, 6500.0, 7000.0, 6900.0,
            6800.0, 6700.0,
        ]);
        let e = estimate_peak(&p, 7500, &EstimateConfig::default());
        assert_eq!(e.reason, EstReason::FallingEdge);
        assert_eq!(e.peak_index, Some(8));
        assert_eq!(e.est_sp, 7000.0);
    }

    #[test]
    fn no_falling_edge_uses_local_max() {
        let sp: Vec<f64> = (1..=16).map(|i| f64::from(i) * 500.0).collect();
        let p = profile(&sp);
        let e = estimate_peak(&p, 9000, &EstimateConfig::default());
        // window covers indices 0..14, max at 13
        assert_eq!(e.reason, EstReason::NoFallingEdgeLocalMax);
        assert_eq!(e.peak_index, Some(13));
        assert_eq!(e.est_sp, 7000.0);
    }

    #[test]
    fn last_sample_peak_falls_back_to_local_max() {
        // 8 samples rising: local max is the last sample too, so the
        // estimate lands on it via the last-sample rule.
        let p = profile(&[1000.0, 2000.0, 3000.0, 4000.0, 5000.0, 6000.0, 7000.0, 8000.0]);
        let e = estimate_peak(&p, 9000, &EstimateConfig::default());
        assert_eq!(e.reason, EstReason::LastSampleLocalMax);
        assert_eq!(e.peak_index, Some(7));
        assert_eq!(e.est_sp, 8000.0);
    }

    #[test]
    fn early_peak_falls_back_to_declared() {
        let p = profile(&[1000.0, 9000.0, 3000.0, 2900.0, 2800.0, 2700.0, 2600.0, 2500.0]);
        let e = estimate_peak(&p, 8500, &EstimateConfig::default());
        assert_eq!(e.reason, EstReason::EarlyPeakFallback);
        assert_eq!(e.est_sp, 8500.0);
        // edge confirmed at i=4, projection 4160 >= 2900 → i-1 = 3
        assert_eq!(e.peak_index, Some(3));
    }

    #[test]
    fn estimate_above_declared_falls_back() {
        let p = profile(&[
            1000.0, 2000.0, 3000.0, 4000.0, 5000.0, 6000.0, 5800.0, 5500.0, 5200.0, 5000.0,
        ]);
        let e = estimate_peak(&p, 5900, &EstimateConfig::default());
        assert_eq!(e.reason, EstReason::ExceedsDeclaredFallback);
        assert_eq!(e.est_sp, 5900.0);
    }

    // -----------------------------------------------------------------------
    // Launch marker
    // -----------------------------------------------------------------------

    /// Rise to a peak at 100ms (index 9), then decay; 10ms spacing, 30 samples.
    fn marker_profile() -> ShotProfile {
        let sp: Vec<f64> = (0..30)
            .map(|i| if i <= 9 { 1000.0 * (i + 1) as f64 } else { 9000.0 - 100.0 * (i - 10) as f64 })
            .collect();
        profile(&sp)
    }

    fn timing(release_ms: Option<u64>) -> MarkerTiming {
        MarkerTiming {
            release_ms,
            shot_ms: 10_000,
            first_profile_ms: 9_000,
            last_profile_ms: 9_300,
        }
    }

    #[test]
    fn release_event_mapped_onto_profile() {
        let p = marker_profile();
        // 9_030 is 10% of the way → 10% of 300ms = 30ms; first peak at 100ms
        let (m, src) = launch_marker(
            &p,
            &timing(Some(9_030)),
            &LaunchMarkerConfig::default(),
            &FirstPeakConfig::default(),
        );
        assert_eq!(src, MarkerSource::ReleaseEvent);
        assert!((m - 30.0).abs() < 1e-9);
    }

    #[test]
    fn no_release_uses_first_peak() {
        let p = marker_profile();
        let (m, src) = launch_marker(
            &p,
            &timing(None),
            &LaunchMarkerConfig::default(),
            &FirstPeakConfig::default(),
        );
        assert_eq!(src, MarkerSource::FirstPeak);
        assert_eq!(m, 100.0);
    }

    #[test]
    fn stale_release_ignored() {
        let p = marker_profile();
        let (_, src) = launch_marker(
            &p,
            &timing(Some(7_000)),
            &LaunchMarkerConfig::default(),
            &FirstPeakConfig::default(),
        );
        assert_eq!(src, MarkerSource::FirstPeak);
    }

    #[test]
    fn inconsistent_release_rejected() {
        let p = marker_profile();
        // maps to 90% of 300ms = 270ms, 170ms from the peak: accepted
        let (_, src) = launch_marker(
            &p,
            &timing(Some(9_270)),
            &LaunchMarkerConfig::default(),
            &FirstPeakConfig::default(),
        );
        assert_eq!(src, MarkerSource::ReleaseEvent);
        // clamped to 300ms, 200ms from the peak: rejected
        let (m, src) = launch_marker(
            &p,
            &timing(Some(9_900)),
            &LaunchMarkerConfig::default(),
            &FirstPeakConfig::default(),
        );
        assert_eq!(src, MarkerSource::FirstPeak);
        assert_eq!(m, 100.0);
    }

    #[test]
    fn zero_span_is_non_finite() {
        let p = marker_profile();
        let t = MarkerTiming {
            release_ms: Some(9_500),
            shot_ms: 10_000,
            first_profile_ms: 9_000,
            last_profile_ms: 9_000,
        };
        let (_, src) = launch_marker(&p, &t, &LaunchMarkerConfig::default(), &FirstPeakConfig::default());
        assert_eq!(src, MarkerSource::FirstPeak);
    }
}
