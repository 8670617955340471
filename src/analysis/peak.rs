//! Peak location, crossing times, and time-axis alignment.

use crate::analysis::numeric::{argmax, moving_average};
use crate::protocol::profile::ShotProfile;

/// Robust (global) peak search.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct PeakConfig {
    pub smooth_window: usize,
    /// Samples earlier than this are ignored (ms); guards against early spikes.
    pub min_time_ms: f64,
}

impl Default for PeakConfig {
    fn default() -> Self {
        Self {
            smooth_window: 5,
            min_time_ms: 80.0,
        }
    }
}

/// First local peak search.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct FirstPeakConfig {
    pub smooth_window: usize,
    /// Peak must exceed this speed...
    pub abs_floor: f64,
    /// ...and this fraction of the global maximum.
    pub ratio: f64,
    pub min_time_ms: f64,
}

impl Default for FirstPeakConfig {
    fn default() -> Self {
        Self {
            smooth_window: 3,
            abs_floor: 500.0,
            ratio: 0.2,
            min_time_ms: 20.0,
        }
    }
}

/// Arg-max of the smoothed series among samples at or after the time guard.
/// Falls back to the unguarded maximum when no sample passes the guard.
pub fn robust_peak_index(t: &[f64], sp: &[f64], cfg: &PeakConfig) -> Option<usize> {
    let n = t.len().min(sp.len());
    let smooth = moving_average(&sp[..n], cfg.smooth_window);
    let mut best: Option<usize> = None;
    for i in (0..n).filter(|&i| t[i] >= cfg.min_time_ms) {
        match best {
            Some(b) if smooth[b] >= smooth[i] => {}
            _ => best = Some(i),
        }
    }
    best.or_else(|| argmax(&smooth))
}

/// First strict local maximum (`prev < cur >= next`) of the lightly smoothed
/// series that clears `max(abs_floor, ratio * globalMax)` at or after
/// `min_time_ms`. Falls back to the global maximum.
pub fn first_peak_index(t: &[f64], sp: &[f64], cfg: &FirstPeakConfig) -> Option<usize> {
    let n = t.len().min(sp.len());
    let smooth = moving_average(&sp[..n], cfg.smooth_window);
    let global = argmax(&smooth)?;
    let threshold = cfg.abs_floor.max(cfg.ratio * smooth[global]);
    (1..n.saturating_sub(1))
        .find(|&i| {
            t[i] >= cfg.min_time_ms
                && smooth[i - 1] < smooth[i]
                && smooth[i] >= smooth[i + 1]
                && smooth[i] > threshold
        })
        .or(Some(global))
}

/// Time at which `values` first rises through `ratio * max(values)`,
/// linearly interpolated between the bracketing samples.
pub fn crossing_time(t: &[f64], values: &[f64], ratio: f64) -> Option<f64> {
    let n = t.len().min(values.len());
    let peak = values[..n].iter().copied().filter(|v| v.is_finite()).reduce(f64::max)?;
    let target = ratio * peak;
    let i = values[..n].iter().position(|&v| v >= target)?;
    if i == 0 {
        return Some(t[0]);
    }
    let (v0, v1) = (values[i - 1], values[i]);
    if v1 == v0 {
        return Some(t[i]);
    }
    Some(t[i - 1] + (target - v0) / (v1 - v0) * (t[i] - t[i - 1]))
}

/// Anchor used to overlay profiles on a common axis.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AlignMode {
    /// First sample time
    Start,
    /// Robust peak time
    Peak,
    /// 50% crossing time
    T50,
    /// Crossing time at a custom ratio
    Crossing(f64),
}

/// Anchor time for `mode`, or `None` when it cannot be computed.
pub fn alignment_anchor(
    t: &[f64],
    sp: &[f64],
    mode: AlignMode,
    cfg: &PeakConfig,
) -> Option<f64> {
    match mode {
        AlignMode::Start => t.first().copied(),
        AlignMode::Peak => robust_peak_index(t, sp, cfg).map(|i| t[i]),
        AlignMode::T50 => crossing_time(t, sp, 0.5),
        AlignMode::Crossing(ratio) => crossing_time(t, sp, ratio),
    }
}

/// Time axis shifted by `-anchor`. Uses the start anchor when the requested
/// one is unavailable.
pub fn align(t: &[f64], sp: &[f64], mode: AlignMode, cfg: &PeakConfig) -> Vec<f64> {
    let anchor = alignment_anchor(t, sp, mode, cfg)
        .or_else(|| t.first().copied())
        .unwrap_or(0.0);
    t.iter().map(|&x| x - anchor).collect()
}

/// [`align`] over a profile.
pub fn align_profile(profile: &ShotProfile, mode: AlignMode, cfg: &PeakConfig) -> Vec<f64> {
    align(profile.t_ms(), profile.sp(), mode, cfg)
}
