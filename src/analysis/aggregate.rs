//! Cross-shot aggregation onto a common time grid.

use crate::analysis::numeric::{interpolate, mean, quantile_sorted};
use crate::analysis::peak::crossing_time;
use crate::protocol::profile::ShotProfile;

/// Largest number of points [`TimeGrid::points`] will produce.
pub const MAX_GRID_POINTS: usize = 1 << 20;

/// Regular grid `start, start + step, ..` up to and including `end`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeGrid {
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

impl TimeGrid {
    pub fn new(start: f64, end: f64, step: f64) -> Self {
        Self { start, end, step }
    }

    /// Number of grid points, or `None` for a non-positive or non-finite
    /// step, `end < start`, or more than [`MAX_GRID_POINTS`] points.
    pub fn point_count(&self) -> Option<usize> {
        let finite = self.start.is_finite() && self.end.is_finite() && self.step.is_finite();
        if !finite || self.step <= 0.0 || self.end < self.start {
            return None;
        }
        let n = ((self.end - self.start) / self.step + 1e-9).floor() + 1.0;
        if !n.is_finite() || n > MAX_GRID_POINTS as f64 {
            return None;
        }
        Some(n as usize)
    }

    /// Grid points. Empty whenever [`TimeGrid::point_count`] is `None`.
    pub fn points(&self) -> Vec<f64> {
        let n = self.point_count().unwrap_or(0);
        // Index-based to avoid accumulating step error.
        (0..n).map(|k| self.start + k as f64 * self.step).collect()
    }
}

/// Linearly resample `(t, y)` onto `grid`. Points outside the source's own
/// time range are `None`.
pub fn resample(t: &[f64], y: &[f64], grid: &[f64]) -> Vec<Option<f64>> {
    grid.iter().map(|&x| interpolate(t, y, x)).collect()
}

/// Order statistics of the valid samples at one grid point.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BandPoint {
    pub t_ms: f64,
    /// Number of series covering this point
    pub count: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub p25: Option<f64>,
    pub p75: Option<f64>,
}

/// Summary statistics of a sample set. NaNs are dropped.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Summary {
    pub count: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub p25: Option<f64>,
    pub p75: Option<f64>,
}

pub fn summarize(values: &[f64]) -> Summary {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    sorted.sort_by(f64::total_cmp);
    Summary {
        count: sorted.len(),
        mean: mean(&sorted),
        median: quantile_sorted(&sorted, 0.5),
        p25: quantile_sorted(&sorted, 0.25),
        p75: quantile_sorted(&sorted, 0.75),
    }
}

/// Per-grid-point band across `series`, each a `(t, y)` pair.
pub fn aggregate(series: &[(&[f64], &[f64])], grid: &TimeGrid) -> Vec<BandPoint> {
    let points = grid.points();
    let resampled: Vec<Vec<Option<f64>>> = series
        .iter()
        .map(|(t, y)| resample(t, y, &points))
        .collect();

    points
        .iter()
        .enumerate()
        .map(|(k, &t_ms)| {
            let column: Vec<f64> = resampled.iter().filter_map(|s| s[k]).collect();
            let s = summarize(&column);
            BandPoint {
                t_ms,
                count: s.count,
                mean: s.mean,
                median: s.median,
                p25: s.p25,
                p75: s.p75,
            }
        })
        .collect()
}

/// [`aggregate`] over speed profiles on their own time axes.
pub fn aggregate_profiles(profiles: &[ShotProfile], grid: &TimeGrid) -> Vec<BandPoint> {
    let series: Vec<(&[f64], &[f64])> = profiles.iter().map(|p| (p.t_ms(), p.sp())).collect();
    aggregate(&series, grid)
}

/// Crossing-time distribution for one ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ThresholdStats {
    pub ratio: f64,
    /// Profiles that reached the threshold (in `summary.count`) out of this many.
    pub total: usize,
    pub summary: Summary,
}

/// Crossing-time statistics of `profiles` for each ratio in `ratios`.
pub fn explore_thresholds(profiles: &[ShotProfile], ratios: &[f64]) -> Vec<ThresholdStats> {
    ratios
        .iter()
        .map(|&ratio| {
            let times: Vec<f64> = profiles
                .iter()
                .filter_map(|p| crossing_time(p.t_ms(), p.sp(), ratio))
                .collect();
            ThresholdStats {
                ratio,
                total: profiles.len(),
                summary: summarize(&times),
            }
        })
        .collect()
}
