//! Shape and timing features of a single profile.
//!
//! All times are relative to the first sample with positive `nRefs` and
//! positive speed.

use crate::analysis::numeric::{derivative, mean, mean_abs_second_diff, moving_average, trapezoid};
use crate::analysis::peak::{FirstPeakConfig, crossing_time, first_peak_index};
use crate::protocol::profile::ShotProfile;

/// Bounds for the synthetic noise score.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct NoiseConfig {
    /// Tick counts below this are implausibly fast.
    pub min_n_refs: u32,
    /// Speeds above this are implausible.
    pub max_sp: f64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            min_n_refs: 375,
            max_sp: 20_000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct FeatureConfig {
    pub first_peak: FirstPeakConfig,
    /// Smoothing applied before differentiating for acceleration.
    pub accel_smooth_window: usize,
    pub noise: NoiseConfig,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            first_peak: FirstPeakConfig::default(),
            accel_smooth_window: 3,
            noise: NoiseConfig::default(),
        }
    }
}

/// Positive-acceleration mass before the first peak, split at half the
/// first-peak time.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct InputTiming {
    pub early_mass: f64,
    pub late_mass: f64,
    /// `late / (early + late)`; `None` without positive acceleration.
    pub late_ratio: Option<f64>,
    /// Time of the largest acceleration before the first peak.
    pub accel_peak_ms: f64,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ShotFeatures {
    /// Time of the re-zeroing sample on the original axis.
    pub origin_ms: f64,
    pub first_peak_sp: f64,
    pub first_peak_ms: f64,
    pub second_peak_sp: Option<f64>,
    pub second_peak_ms: Option<f64>,
    pub t50_ms: Option<f64>,
    pub t70_ms: Option<f64>,
    /// 10% → 90% rise time
    pub rise_time_ms: Option<f64>,
    pub max_slope_to_first_peak: f64,
    pub auc_to_first_peak: f64,
    /// First peak over the mean of its two preceding samples.
    pub spike_score: Option<f64>,
    pub smoothness: f64,
    /// Implausible samples before the first peak.
    pub noise_score: usize,
    pub input_timing: InputTiming,
}

/// Extract features, or `None` when no sample has positive `nRefs` and speed.
pub fn extract_features(profile: &ShotProfile, cfg: &FeatureConfig) -> Option<ShotFeatures> {
    let origin = profile
        .n_refs()
        .iter()
        .zip(profile.sp())
        .position(|(&n, &s)| n > 0 && s > 0.0)?;
    let origin_ms = profile.t_ms()[origin];
    let t: Vec<f64> = profile.t_ms()[origin..].iter().map(|&x| x - origin_ms).collect();
    let sp = &profile.sp()[origin..];
    let n_refs = &profile.n_refs()[origin..];

    let fp = first_peak_index(&t, sp, &cfg.first_peak)?;
    let (second_peak_sp, second_peak_ms) = match second_peak(sp, fp, cfg.first_peak.smooth_window) {
        Some(i) => (Some(sp[i]), Some(t[i])),
        None => (None, None),
    };

    let t10 = crossing_time(&t, sp, 0.1);
    let t90 = crossing_time(&t, sp, 0.9);

    let max_slope_to_first_peak = (1..=fp)
        .filter_map(|i| {
            let dt = t[i] - t[i - 1];
            (dt > 0.0).then(|| (sp[i] - sp[i - 1]) / dt)
        })
        .fold(0.0, f64::max);

    let spike_score = if fp >= 2 {
        mean(&sp[fp - 2..fp]).filter(|&m| m > 0.0).map(|m| sp[fp] / m)
    } else {
        None
    };

    let noise_score = (0..fp)
        .filter(|&i| {
            n_refs[i] < cfg.noise.min_n_refs || sp[i] <= 0.0 || sp[i] > cfg.noise.max_sp
        })
        .count();

    Some(ShotFeatures {
        origin_ms,
        first_peak_sp: sp[fp],
        first_peak_ms: t[fp],
        second_peak_sp,
        second_peak_ms,
        t50_ms: crossing_time(&t, sp, 0.5),
        t70_ms: crossing_time(&t, sp, 0.7),
        rise_time_ms: t10.zip(t90).map(|(a, b)| b - a),
        max_slope_to_first_peak,
        auc_to_first_peak: trapezoid(&t[..=fp], &sp[..=fp]),
        spike_score,
        smoothness: mean_abs_second_diff(sp),
        noise_score,
        input_timing: input_timing(&t, sp, fp, cfg.accel_smooth_window),
    })
}

/// Highest strict local maximum after the first peak.
fn second_peak(sp: &[f64], first: usize, window: usize) -> Option<usize> {
    let smooth = moving_average(sp, window);
    let mut best: Option<usize> = None;
    for i in first + 1..smooth.len().saturating_sub(1) {
        if smooth[i - 1] < smooth[i] && smooth[i] >= smooth[i + 1] {
            match best {
                Some(b) if smooth[b] >= smooth[i] => {}
                _ => best = Some(i),
            }
        }
    }
    best
}

fn input_timing(t: &[f64], sp: &[f64], fp: usize, window: usize) -> InputTiming {
    let accel = derivative(t, &moving_average(sp, window));
    let half = t[fp] / 2.0;
    let (mut early_mass, mut late_mass) = (0.0, 0.0);
    for i in 1..=fp {
        let mass = accel[i].max(0.0) * (t[i] - t[i - 1]);
        if t[i] <= half {
            early_mass += mass;
        } else {
            late_mass += mass;
        }
    }
    let total = early_mass + late_mass;
    let mut accel_peak = 0;
    for i in 1..=fp {
        if accel[i] > accel[accel_peak] {
            accel_peak = i;
        }
    }
    InputTiming {
        early_mass,
        late_mass,
        late_ratio: (total > 0.0).then(|| late_mass / total),
        accel_peak_ms: t[accel_peak],
    }
}
