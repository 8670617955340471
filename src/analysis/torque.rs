//! Instantaneous torque reconstruction from the fitted drag model.
//!
//! `tau = dω/dt + alpha·ω + beta·ω²`: the acceleration the launcher must have
//! supplied on top of friction. Units are speed per ms (per unit inertia).

use crate::analysis::decay::DecaySegment;
use crate::analysis::friction::FrictionFitResult;
use crate::analysis::numeric::{derivative, mean_abs_second_diff, moving_average, trapezoid};
use crate::analysis::peak::{FirstPeakConfig, first_peak_index};
use crate::protocol::profile::ShotProfile;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct TorqueConfig {
    pub smooth_window: usize,
    /// Locates the end of the input (pre-decay) window.
    pub first_peak: FirstPeakConfig,
}

impl Default for TorqueConfig {
    fn default() -> Self {
        Self {
            smooth_window: 5,
            first_peak: FirstPeakConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TorqueSeries {
    pub t_ms: Vec<f64>,
    pub tau: Vec<f64>,
    pub alpha: f64,
    pub beta: f64,
    /// False when built without a friction fit (derivative only).
    pub fitted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TorqueFeatures {
    /// Peak torque over the pre-decay window
    pub input_torque: f64,
    pub peak_index: usize,
    pub peak_time_ms: f64,
    /// Trapezoidal integral of `max(tau, 0)` over the pre-decay window
    pub positive_area: f64,
    /// Mean absolute second difference of the whole series
    pub smoothness: f64,
}

/// Torque series for `profile`. Without a fit, `alpha = beta = 0`.
pub fn torque_series(
    profile: &ShotProfile,
    fit: Option<&FrictionFitResult>,
    cfg: &TorqueConfig,
) -> TorqueSeries {
    let (alpha, beta) = fit.map_or((0.0, 0.0), |f| (f.alpha, f.beta));
    let omega = moving_average(profile.sp(), cfg.smooth_window);
    let slope = derivative(profile.t_ms(), &omega);
    let tau = omega
        .iter()
        .zip(&slope)
        .map(|(&w, &d)| {
            let v = d + alpha * w + beta * w * w;
            if v.is_finite() { v } else { 0.0 }
        })
        .collect();
    TorqueSeries {
        t_ms: profile.t_ms().to_vec(),
        tau,
        alpha,
        beta,
        fitted: fit.is_some(),
    }
}

/// Summary features of the torque series. Requires a real friction fit.
pub fn torque_features(
    profile: &ShotProfile,
    fit: &FrictionFitResult,
    decay: Option<&DecaySegment>,
    cfg: &TorqueConfig,
) -> Option<TorqueFeatures> {
    let series = torque_series(profile, Some(fit), cfg);
    let first_peak = first_peak_index(profile.t_ms(), profile.sp(), &cfg.first_peak)?;
    let end = match decay {
        Some(seg) => first_peak.min(seg.start_index.saturating_sub(1)),
        None => first_peak,
    };

    let window = &series.tau[..=end];
    let mut peak_index = 0;
    for (i, &v) in window.iter().enumerate() {
        if v > window[peak_index] {
            peak_index = i;
        }
    }
    let positive: Vec<f64> = window.iter().map(|&v| v.max(0.0)).collect();

    Some(TorqueFeatures {
        input_torque: window[peak_index],
        peak_index,
        peak_time_ms: series.t_ms[peak_index],
        positive_area: trapezoid(&series.t_ms[..=end], &positive),
        smoothness: mean_abs_second_diff(&series.tau),
    })
}
