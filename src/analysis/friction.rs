//! Quadratic drag fit over the decay segment.
//!
//! Model: `-dω/dt ≈ alpha·ω + beta·ω²`, solved by ordinary least squares
//! through the 2×2 normal equations.

use std::fmt;

use crate::analysis::decay::DecaySegment;
use crate::analysis::numeric::{derivative, moving_average};
use crate::protocol::profile::ShotProfile;

/// Near-singular normal equations are rejected below this determinant.
pub const DET_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct FrictionConfig {
    pub smooth_window: usize,
    /// Fewest usable samples for a fit.
    pub min_points: usize,
}

impl Default for FrictionConfig {
    fn default() -> Self {
        Self {
            smooth_window: 5,
            min_points: 4,
        }
    }
}

/// Physically implausible but accepted fit outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(rename_all = "snake_case"))]
pub enum FitWarning {
    NegativeAlpha,
    NegativeBeta,
}

impl fmt::Display for FitWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NegativeAlpha => f.write_str("alpha < 0"),
            Self::NegativeBeta => f.write_str("beta < 0"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FrictionFitResult {
    /// Linear (viscous) coefficient
    pub alpha: f64,
    /// Quadratic (aerodynamic) coefficient
    pub beta: f64,
    pub rmse: f64,
    pub r2: f64,
    pub n_points: usize,
    pub warnings: Vec<FitWarning>,
}

impl FrictionFitResult {
    /// Modelled deceleration at speed `omega`.
    pub fn drag(&self, omega: f64) -> f64 {
        self.alpha * omega + self.beta * omega * omega
    }
}

/// Fit the drag model over `segment` of `profile`.
pub fn fit_friction(
    profile: &ShotProfile,
    segment: &DecaySegment,
    cfg: &FrictionConfig,
) -> Option<FrictionFitResult> {
    if profile.is_empty() || segment.is_empty() {
        return None;
    }
    let omega = moving_average(profile.sp(), cfg.smooth_window);
    let slope = derivative(profile.t_ms(), &omega);
    let end = segment.end_index.min(omega.len() - 1);

    let mut xs = Vec::with_capacity(segment.len());
    let mut ys = Vec::with_capacity(segment.len());
    for i in segment.start_index..=end {
        let w = omega[i];
        let y = -slope[i];
        if !w.is_finite() || w <= 0.0 || !y.is_finite() {
            continue;
        }
        xs.push(w);
        ys.push(y);
    }
    if xs.len() < cfg.min_points.max(2) {
        return None;
    }
    fit_drag_samples(&xs, &ys)
}

/// Least-squares `y ≈ alpha·ω + beta·ω²` over paired samples.
pub fn fit_drag_samples(omega: &[f64], y: &[f64]) -> Option<FrictionFitResult> {
    let n = omega.len().min(y.len());
    let (mut s11, mut s12, mut s22, mut t1, mut t2) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for (&x1, &yi) in omega.iter().zip(y).take(n) {
        let x2 = x1 * x1;
        s11 += x1 * x1;
        s12 += x1 * x2;
        s22 += x2 * x2;
        t1 += x1 * yi;
        t2 += x2 * yi;
    }
    let det = s11 * s22 - s12 * s12;
    if det.abs() < DET_EPSILON {
        return None;
    }
    let alpha = (t1 * s22 - s12 * t2) / det;
    let beta = (s11 * t2 - s12 * t1) / det;
    if !alpha.is_finite() || !beta.is_finite() {
        return None;
    }

    let y_mean = y[..n].iter().sum::<f64>() / n as f64;
    let (mut ss_res, mut ss_tot) = (0.0, 0.0);
    for (&x1, &yi) in omega.iter().zip(y).take(n) {
        let r = yi - (alpha * x1 + beta * x1 * x1);
        ss_res += r * r;
        ss_tot += (yi - y_mean) * (yi - y_mean);
    }
    let r2 = if ss_tot == 0.0 { 0.0 } else { 1.0 - ss_res / ss_tot };

    let mut warnings = Vec::new();
    if alpha < 0.0 {
        warnings.push(FitWarning::NegativeAlpha);
    }
    if beta < 0.0 {
        warnings.push(FitWarning::NegativeBeta);
    }

    Some(FrictionFitResult {
        alpha,
        beta,
        rmse: (ss_res / n as f64).sqrt(),
        r2,
        n_points: n,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::decay::DecayEnd;

    const ALPHA: f64 = 0.01;
    const BETA: f64 = 0.0005;

    /// Exact solution of `dω/dt = -(a·ω + b·ω²)` from `ω0`.
    fn decay_curve(omega0: f64, dt: f64, n: usize) -> (Vec<f64>, Vec<f64>) {
        let c = ALPHA / omega0 + BETA;
        let t: Vec<f64> = (0..n).map(|i| i as f64 * dt).collect();
        let w = t
            .iter()
            .map(|&t| ALPHA / (c * (ALPHA * t).exp() - BETA))
            .collect();
        (t, w)
    }

    fn segment(start: usize, end: usize) -> DecaySegment {
        DecaySegment {
            start_index: start,
            end_index: end,
            reason: DecayEnd::EndOfProfile,
            confidence: 1.0,
        }
    }

    #[test]
    fn recovers_known_coefficients_from_samples() {
        let omega: Vec<f64> = (20..=100).map(f64::from).collect();
        let y: Vec<f64> = omega.iter().map(|&w| ALPHA * w + BETA * w * w).collect();
        let fit = fit_drag_samples(&omega, &y).unwrap();
        assert!((fit.alpha - ALPHA).abs() < 1e-9);
        assert!((fit.beta - BETA).abs() < 1e-12);
        assert!((fit.r2 - 1.0).abs() < 1e-9);
        assert!(fit.rmse < 1e-9);
        assert!(fit.warnings.is_empty());
    }

    #[test]
    fn recovers_known_coefficients_from_profile() {
        // 100 → ~20 over ~51ms at 0.1ms spacing
        let (t, w) = decay_curve(100.0, 0.1, 520);
        let profile = ShotProfile::from_samples(&t, &w);
        let fit = fit_friction(&profile, &segment(5, 514), &FrictionConfig::default()).unwrap();
        assert!((fit.alpha - ALPHA).abs() / ALPHA < 0.02, "alpha {}", fit.alpha);
        assert!((fit.beta - BETA).abs() / BETA < 0.02, "beta {}", fit.beta);
        assert!(fit.r2 > 0.999);
        assert_eq!(fit.n_points, 510);
    }

    #[test]
    fn negative_coefficients_warn() {
        let omega: Vec<f64> = (20..=60).map(f64::from).collect();
        let y: Vec<f64> = omega.iter().map(|&w| -0.02 * w + 0.001 * w * w).collect();
        let fit = fit_drag_samples(&omega, &y).unwrap();
        assert_eq!(fit.warnings, vec![FitWarning::NegativeAlpha]);
    }

    #[test]
    fn singular_system_rejected() {
        assert!(fit_drag_samples(&[0.0, 0.0, 0.0, 0.0], &[1.0, 2.0, 3.0, 4.0]).is_none());
        assert!(fit_drag_samples(&[], &[]).is_none());
    }

    #[test]
    fn too_few_points() {
        let (t, w) = decay_curve(100.0, 1.0, 20);
        let profile = ShotProfile::from_samples(&t, &w);
        assert!(fit_friction(&profile, &segment(5, 7), &FrictionConfig::default()).is_none());
    }

    #[test]
    fn constant_response_has_zero_r2() {
        // y constant → SStot == 0
        let omega = [10.0, 20.0, 30.0, 40.0];
        let y = [5.0, 5.0, 5.0, 5.0];
        let fit = fit_drag_samples(&omega, &y).unwrap();
        assert_eq!(fit.r2, 0.0);
    }
}
