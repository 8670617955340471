//! Numeric analysis of a reconstructed speed profile.
//!
//! Every stage takes a [`ShotProfile`] plus its own config and reports
//! "no result" as `None`; nothing here returns an error.

pub mod aggregate;
pub mod decay;
pub mod features;
pub mod friction;
pub mod numeric;
pub mod peak;
pub mod torque;

use log::debug;

use crate::protocol::profile::ShotProfile;
use decay::{DecayConfig, DecaySegment, detect_decay};
use features::{FeatureConfig, ShotFeatures, extract_features};
use friction::{FrictionConfig, FrictionFitResult, fit_friction};
use peak::{FirstPeakConfig, PeakConfig, first_peak_index, robust_peak_index};
use torque::{TorqueConfig, TorqueFeatures, TorqueSeries, torque_features, torque_series};

/// Configuration for [`analyze`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct AnalysisConfig {
    pub peak: PeakConfig,
    pub first_peak: FirstPeakConfig,
    pub decay: DecayConfig,
    pub friction: FrictionConfig,
    pub torque: TorqueConfig,
    pub features: FeatureConfig,
}

/// Everything [`analyze`] could derive from one profile.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ShotAnalysis {
    pub peak_index: Option<usize>,
    pub peak_sp: Option<f64>,
    pub peak_ms: Option<f64>,
    pub first_peak_index: Option<usize>,
    pub first_peak_ms: Option<f64>,
    pub decay: Option<DecaySegment>,
    pub friction: Option<FrictionFitResult>,
    /// Derivative-only when no friction fit is available.
    pub torque: TorqueSeries,
    pub torque_features: Option<TorqueFeatures>,
    pub features: Option<ShotFeatures>,
}

/// Run the full pipeline over `profile`.
pub fn analyze(profile: &ShotProfile, cfg: &AnalysisConfig) -> ShotAnalysis {
    let t = profile.t_ms();
    let sp = profile.sp();

    let peak_index = robust_peak_index(t, sp, &cfg.peak);
    let first_peak = first_peak_index(t, sp, &cfg.first_peak);
    let decay = detect_decay(profile, &cfg.decay);
    let friction = decay
        .as_ref()
        .and_then(|seg| fit_friction(profile, seg, &cfg.friction));
    let torque = torque_series(profile, friction.as_ref(), &cfg.torque);
    let torque_features = friction
        .as_ref()
        .and_then(|fit| torque_features(profile, fit, decay.as_ref(), &cfg.torque));
    let features = extract_features(profile, &cfg.features);

    debug!(
        "analysis: {} samples, peak {:?}, decay {:?}, friction {}",
        profile.len(),
        peak_index,
        decay.map(|d| (d.start_index, d.end_index)),
        if friction.is_some() { "fitted" } else { "none" },
    );

    ShotAnalysis {
        peak_index,
        peak_sp: peak_index.map(|i| sp[i]),
        peak_ms: peak_index.map(|i| t[i]),
        first_peak_index: first_peak,
        first_peak_ms: first_peak.map(|i| t[i]),
        decay,
        friction,
        torque,
        torque_features,
        features,
    }
}
