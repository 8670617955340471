//! Post-peak decay window used for friction fitting.

use std::fmt;

use crate::analysis::numeric::{argmax, derivative, moving_average};
use crate::protocol::profile::ShotProfile;

/// Profiles shorter than this have no decay segment.
pub const MIN_SAMPLES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct DecayConfig {
    pub smooth_window: usize,
    /// Samples below this speed cannot start a window and end one.
    pub min_omega: f64,
    /// Largest sample-to-sample increase tolerated, as a fraction of the peak.
    pub allow_increase_ratio: f64,
    /// Derivative magnitude below which the decay has flattened out.
    pub max_jitter: f64,
    pub min_points: usize,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            smooth_window: 5,
            min_omega: 100.0,
            allow_increase_ratio: 0.01,
            max_jitter: 0.08,
            min_points: 6,
        }
    }
}

/// Why a decay window stopped growing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(rename_all = "snake_case"))]
pub enum DecayEnd {
    /// Derivative fell below the jitter floor (boundary sample kept).
    Flattened,
    /// Speed fell below `min_omega` (boundary sample kept).
    BelowFloor,
    /// Speed rose by more than the tolerated step (rising sample excluded).
    Increase,
    /// Ran to the last sample.
    EndOfProfile,
}

impl fmt::Display for DecayEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Flattened => "flattened",
            Self::BelowFloor => "below_floor",
            Self::Increase => "increase",
            Self::EndOfProfile => "end_of_profile",
        };
        f.write_str(s)
    }
}

/// Inclusive index range into the smoothed speed series.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DecaySegment {
    pub start_index: usize,
    pub end_index: usize,
    pub reason: DecayEnd,
    /// `1 - increases / length`, in `[0, 1]`
    pub confidence: f64,
}

impl DecaySegment {
    pub fn len(&self) -> usize {
        self.end_index + 1 - self.start_index
    }

    pub fn is_empty(&self) -> bool {
        self.end_index < self.start_index
    }
}

/// Find the longest qualifying post-peak decay window. Ties keep the first.
pub fn detect_decay(profile: &ShotProfile, cfg: &DecayConfig) -> Option<DecaySegment> {
    if profile.len() < MIN_SAMPLES {
        return None;
    }
    let smooth = moving_average(profile.sp(), cfg.smooth_window);
    let slope = derivative(profile.t_ms(), &smooth);
    let peak_index = argmax(&smooth)?;
    let peak = smooth[peak_index];
    let max_step = cfg.allow_increase_ratio * peak;
    let n = smooth.len();

    let mut best: Option<DecaySegment> = None;
    for start in peak_index + 1..n {
        if smooth[start] < cfg.min_omega {
            continue;
        }
        let mut end = start;
        let mut increases = 0usize;
        let mut reason = DecayEnd::EndOfProfile;
        for j in start + 1..n {
            let step = smooth[j] - smooth[j - 1];
            if step >= max_step {
                reason = DecayEnd::Increase;
                break;
            }
            if step > 0.0 {
                increases += 1;
            }
            end = j;
            if smooth[j] < cfg.min_omega {
                reason = DecayEnd::BelowFloor;
                break;
            }
            if slope[j].abs() < cfg.max_jitter {
                reason = DecayEnd::Flattened;
                break;
            }
        }

        let len = end + 1 - start;
        if len < cfg.min_points || best.is_some_and(|b| b.len() >= len) {
            continue;
        }
        best = Some(DecaySegment {
            start_index: start,
            end_index: end,
            reason,
            confidence: (1.0 - increases as f64 / len as f64).max(0.0),
        });
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64).collect()
    }

    #[test]
    fn rise_then_ten_sample_decay() {
        // Peak at index 5, then 10 strictly decreasing samples.
        let sp = [
            3500.0, 4000.0, 4500.0, 5000.0, 5500.0, 6000.0, 5500.0, 5000.0, 4500.0, 4000.0,
            3500.0, 3000.0, 2500.0, 2000.0, 1500.0, 1000.0,
        ];
        let p = ShotProfile::from_samples(&axis(sp.len()), &sp);
        let seg = detect_decay(&p, &DecayConfig::default()).unwrap();
        assert_eq!(seg.start_index, 6);
        assert_eq!(seg.end_index, 15);
        assert_eq!(seg.len(), 10);
        assert_eq!(seg.confidence, 1.0);
        assert_eq!(seg.reason, DecayEnd::EndOfProfile);
    }

    #[test]
    fn too_short() {
        let sp = [1.0, 2.0, 3.0, 2.0, 1.0, 0.5, 0.2];
        let p = ShotProfile::from_samples(&axis(sp.len()), &sp);
        assert_eq!(detect_decay(&p, &DecayConfig::default()), None);
    }

    #[test]
    fn flat_tail_ends_window() {
        // Decay flattens into a plateau; the window stops at the first flat
        // derivative and keeps that sample.
        let mut sp = vec![2000.0, 4000.0, 6000.0, 8000.0, 10000.0];
        sp.extend((1..=8).map(|k| 10000.0 - 1000.0 * f64::from(k)));
        sp.extend([2000.0; 8]);
        let cfg = DecayConfig {
            smooth_window: 1,
            ..DecayConfig::default()
        };
        let p = ShotProfile::from_samples(&axis(sp.len()), &sp);
        let seg = detect_decay(&p, &cfg).unwrap();
        assert_eq!(seg.start_index, 5);
        // index 12 (2000) has slope (2000-3000)/2 = -500; index 13 is flat
        assert_eq!(seg.end_index, 13);
        assert_eq!(seg.reason, DecayEnd::Flattened);
    }

    #[test]
    fn large_increase_splits_window() {
        // Bump at index 9 exceeds 1% of the peak; the longer second half wins.
        let sp = [
            1000.0, 5000.0, 10000.0, 9000.0, 8000.0, 7000.0, 6000.0, 5000.0, 4000.0, 6000.0,
            5500.0, 5000.0, 4500.0, 4000.0, 3500.0, 3000.0, 2500.0, 2000.0,
        ];
        let cfg = DecayConfig {
            smooth_window: 1,
            ..DecayConfig::default()
        };
        let p = ShotProfile::from_samples(&axis(sp.len()), &sp);
        let seg = detect_decay(&p, &cfg).unwrap();
        assert_eq!(seg.start_index, 9);
        assert_eq!(seg.end_index, 17);
        assert_eq!(seg.confidence, 1.0);
    }

    #[test]
    fn equal_windows_keep_the_earlier() {
        // Two six-sample decays split by a jump well above 1% of the peak.
        let sp = [
            1000.0, 5000.0, 10000.0, 9000.0, 8000.0, 7000.0, 6000.0, 5000.0, 4000.0, 6000.0,
            5500.0, 5000.0, 4500.0, 4000.0, 3500.0,
        ];
        let cfg = DecayConfig {
            smooth_window: 1,
            ..DecayConfig::default()
        };
        let p = ShotProfile::from_samples(&axis(sp.len()), &sp);
        let seg = detect_decay(&p, &cfg).unwrap();
        assert_eq!(seg.start_index, 3);
        assert_eq!(seg.end_index, 8);
        assert_eq!(seg.len(), 6);
        assert_eq!(seg.reason, DecayEnd::Increase);
    }

    #[test]
    fn small_increases_lower_confidence() {
        // Two tiny bumps (< 1% of peak) inside an otherwise clean decay.
        let sp = [
            1000.0, 5000.0, 10000.0, 9000.0, 8000.0, 8050.0, 7000.0, 6000.0, 6050.0, 5000.0,
            4000.0, 3000.0,
        ];
        let cfg = DecayConfig {
            smooth_window: 1,
            ..DecayConfig::default()
        };
        let p = ShotProfile::from_samples(&axis(sp.len()), &sp);
        let seg = detect_decay(&p, &cfg).unwrap();
        assert_eq!(seg.start_index, 3);
        assert_eq!(seg.end_index, 11);
        assert!((seg.confidence - (1.0 - 2.0 / 9.0)).abs() < 1e-12);
    }

    #[test]
    fn below_floor_never_qualifies() {
        let sp = [10.0, 50.0, 90.0, 80.0, 70.0, 60.0, 50.0, 40.0, 30.0, 20.0];
        let p = ShotProfile::from_samples(&axis(sp.len()), &sp);
        assert_eq!(detect_decay(&p, &DecayConfig::default()), None);
    }
}
