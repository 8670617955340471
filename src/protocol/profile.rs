//! PROFILE (0x70..0x73): rotation-interval stream and the reconstructed
//! speed profile.
//!
//! Each page carries UINT16 reference-tick counts (`nRefs`) from offset 1 at
//! stride 2 until the end of the notification. Zero entries are gaps, not
//! terminators. Pages are concatenated in header order.

use crate::codec;
use crate::protocol::{FIELDS_OFFSET, SP_NUMERATOR, TICKS_PER_MS};

/// The four PROFILE pages in concatenation order, header byte included.
pub type ProfilePages<'a> = [&'a [u8]; 4];

/// One profile sample.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ProfilePoint {
    /// Cumulative elapsed time (ms)
    pub t_ms: f64,
    /// Instantaneous speed (SP, rpm-equivalent)
    pub sp: f64,
    /// Raw reference-tick count
    pub n_refs: u32,
    /// Interval since the previous sample (ms)
    pub dt_ms: f64,
}

/// Reconstructed speed time series for one shot.
///
/// Parallel arrays of equal length; `t_ms` is strictly increasing for
/// profiles built by [`reconstruct`](Self::reconstruct).
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ShotProfile {
    t_ms: Vec<f64>,
    sp: Vec<f64>,
    n_refs: Vec<u32>,
    dt_ms: Vec<f64>,
}

impl ShotProfile {
    /// Rebuild the profile from the four PROFILE pages.
    pub fn reconstruct(pages: &ProfilePages<'_>) -> Self {
        let ticks = pages
            .iter()
            .flat_map(|page| codec::u16_le_fields(page, FIELDS_OFFSET));
        Self::from_n_refs(ticks.map(u32::from))
    }

    /// Build a profile from a raw `nRefs` sequence. Zero entries are skipped.
    pub fn from_n_refs(ticks: impl IntoIterator<Item = u32>) -> Self {
        let mut profile = Self::default();
        let mut t_ms = 0.0;
        for n_refs in ticks {
            if n_refs == 0 {
                continue;
            }
            let dt_ms = f64::from(n_refs) / TICKS_PER_MS;
            if dt_ms <= 0.0 {
                continue;
            }
            t_ms += dt_ms;
            let sp = f64::from(SP_NUMERATOR / n_refs);
            profile.push(ProfilePoint {
                t_ms,
                sp,
                n_refs,
                dt_ms,
            });
        }
        profile
    }

    /// Build a profile from an already-sampled speed series (e.g. a stored
    /// shot or a synthetic curve). `nRefs` is back-computed from `sp`; the
    /// longer input is truncated.
    pub fn from_samples(t_ms: &[f64], sp: &[f64]) -> Self {
        let mut profile = Self::default();
        let mut prev_t = 0.0;
        for (&t, &s) in t_ms.iter().zip(sp) {
            let n_refs = if s > 0.0 {
                (f64::from(SP_NUMERATOR) / s).round() as u32
            } else {
                0
            };
            profile.push(ProfilePoint {
                t_ms: t,
                sp: s,
                n_refs,
                dt_ms: t - prev_t,
            });
            prev_t = t;
        }
        profile
    }

    fn push(&mut self, point: ProfilePoint) {
        self.t_ms.push(point.t_ms);
        self.sp.push(point.sp);
        self.n_refs.push(point.n_refs);
        self.dt_ms.push(point.dt_ms);
    }

    pub fn len(&self) -> usize {
        self.t_ms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t_ms.is_empty()
    }

    pub fn t_ms(&self) -> &[f64] {
        &self.t_ms
    }

    pub fn sp(&self) -> &[f64] {
        &self.sp
    }

    pub fn n_refs(&self) -> &[u32] {
        &self.n_refs
    }

    pub fn dt_ms(&self) -> &[f64] {
        &self.dt_ms
    }

    pub fn point(&self, i: usize) -> Option<ProfilePoint> {
        (i < self.len()).then(|| ProfilePoint {
            t_ms: self.t_ms[i],
            sp: self.sp[i],
            n_refs: self.n_refs[i],
            dt_ms: self.dt_ms[i],
        })
    }

    /// Combined per-sample view.
    pub fn points(&self) -> impl Iterator<Item = ProfilePoint> + '_ {
        (0..self.len()).filter_map(|i| self.point(i))
    }

    /// Raw maximum sample, 0 for an empty profile.
    pub fn max_sp(&self) -> f64 {
        self.sp.iter().copied().fold(0.0, f64::max)
    }

    /// Time of the last sample, 0 for an empty profile.
    pub fn duration_ms(&self) -> f64 {
        self.t_ms.last().copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(header: u8, ticks: &[u16]) -> Vec<u8> {
        let mut b = vec![header];
        for &t in ticks {
            b.extend_from_slice(&t.to_le_bytes());
        }
        b
    }

    #[test]
    fn reconstruct_known_sequence() {
        let p70 = page(0x70, &[1000, 1200]);
        let p71 = page(0x71, &[800]);
        let p72 = page(0x72, &[]);
        let p73 = page(0x73, &[0]);
        let profile = ShotProfile::reconstruct(&[&p70, &p71, &p72, &p73]);

        assert_eq!(profile.sp(), &[7500.0, 6250.0, 9375.0]);
        assert_eq!(profile.n_refs(), &[1000, 1200, 800]);
        assert_eq!(profile.dt_ms(), &[8.0, 9.6, 6.4]);
        let t = profile.t_ms();
        assert!((t[0] - 8.0).abs() < 1e-12);
        assert!((t[1] - 17.6).abs() < 1e-12);
        assert!((t[2] - 24.0).abs() < 1e-12);
        assert_eq!(profile.max_sp(), 9375.0);
    }

    #[test]
    fn zero_ticks_are_gaps() {
        let p70 = page(0x70, &[0, 1000, 0, 0, 1000]);
        let empty = page(0x71, &[]);
        let profile = ShotProfile::reconstruct(&[&p70, &empty, &empty, &empty]);
        assert_eq!(profile.len(), 2);
        assert_eq!(profile.t_ms(), &[8.0, 16.0]);
    }

    #[test]
    fn sp_is_floored() {
        let profile = ShotProfile::from_n_refs([7]);
        // 7_500_000 / 7 = 1071428.57...
        assert_eq!(profile.sp(), &[1_071_428.0]);
    }

    #[test]
    fn odd_trailing_byte_ignored() {
        let mut p70 = page(0x70, &[1000]);
        p70.push(0xFF);
        let empty = page(0x71, &[]);
        let profile = ShotProfile::reconstruct(&[&p70, &empty, &empty, &empty]);
        assert_eq!(profile.len(), 1);
    }

    #[test]
    fn points_view_matches_arrays() {
        let profile = ShotProfile::from_n_refs([1000, 2000]);
        let pts: Vec<ProfilePoint> = profile.points().collect();
        assert_eq!(pts.len(), 2);
        assert_eq!(pts[1].t_ms, 24.0);
        assert_eq!(pts[1].sp, 3750.0);
        assert_eq!(pts[1].dt_ms, 16.0);
        assert!(profile.point(2).is_none());
    }

    #[test]
    fn from_samples_back_computes_ticks() {
        let profile = ShotProfile::from_samples(&[1.0, 2.0, 3.0], &[7500.0, 0.0]);
        assert_eq!(profile.len(), 2);
        assert_eq!(profile.n_refs(), &[1000, 0]);
        assert_eq!(profile.duration_ms(), 2.0);
    }
}
