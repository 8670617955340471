//! Stateless numeric primitives shared by the analysis pipeline.
//!
//! Time arrays are in milliseconds and assumed ascending.

/// Centered moving average. Window `w` averages `w / 2` samples on each side;
/// windows shrink at the edges. `w <= 1` returns a copy.
pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    let half = window / 2;
    if half == 0 || n == 0 {
        return values.to_vec();
    }
    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half).min(n - 1);
            let slice = &values[lo..=hi];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

/// Derivative of `y` against `t`: central differences inside, one-sided at
/// the ends. Zero where the time step is zero. Fewer than two samples yield
/// zeros.
pub fn derivative(t: &[f64], y: &[f64]) -> Vec<f64> {
    let n = t.len().min(y.len());
    if n < 2 {
        return vec![0.0; n];
    }
    let slope = |a: usize, b: usize| {
        let dt = t[b] - t[a];
        if dt == 0.0 { 0.0 } else { (y[b] - y[a]) / dt }
    };
    (0..n)
        .map(|i| match i {
            0 => slope(0, 1),
            i if i == n - 1 => slope(n - 2, n - 1),
            i => slope(i - 1, i + 1),
        })
        .collect()
}

/// Linear interpolation of `y(t)` at `x`. `None` outside `[t[0], t[last]]`.
pub fn interpolate(t: &[f64], y: &[f64], x: f64) -> Option<f64> {
    let n = t.len().min(y.len());
    if n == 0 || !x.is_finite() || x < t[0] || x > t[n - 1] {
        return None;
    }
    let idx = t[..n].partition_point(|&v| v < x);
    if t[idx] == x || idx == 0 {
        return Some(y[idx]);
    }
    let (t0, t1) = (t[idx - 1], t[idx]);
    let frac = (x - t0) / (t1 - t0);
    Some(y[idx - 1] + (y[idx] - y[idx - 1]) * frac)
}

/// Quantile of already-sorted data with linear interpolation between order
/// statistics. `q` is clamped to `[0, 1]`.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}

/// Quantile of unsorted data (NaNs sort last).
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    quantile_sorted(&sorted, q)
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Index of the first maximum, skipping NaNs.
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some(b) if values[b] >= v => {}
            _ => best = Some(i),
        }
    }
    best
}

/// Trapezoidal integral of `y` over `t`.
pub fn trapezoid(t: &[f64], y: &[f64]) -> f64 {
    let n = t.len().min(y.len());
    (1..n)
        .map(|i| (t[i] - t[i - 1]) * (y[i] + y[i - 1]) * 0.5)
        .sum()
}

/// Mean absolute second difference; 0 for fewer than three samples.
pub fn mean_abs_second_diff(values: &[f64]) -> f64 {
    if values.len() < 3 {
        return 0.0;
    }
    let total: f64 = values
        .windows(3)
        .map(|w| (w[2] - 2.0 * w[1] + w[0]).abs())
        .sum();
    total / (values.len() - 2) as f64
}
