//! Numeric helpers for the mixall estimation crates.
//!
//! Missing observations are encoded as `NaN` throughout the workspace, so
//! the moment helpers here skip non-finite values rather than propagating
//! them.

use rand::Rng;
use statrs::function::gamma::digamma;

/// Arithmetic mean of the finite values of a slice. Returns 0.0 if there are none.
pub fn mean(data: &[f64]) -> f64 {
    let (sum, n) = data
        .iter()
        .filter(|x| x.is_finite())
        .fold((0.0, 0usize), |(s, n), &x| (s + x, n + 1));
    if n == 0 {
        return 0.0;
    }
    sum / n as f64
}

/// Sample variance (N-1 denominator) of the finite values of a slice.
/// Returns 0.0 if fewer than 2 finite elements.
pub fn variance(data: &[f64]) -> f64 {
    let finite: Vec<f64> = data.iter().copied().filter(|x| x.is_finite()).collect();
    let n = finite.len();
    if n < 2 {
        return 0.0;
    }
    let nf = n as f64;
    let m = finite.iter().sum::<f64>() / nf;
    finite.iter().map(|&x| (x - m) * (x - m)).sum::<f64>() / (nf - 1.0)
}

/// Sample standard deviation with N-1 denominator over the finite values.
pub fn sd(data: &[f64]) -> f64 {
    variance(data).sqrt()
}

/// Most frequent finite value. Ties resolve to the smallest value.
///
/// Returns `None` if the slice holds no finite value.
pub fn mode(data: &[f64]) -> Option<f64> {
    let mut sorted: Vec<f64> = data.iter().copied().filter(|x| x.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut best = sorted[0];
    let mut best_count = 0;
    let mut run_start = 0;
    for i in 1..=sorted.len() {
        if i == sorted.len() || sorted[i] != sorted[run_start] {
            let count = i - run_start;
            if count > best_count {
                best_count = count;
                best = sorted[run_start];
            }
            run_start = i;
        }
    }
    Some(best)
}

/// Numerically stable `ln(Σ exp(v))`.
///
/// Returns `-inf` for an empty slice or when every value is `-inf`.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + values.iter().map(|&v| (v - max).exp()).sum::<f64>().ln()
}

/// Index of the largest value; the first one wins on ties. `NaN` entries
/// are never selected unless every entry is `NaN`, in which case 0 is returned.
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    let mut best_val = f64::NEG_INFINITY;
    let mut found = false;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        if !found || v > best_val {
            best = i;
            best_val = v;
            found = true;
        }
    }
    best
}

/// Draws an index with probability proportional to `weights`.
///
/// Negative and non-finite weights count as zero. When the total weight is
/// zero the draw is uniform over all indices.
///
/// # Panics
///
/// Panics if `weights` is empty.
pub fn sample_index<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> usize {
    assert!(!weights.is_empty(), "sample_index: weights must not be empty");
    let clean = |w: f64| if w.is_finite() && w > 0.0 { w } else { 0.0 };
    let total: f64 = weights.iter().map(|&w| clean(w)).sum();
    if total <= 0.0 {
        return rng.random_range(0..weights.len());
    }

    let u = rng.random::<f64>() * total;
    let mut acc = 0.0;
    let mut last_positive = 0;
    for (i, &w) in weights.iter().enumerate() {
        let w = clean(w);
        if w > 0.0 {
            last_positive = i;
        }
        acc += w;
        if u < acc {
            return i;
        }
    }
    // Rounding can leave `u` marginally above the accumulated total.
    last_positive
}

/// Trigamma function `ψ'(x)` for `x > 0`.
///
/// Uses the recurrence `ψ'(x) = ψ'(x + 1) + 1/x²` until `x ≥ 6`, then the
/// asymptotic expansion.
pub fn trigamma(x: f64) -> f64 {
    if !x.is_finite() || x <= 0.0 {
        return f64::NAN;
    }
    let mut x = x;
    let mut acc = 0.0;
    while x < 6.0 {
        acc += 1.0 / (x * x);
        x += 1.0;
    }
    let inv = 1.0 / x;
    let inv2 = inv * inv;
    acc + inv
        + inv2 / 2.0
        + inv * inv2 * (1.0 / 6.0 - inv2 * (1.0 / 30.0 - inv2 * (1.0 / 42.0 - inv2 / 30.0)))
}

/// Solves `ψ(x) = y` for `x > 0` by Newton iterations (Minka's starting point).
pub fn inverse_digamma(y: f64) -> f64 {
    const EULER_MASCHERONI: f64 = 0.577_215_664_901_532_9;
    if y.is_nan() {
        return f64::NAN;
    }
    let mut x = if y >= -2.22 {
        y.exp() + 0.5
    } else {
        -1.0 / (y + EULER_MASCHERONI)
    };
    for _ in 0..25 {
        let step = (digamma(x) - y) / trigamma(x);
        let mut next = x - step;
        if next <= 0.0 {
            next = x / 2.0;
        }
        let done = (next - x).abs() <= 1e-12 * x.max(1.0);
        x = next;
        if done {
            break;
        }
    }
    x
}
