//! Shared descriptive statistics on `f64` slices.
//!
//! Every helper returns a neutral value (0.0) for inputs too short to
//! define the statistic instead of producing NaN.

/// Values closer to zero than this are treated as exactly zero in
/// denominators.
pub const EPSILON: f64 = 1e-12;

pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Sample variance (n-1 denominator)
pub fn sample_variance(data: &[f64]) -> f64 {
    let n = data.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(data);
    let sum_sq: f64 = data.iter().map(|x| (x - m) * (x - m)).sum();
    sum_sq / (n - 1) as f64
}

/// Sample standard deviation (n-1 denominator)
pub fn sample_std(data: &[f64]) -> f64 {
    sample_variance(data).max(0.0).sqrt()
}

/// Sample covariance between two aligned series (n-1)
pub fn covariance(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return 0.0;
    }
    let mx = mean(&x[..n]);
    let my = mean(&y[..n]);
    let sum: f64 = x
        .iter()
        .zip(y.iter())
        .map(|(xi, yi)| (xi - mx) * (yi - my))
        .sum();
    sum / (n - 1) as f64
}

/// Pearson correlation; 0.0 when either series has no variance.
pub fn correlation(x: &[f64], y: &[f64]) -> f64 {
    let sx = sample_std(x);
    let sy = sample_std(y);
    if sx < EPSILON || sy < EPSILON {
        return 0.0;
    }
    (covariance(x, y) / (sx * sy)).clamp(-1.0, 1.0)
}

/// Sort a copy of the data ascending.
pub fn sorted(data: &[f64]) -> Vec<f64> {
    let mut v = data.to_vec();
    v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    v
}

/// Compute the percentile value from a **sorted** slice using linear interpolation.
///
/// `p` is in percent (5.0 = 5th percentile). Returns 0.0 for an empty slice.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        len => {
            let rank = (p / 100.0).clamp(0.0, 1.0) * (len - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            if lower == upper {
                sorted[lower]
            } else {
                let frac = rank - lower as f64;
                sorted[lower] * (1.0 - frac) + sorted[upper] * frac
            }
        }
    }
}

/// Mean of the sorted values at or below `threshold`.
///
/// Falls back to `threshold` itself when nothing lies in the tail.
pub fn tail_mean(sorted: &[f64], threshold: f64) -> f64 {
    let tail: Vec<f64> = sorted
        .iter()
        .copied()
        .take_while(|r| *r <= threshold)
        .collect();
    if tail.is_empty() {
        threshold
    } else {
        mean(&tail)
    }
}

/// Compounded wealth after each period, starting from 1.0.
pub fn wealth_curve(returns: &[f64]) -> Vec<f64> {
    let mut cumulative = 1.0;
    returns
        .iter()
        .map(|r| {
            cumulative *= 1.0 + r;
            cumulative
        })
        .collect()
}

/// Maximum peak-to-trough decline of the compounded wealth curve and the
/// index of the trough.
pub fn max_drawdown_with_trough(returns: &[f64]) -> (f64, Option<usize>) {
    let mut cumulative = 1.0;
    let mut peak = 1.0;
    let mut max_dd = 0.0;
    let mut trough = None;

    for (i, r) in returns.iter().enumerate() {
        cumulative *= 1.0 + r;
        if cumulative > peak {
            peak = cumulative;
        }
        if peak > EPSILON {
            let dd = (peak - cumulative) / peak;
            if dd > max_dd {
                max_dd = dd;
                trough = Some(i);
            }
        }
    }
    (max_dd, trough)
}

/// Maximum drawdown from a return series
pub fn max_drawdown(returns: &[f64]) -> f64 {
    max_drawdown_with_trough(returns).0
}

/// Sample skewness with the n / ((n-1)(n-2)) adjustment.
pub fn skewness(data: &[f64]) -> f64 {
    let n = data.len();
    let sd = sample_std(data);
    if n < 3 || sd < EPSILON {
        return 0.0;
    }
    let m = mean(data);
    let nf = n as f64;
    let m3: f64 = data.iter().map(|x| ((x - m) / sd).powi(3)).sum();
    nf / ((nf - 1.0) * (nf - 2.0)) * m3
}

/// Sample excess kurtosis (unbiased estimator).
pub fn excess_kurtosis(data: &[f64]) -> f64 {
    let n = data.len();
    let sd = sample_std(data);
    if n < 4 || sd < EPSILON {
        return 0.0;
    }
    let m = mean(data);
    let nf = n as f64;
    let m4: f64 = data.iter().map(|x| ((x - m) / sd).powi(4)).sum();
    let factor1 = nf * (nf + 1.0) / ((nf - 1.0) * (nf - 2.0) * (nf - 3.0));
    let factor2 = 3.0 * (nf - 1.0) * (nf - 1.0) / ((nf - 2.0) * (nf - 3.0));
    factor1 * m4 - factor2
}

// ---------------------------------------------------------------------------
// Matrix helpers
// ---------------------------------------------------------------------------

/// Matrix-vector multiplication.
pub fn mat_vec_multiply(mat: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
    mat.iter().map(|row| vec_dot(row, v)).collect()
}

/// Dot product.
pub fn vec_dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Quadratic form w' * Sigma * w.
pub fn quadratic_form(w: &[f64], sigma: &[Vec<f64>]) -> f64 {
    vec_dot(w, &mat_vec_multiply(sigma, w))
}

/// Lower-triangular Cholesky factor of a symmetric positive semi-definite
/// matrix. Returns `None` when the matrix is not positive semi-definite.
///
/// Zero pivots (perfectly collinear or constant series) produce a zero
/// column rather than a failure.
#[allow(clippy::needless_range_loop)]
pub fn cholesky(mat: &[Vec<f64>]) -> Option<Vec<Vec<f64>>> {
    let n = mat.len();
    let mut l = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = mat[i][j];
            for k in 0..j {
                sum -= l[i][k] * l[j][k];
            }
            if i == j {
                if sum < -1e-10 {
                    return None;
                }
                l[i][j] = sum.max(0.0).sqrt();
            } else if l[j][j] > EPSILON {
                l[i][j] = sum / l[j][j];
            }
        }
    }
    Some(l)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_std_known_value() {
        // variance of [1,2,3,4] with n-1 = 1.6667
        let sd = sample_std(&[1.0, 2.0, 3.0, 4.0]);
        assert!((sd - (5.0_f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_short_inputs_are_neutral() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(sample_variance(&[0.3]), 0.0);
        assert_eq!(covariance(&[0.1], &[0.2]), 0.0);
        assert_eq!(percentile_sorted(&[], 5.0), 0.0);
    }

    #[test]
    fn test_correlation_zero_variance_is_zero() {
        assert_eq!(correlation(&[0.01, 0.01, 0.01], &[0.02, -0.01, 0.03]), 0.0);
    }

    #[test]
    fn test_correlation_perfect() {
        let x = [0.01, 0.02, -0.01, 0.03];
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v + 0.001).collect();
        assert!((correlation(&x, &y) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_percentile_interpolates() {
        let s = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile_sorted(&s, 50.0), 3.0);
        assert!((percentile_sorted(&s, 10.0) - 1.4).abs() < 1e-12);
        assert_eq!(percentile_sorted(&s, 0.0), 1.0);
        assert_eq!(percentile_sorted(&s, 100.0), 5.0);
    }

    #[test]
    fn test_tail_mean_at_or_below() {
        let s = [-0.05, -0.03, -0.01, 0.02];
        assert!((tail_mean(&s, -0.03) - (-0.04)).abs() < 1e-12);
    }

    #[test]
    fn test_max_drawdown_and_trough() {
        let returns = [0.10, -0.20, 0.05, -0.10];
        let (dd, trough) = max_drawdown_with_trough(&returns);
        // peak 1.1, trough 0.8316
        assert!((dd - (1.1 - 0.8316) / 1.1).abs() < 1e-9);
        assert_eq!(trough, Some(3));
    }

    #[test]
    fn test_no_drawdown_for_rising_series() {
        assert_eq!(max_drawdown_with_trough(&[0.01, 0.02, 0.03]), (0.0, None));
    }

    #[test]
    fn test_wealth_curve() {
        let w = wealth_curve(&[0.10, -0.50]);
        assert!((w[0] - 1.1).abs() < 1e-12);
        assert!((w[1] - 0.55).abs() < 1e-12);
    }

    #[test]
    fn test_cholesky_reconstructs() {
        let m = vec![vec![4.0, 2.0], vec![2.0, 3.0]];
        let l = cholesky(&m).unwrap();
        for i in 0..2 {
            for j in 0..2 {
                let v: f64 = (0..2).map(|k| l[i][k] * l[j][k]).sum();
                assert!((v - m[i][j]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_cholesky_rejects_indefinite() {
        let m = vec![vec![1.0, 2.0], vec![2.0, 1.0]];
        assert!(cholesky(&m).is_none());
    }

    #[test]
    fn test_skew_and_kurtosis_degenerate() {
        assert_eq!(skewness(&[0.01; 10]), 0.0);
        assert_eq!(excess_kurtosis(&[0.01; 10]), 0.0);
    }
}
