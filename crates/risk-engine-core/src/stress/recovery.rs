use crate::stats;

/// The part of a stressed series after its wealth trough.
///
/// A series that never draws down is returned whole.
pub fn post_stress_series(returns: &[f64]) -> Vec<f64> {
    match stats::max_drawdown_with_trough(returns).1 {
        Some(trough) => returns[trough + 1..].to_vec(),
        None => returns.to_vec(),
    }
}

/// Count of positive periods in `post_stress`, if that count exceeds 60%
/// of its length.
pub fn estimate_recovery_time(post_stress: &[f64]) -> Option<usize> {
    if post_stress.is_empty() {
        return None;
    }
    let positive = post_stress.iter().filter(|r| **r > 0.0).count();
    // positive / len > 3/5
    if positive * 5 > post_stress.len() * 3 {
        Some(positive)
    } else {
        None
    }
}
