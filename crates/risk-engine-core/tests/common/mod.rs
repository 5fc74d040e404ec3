#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use risk_engine_core::{ReturnMatrix, WeightMap};
use statrs::distribution::Normal;
use std::collections::BTreeMap;

/// Seeded Normal draws rescaled to the exact sample mean and stdev.
pub fn normal_returns(n: usize, mean: f64, std_dev: f64, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let dist = Normal::new(0.0, 1.0).unwrap();
    let raw: Vec<f64> = (0..n).map(|_| rng.sample(dist)).collect();
    let m = raw.iter().sum::<f64>() / n as f64;
    let sd = (raw.iter().map(|z| (z - m).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt();
    raw.iter().map(|z| mean + std_dev * (z - m) / sd).collect()
}

/// Alternating +a/-a series with an exact mean of zero for even `n`.
pub fn zigzag(n: usize, a: f64) -> Vec<f64> {
    (0..n).map(|i| if i % 2 == 0 { a } else { -a }).collect()
}

pub fn matrix(columns: &[(&str, Vec<f64>)]) -> ReturnMatrix {
    let series: BTreeMap<String, Vec<f64>> = columns
        .iter()
        .map(|(name, values)| (name.to_string(), values.clone()))
        .collect();
    ReturnMatrix::new(series).unwrap()
}

pub fn weights(pairs: &[(&str, f64)]) -> WeightMap {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

/// Three assets over one trading year.
pub fn three_asset_matrix() -> ReturnMatrix {
    matrix(&[
        ("BOND", normal_returns(252, 0.0002, 0.004, 11)),
        ("EQTY", normal_returns(252, 0.0007, 0.016, 12)),
        ("GOLD", normal_returns(252, 0.0003, 0.010, 13)),
    ])
}
