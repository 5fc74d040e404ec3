use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statrs::distribution::Normal;
use std::collections::BTreeMap;

use crate::stats;
use crate::types::{ReturnMatrix, WeightMap};

/// Normal draws rescaled so the sample mean and sample stdev are exact.
pub fn normal_returns(n: usize, mean: f64, std_dev: f64, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let dist = Normal::new(0.0, 1.0).unwrap();
    let raw: Vec<f64> = (0..n).map(|_| rng.sample(dist)).collect();
    let m = stats::mean(&raw);
    let sd = stats::sample_std(&raw);
    raw.iter().map(|z| mean + std_dev * (z - m) / sd).collect()
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
