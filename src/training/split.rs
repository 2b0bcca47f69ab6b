//! Stratified train/test splitting

use crate::error::{BuilderError, Result};
use ndarray::Array1;
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Seed shared by the split and every estimator
pub const DEFAULT_SEED: u64 = 42;

/// Train/test row indices, each sorted ascending
#[derive(Debug, Clone, PartialEq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Split rows so each class keeps its proportion in both partitions.
///
/// `n_test = ceil(test_size * n)`. Per-class test counts start from the
/// floor of the proportional share; leftover slots go to the classes with the
/// largest fractional share, lower class index first on ties.
pub fn stratified_split(
    y: &Array1<usize>,
    n_classes: usize,
    test_size: f64,
    seed: u64,
) -> Result<SplitIndices> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(BuilderError::InvalidInput(format!(
            "test_size must be between 0 and 1 (exclusive), got {}",
            test_size
        )));
    }

    let n = y.len();
    let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
    for (i, &c) in y.iter().enumerate() {
        if c >= n_classes {
            return Err(BuilderError::DataError(format!("Class index {} out of range", c)));
        }
        by_class[c].push(i);
    }

    if let Some(min) = by_class.iter().map(|c| c.len()).min() {
        if min < 2 {
            return Err(BuilderError::DataError(
                "The least populated class in y has only 1 member, which is too few. \
                 The minimum number of members in any class cannot be less than 2."
                    .to_string(),
            ));
        }
    }

    let n_test = (test_size * n as f64).ceil() as usize;
    let n_train = n.saturating_sub(n_test);
    if n_test < n_classes || n_train < n_classes {
        return Err(BuilderError::DataError(format!(
            "test_size={} gives {} test and {} train rows; both must be at least the number of classes ({})",
            test_size, n_test, n_train, n_classes
        )));
    }

    let allocation = allocate(&by_class, n, n_test);

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut train = Vec::with_capacity(n_train);
    let mut test = Vec::with_capacity(n_test);
    for (members, &take) in by_class.iter_mut().zip(allocation.iter()) {
        members.shuffle(&mut rng);
        test.extend_from_slice(&members[..take]);
        train.extend_from_slice(&members[take..]);
    }
    train.sort_unstable();
    test.sort_unstable();

    Ok(SplitIndices { train, test })
}

fn allocate(by_class: &[Vec<usize>], n: usize, n_test: usize) -> Vec<usize> {
    let shares: Vec<f64> = by_class
        .iter()
        .map(|c| n_test as f64 * c.len() as f64 / n as f64)
        .collect();
    let mut allocation: Vec<usize> = by_class
        .iter()
        .zip(shares.iter())
        .map(|(c, s)| (s.floor() as usize).min(c.len()))
        .collect();

    let mut order: Vec<usize> = (0..by_class.len()).collect();
    order.sort_by(|&a, &b| {
        let fa = shares[a] - shares[a].floor();
        let fb = shares[b] - shares[b].floor();
        fb.total_cmp(&fa).then(a.cmp(&b))
    });

    let mut remaining = n_test.saturating_sub(allocation.iter().sum());
    while remaining > 0 {
        let before = remaining;
        for &c in &order {
            if remaining == 0 {
                break;
            }
            if allocation[c] < by_class[c].len() {
                allocation[c] += 1;
                remaining -= 1;
            }
        }
        if remaining == before {
            break;
        }
    }
    allocation
}
