//! Classification metrics

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Macro-averaged scores over a label set, zero for undefined ratios
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacroScores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Sorted union of the class indices present in either array
pub fn observed_labels(y_true: &Array1<usize>, y_pred: &Array1<usize>) -> Vec<usize> {
    y_true
        .iter()
        .chain(y_pred.iter())
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn accuracy(y_true: &Array1<usize>, y_pred: &Array1<usize>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| t == p)
        .count();
    correct as f64 / y_true.len() as f64
}

/// Rows are true labels, columns predicted labels, both in `labels` order
pub fn confusion_matrix(
    y_true: &Array1<usize>,
    y_pred: &Array1<usize>,
    labels: &[usize],
) -> Vec<Vec<u64>> {
    let k = labels.len();
    let mut matrix = vec![vec![0u64; k]; k];
    let position = |c: usize| labels.iter().position(|&l| l == c);

    for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
        if let (Some(i), Some(j)) = (position(t), position(p)) {
            matrix[i][j] += 1;
        }
    }
    matrix
}

pub fn macro_scores(y_true: &Array1<usize>, y_pred: &Array1<usize>, labels: &[usize]) -> MacroScores {
    if labels.is_empty() {
        return MacroScores { precision: 0.0, recall: 0.0, f1: 0.0 };
    }

    let matrix = confusion_matrix(y_true, y_pred, labels);
    let k = labels.len();
    let (mut p_sum, mut r_sum, mut f_sum) = (0.0, 0.0, 0.0);

    for i in 0..k {
        let tp = matrix[i][i] as f64;
        let predicted: u64 = (0..k).map(|r| matrix[r][i]).sum();
        let support: u64 = matrix[i].iter().sum();
        let fp = predicted as f64 - tp;
        let fn_ = support as f64 - tp;

        p_sum += ratio(tp, tp + fp);
        r_sum += ratio(tp, tp + fn_);
        f_sum += ratio(2.0 * tp, 2.0 * tp + fp + fn_);
    }

    MacroScores {
        precision: p_sum / k as f64,
        recall: r_sum / k as f64,
        f1: f_sum / k as f64,
    }
}

fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}
