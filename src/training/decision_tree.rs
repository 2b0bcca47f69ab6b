//! CART decision tree classifier

use super::classifier::{check_fit_input, check_predict_input, TrainableClassifier};
use crate::error::{BuilderError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node. Children are positions in the classifier's node
/// list, so arbitrarily deep trees never recurse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node predicting a class index
    Leaf {
        class: usize,
        n_samples: usize,
    },
    /// Internal node; rows with `x[feature_idx] <= threshold` go left
    Split {
        feature_idx: usize,
        threshold: f64,
        left: usize,
        right: usize,
        n_samples: usize,
        impurity: f64,
    },
}

/// Rows still waiting to become the node at `slot`
struct PendingNode {
    slot: usize,
    indices: Vec<usize>,
    depth: usize,
}

/// Best split found on one feature
#[derive(Debug, Clone, Copy)]
struct Candidate {
    feature_idx: usize,
    threshold: f64,
    /// sum over children of (sum of squared class counts / child size);
    /// maximizing it minimizes weighted Gini impurity
    score: f64,
}

/// Gini-impurity CART classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeClassifier {
    /// Root first; empty until fitted
    nodes: Vec<TreeNode>,
    /// Maximum depth; unlimited when `None`
    pub max_depth: Option<usize>,
    pub random_state: u64,
    n_features: usize,
    n_classes: usize,
}

impl Default for DecisionTreeClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTreeClassifier {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            max_depth: None,
            random_state: super::DEFAULT_SEED,
            n_features: 0,
            n_classes: 0,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Depth of the fitted tree (a lone leaf has depth 0)
    pub fn depth(&self) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }
        let mut deepest = 0;
        let mut stack = vec![(0usize, 0usize)];
        let mut visited = 0;
        while let Some((idx, depth)) = stack.pop() {
            visited += 1;
            if visited > self.nodes.len() {
                break;
            }
            deepest = deepest.max(depth);
            if let Some(TreeNode::Split { left, right, .. }) = self.nodes.get(idx) {
                stack.push((*left, depth + 1));
                stack.push((*right, depth + 1));
            }
        }
        deepest
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node, TreeNode::Leaf { .. }))
            .count()
    }

    /// Grow the tree depth-first, left before right, with an explicit work
    /// stack. Feature permutations are drawn in that order.
    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<usize>,
        rng: &mut Xoshiro256PlusPlus,
    ) -> Vec<TreeNode> {
        let placeholder = TreeNode::Leaf {
            class: 0,
            n_samples: 0,
        };
        let mut nodes = vec![placeholder.clone()];
        let mut pending = vec![PendingNode {
            slot: 0,
            indices: (0..x.nrows()).collect(),
            depth: 0,
        }];

        while let Some(PendingNode { slot, indices, depth }) = pending.pop() {
            let n_samples = indices.len();
            let counts = self.class_counts(y, &indices);
            let impurity = gini(&counts, n_samples);
            let leaf = TreeNode::Leaf {
                class: majority(&counts),
                n_samples,
            };

            let should_stop = n_samples < 2
                || impurity <= f64::EPSILON
                || self.max_depth.map_or(false, |d| depth >= d);
            if should_stop {
                nodes[slot] = leaf;
                continue;
            }

            let mut features: Vec<usize> = (0..x.ncols()).collect();
            features.shuffle(rng);

            let node = match self.find_best_split(x, y, &indices, &features) {
                Some(best) => {
                    let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
                        .iter()
                        .partition(|&&i| x[[i, best.feature_idx]] <= best.threshold);

                    let left = nodes.len();
                    let right = left + 1;
                    nodes.push(placeholder.clone());
                    nodes.push(placeholder.clone());

                    // left goes on top so its subtree is grown first
                    pending.push(PendingNode {
                        slot: right,
                        indices: right_indices,
                        depth: depth + 1,
                    });
                    pending.push(PendingNode {
                        slot: left,
                        indices: left_indices,
                        depth: depth + 1,
                    });

                    TreeNode::Split {
                        feature_idx: best.feature_idx,
                        threshold: best.threshold,
                        left,
                        right,
                        n_samples,
                        impurity,
                    }
                }
                None => leaf,
            };
            nodes[slot] = node;
        }

        nodes
    }

    /// Scan features in the given order; the first strictly best split wins
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<usize>,
        indices: &[usize],
        features: &[usize],
    ) -> Option<Candidate> {
        // Each feature independently finds its best threshold
        let per_feature: Vec<Option<Candidate>> = features
            .par_iter()
            .map(|&feature_idx| self.best_split_on_feature(x, y, indices, feature_idx))
            .collect();

        let mut best: Option<Candidate> = None;
        for candidate in per_feature.into_iter().flatten() {
            if best.map_or(true, |b| candidate.score > b.score) {
                best = Some(candidate);
            }
        }
        best
    }

    fn best_split_on_feature(
        &self,
        x: &Array2<f64>,
        y: &Array1<usize>,
        indices: &[usize],
        feature_idx: usize,
    ) -> Option<Candidate> {
        let mut sorted: Vec<(f64, usize)> = indices
            .iter()
            .map(|&i| (x[[i, feature_idx]], y[i]))
            .collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let n = sorted.len();
        let mut left = vec![0usize; self.n_classes];
        let mut right = vec![0usize; self.n_classes];
        for &(_, c) in &sorted {
            right[c] += 1;
        }

        let mut best: Option<Candidate> = None;
        for pos in 0..n - 1 {
            let (value, class) = sorted[pos];
            left[class] += 1;
            right[class] -= 1;

            let next = sorted[pos + 1].0;
            if next <= value {
                continue;
            }

            let n_left = (pos + 1) as f64;
            let n_right = (n - pos - 1) as f64;
            let score = sum_squares(&left) / n_left + sum_squares(&right) / n_right;

            if best.map_or(true, |b| score > b.score) {
                let mut threshold = value + (next - value) / 2.0;
                if threshold >= next {
                    threshold = value;
                }
                best = Some(Candidate {
                    feature_idx,
                    threshold,
                    score,
                });
            }
        }
        best
    }

    fn class_counts(&self, y: &Array1<usize>, indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes];
        for &i in indices {
            counts[y[i]] += 1;
        }
        counts
    }

    fn predict_row(&self, row: ArrayView1<f64>) -> Result<usize> {
        if self.nodes.is_empty() {
            return Err(BuilderError::ModelNotFitted);
        }
        let mut idx = 0;
        // a well-formed path visits each node at most once
        for _ in 0..self.nodes.len() {
            match self.nodes.get(idx) {
                Some(TreeNode::Leaf { class, .. }) => return Ok(*class),
                Some(TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    ..
                }) => {
                    let value = row.get(*feature_idx).ok_or_else(|| {
                        BuilderError::Internal(format!("tree references feature {}", feature_idx))
                    })?;
                    idx = if *value <= *threshold { *left } else { *right };
                }
                None => break,
            }
        }
        Err(BuilderError::Internal("malformed decision tree".to_string()))
    }
}

impl TrainableClassifier for DecisionTreeClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>, n_classes: usize) -> Result<()> {
        check_fit_input(x, y, n_classes)?;

        self.n_features = x.ncols();
        self.n_classes = n_classes;

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.random_state);
        self.nodes = self.build_tree(x, y, &mut rng);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        if self.nodes.is_empty() {
            return Err(BuilderError::ModelNotFitted);
        }
        check_predict_input(x, self.n_features)?;
        x.rows().into_iter().map(|row| self.predict_row(row)).collect()
    }

    fn is_fitted(&self) -> bool {
        !self.nodes.is_empty()
    }
}

fn gini(counts: &[usize], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    1.0 - sum_squares(counts) / (n * n) as f64
}

fn sum_squares(counts: &[usize]) -> f64 {
    counts.iter().map(|&c| (c * c) as f64).sum()
}

/// Most common class, smallest index on ties
fn majority(counts: &[usize]) -> usize {
    let mut best = 0;
    for (c, &count) in counts.iter().enumerate() {
        if count > counts[best] {
            best = c;
        }
    }
    best
}
