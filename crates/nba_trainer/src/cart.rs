//! Depth-wise regression tree builder
//!
//! Exact-greedy second-order splits: every distinct value of every
//! sampled feature is a candidate, gains use the regularized
//! gradient/hessian sums, and ties resolve deterministically.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::matrix::FeatureMatrix;

/// Training parameters for a single tree
#[derive(Clone, Debug, PartialEq)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_child_weight: f64,
    pub lambda: f64,
    pub gamma: f64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 4,
            min_child_weight: 1.0,
            lambda: 1.0,
            gamma: 0.0,
        }
    }
}

impl TreeConfig {
    /// Optimal leaf weight `-G / (H + lambda)`.
    pub fn leaf_weight(&self, gradient: f64, hessian: f64) -> f64 {
        let denominator = hessian + self.lambda;
        if denominator > 0.0 {
            -gradient / denominator
        } else {
            0.0
        }
    }

    /// Structure score `G^2 / (H + lambda)`. Empty nodes score zero.
    pub fn score(&self, gradient: f64, hessian: f64) -> f64 {
        let denominator = hessian + self.lambda;
        if denominator > 0.0 {
            gradient * gradient / denominator
        } else {
            0.0
        }
    }
}

/// Tree node. Leaves carry a value; internal nodes send
/// `x <= threshold` left and everything else (including `NaN`) right.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub feature: usize,
    pub threshold: f64,
    pub left: usize,
    pub right: usize,
    pub value: Option<f64>,
}

impl Node {
    fn leaf(value: f64) -> Self {
        Self {
            feature: 0,
            threshold: 0.0,
            left: 0,
            right: 0,
            value: Some(value),
        }
    }
}

/// Binary tree stored as a flat node list, root first
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut idx = 0usize;
        loop {
            let Some(node) = self.nodes.get(idx) else {
                return 0.0;
            };
            if let Some(value) = node.value {
                return value;
            }
            let Some(&x) = features.get(node.feature) else {
                return 0.0;
            };
            idx = if x <= node.threshold {
                node.left
            } else {
                node.right
            };
        }
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.value.is_some()).count()
    }
}

/// Deterministic ordering for equal-gain candidates:
/// lower feature, then lower threshold rank, then lower node id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SplitTieBreaker {
    pub feature_idx: usize,
    pub threshold_rank: usize,
    pub node_id: usize,
}

#[derive(Debug, Clone)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
    tie_breaker: SplitTieBreaker,
}

impl SplitCandidate {
    fn beats(&self, other: &SplitCandidate) -> bool {
        self.gain > other.gain
            || (self.gain == other.gain && self.tie_breaker < other.tie_breaker)
    }
}

/// Builds one tree from per-row gradients and hessians
pub struct CartBuilder<'a> {
    matrix: &'a FeatureMatrix,
    gradients: &'a [f64],
    hessians: &'a [f64],
    features: &'a [usize],
    config: &'a TreeConfig,
}

impl<'a> CartBuilder<'a> {
    /// `features` restricts the candidate columns (column subsampling).
    pub fn new(
        matrix: &'a FeatureMatrix,
        gradients: &'a [f64],
        hessians: &'a [f64],
        features: &'a [usize],
        config: &'a TreeConfig,
    ) -> Self {
        Self {
            matrix,
            gradients,
            hessians,
            features,
            config,
        }
    }

    /// Build a tree over the rows listed in `indices`.
    pub fn build(&self, indices: &[usize]) -> Tree {
        let mut nodes = Vec::new();
        self.build_node(indices, 0, &mut nodes, 0);
        Tree { nodes }
    }

    fn build_node(&self, indices: &[usize], depth: usize, nodes: &mut Vec<Node>, node_id: usize) -> usize {
        let current_idx = nodes.len();
        let (g, h) = self.sum_gradients_hessians(indices);
        let leaf_value = self.config.leaf_weight(g, h);

        if depth >= self.config.max_depth || indices.len() < 2 {
            nodes.push(Node::leaf(leaf_value));
            return current_idx;
        }

        let Some(split) = self.find_best_split(indices, g, h, node_id) else {
            nodes.push(Node::leaf(leaf_value));
            return current_idx;
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .partition(|&row| self.matrix.get(row, split.feature_idx) <= split.threshold);

        // Reserve the slot, children are patched in after recursion
        nodes.push(Node {
            feature: split.feature_idx,
            threshold: split.threshold,
            left: 0,
            right: 0,
            value: None,
        });

        let left = self.build_node(&left_indices, depth + 1, nodes, node_id * 2 + 1);
        let right = self.build_node(&right_indices, depth + 1, nodes, node_id * 2 + 2);
        nodes[current_idx].left = left;
        nodes[current_idx].right = right;

        current_idx
    }

    fn find_best_split(&self, indices: &[usize], g: f64, h: f64, node_id: usize) -> Option<SplitCandidate> {
        let per_feature: Vec<SplitCandidate> = self
            .features
            .par_iter()
            .filter_map(|&feature| self.best_split_for_feature(indices, feature, g, h, node_id))
            .collect();

        per_feature.into_iter().reduce(|best, candidate| {
            if candidate.beats(&best) {
                candidate
            } else {
                best
            }
        })
    }

    /// Sorted sweep over one feature. Rows with `NaN` stay on the right.
    fn best_split_for_feature(
        &self,
        indices: &[usize],
        feature: usize,
        g_total: f64,
        h_total: f64,
        node_id: usize,
    ) -> Option<SplitCandidate> {
        let mut present: Vec<(f64, f64, f64)> = indices
            .iter()
            .map(|&row| (self.matrix.get(row, feature), self.gradients[row], self.hessians[row]))
            .filter(|(x, _, _)| !x.is_nan())
            .collect();
        present.sort_by(|a, b| a.0.total_cmp(&b.0));

        let parent_score = self.config.score(g_total, h_total);
        let mut best: Option<SplitCandidate> = None;
        let (mut g_left, mut h_left) = (0.0, 0.0);
        let mut rank = 0usize;

        for pair in present.windows(2) {
            let (x, g, hess) = pair[0];
            let next = pair[1].0;
            g_left += g;
            h_left += hess;
            if x == next {
                continue;
            }
            rank += 1;

            let g_right = g_total - g_left;
            let h_right = h_total - h_left;
            if h_left < self.config.min_child_weight || h_right < self.config.min_child_weight {
                continue;
            }

            let gain = 0.5
                * (self.config.score(g_left, h_left) + self.config.score(g_right, h_right)
                    - parent_score)
                - self.config.gamma;
            if gain <= 0.0 {
                continue;
            }

            let candidate = SplitCandidate {
                feature_idx: feature,
                threshold: x + (next - x) / 2.0,
                gain,
                tie_breaker: SplitTieBreaker {
                    feature_idx: feature,
                    threshold_rank: rank,
                    node_id,
                },
            };
            if best.as_ref().map_or(true, |current| candidate.beats(current)) {
                best = Some(candidate);
            }
        }

        best
    }

    fn sum_gradients_hessians(&self, indices: &[usize]) -> (f64, f64) {
        indices.iter().fold((0.0, 0.0), |(g, h), &row| {
            (g + self.gradients[row], h + self.hessians[row])
        })
    }
}
