//! Oblivious (symmetric) tree builder
//!
//! Every level of an oblivious tree applies the same `(feature, border)`
//! test to all of its nodes, so a tree of depth `d` is `d` splits plus
//! `2^d` leaf values and evaluation is a bit-packed index lookup.
//! Candidate borders are quantized once per training run.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cart::TreeConfig;
use crate::matrix::FeatureMatrix;

/// Default number of candidate borders per feature
pub const DEFAULT_BORDER_COUNT: usize = 32;

/// One level of an oblivious tree
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObliviousSplit {
    pub feature: usize,
    pub border: f64,
}

/// Symmetric tree: level `d` sets bit `d` of the leaf index when
/// `x > border` (or `x` is `NaN`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObliviousTree {
    pub splits: Vec<ObliviousSplit>,
    pub leaves: Vec<f64>,
}

impl ObliviousTree {
    pub fn leaf_index(&self, features: &[f64]) -> usize {
        self.splits
            .iter()
            .enumerate()
            .fold(0, |index, (depth, split)| {
                let x = features.get(split.feature).copied().unwrap_or(f64::NAN);
                if x <= split.border {
                    index
                } else {
                    index | (1 << depth)
                }
            })
    }

    pub fn predict(&self, features: &[f64]) -> f64 {
        self.leaves
            .get(self.leaf_index(features))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn depth(&self) -> usize {
        self.splits.len()
    }
}

/// Candidate borders per feature: midpoints between distinct observed
/// values, thinned to at most `border_count` evenly spaced picks.
pub fn quantize_borders(matrix: &FeatureMatrix, border_count: usize) -> Vec<Vec<f64>> {
    (0..matrix.n_features())
        .into_par_iter()
        .map(|feature| {
            let mut values: Vec<f64> = (0..matrix.n_rows())
                .map(|row| matrix.get(row, feature))
                .filter(|x| !x.is_nan())
                .collect();
            values.sort_by(f64::total_cmp);
            values.dedup();

            let midpoints: Vec<f64> = values
                .windows(2)
                .map(|pair| pair[0] + (pair[1] - pair[0]) / 2.0)
                .collect();
            if midpoints.len() <= border_count {
                return midpoints;
            }
            (1..=border_count)
                .map(|k| midpoints[k * midpoints.len() / (border_count + 1)])
                .collect()
        })
        .collect()
}

/// Builds oblivious trees over pre-quantized borders
pub struct ObliviousBuilder<'a> {
    matrix: &'a FeatureMatrix,
    borders: &'a [Vec<f64>],
    config: &'a TreeConfig,
}

impl<'a> ObliviousBuilder<'a> {
    pub fn new(matrix: &'a FeatureMatrix, borders: &'a [Vec<f64>], config: &'a TreeConfig) -> Self {
        Self {
            matrix,
            borders,
            config,
        }
    }

    /// Grow one tree level by level, picking the split with the best
    /// total score across all current leaves. Stops early when no
    /// candidate improves on the current partition.
    pub fn build(
        &self,
        gradients: &[f64],
        hessians: &[f64],
        indices: &[usize],
        features: &[usize],
    ) -> ObliviousTree {
        let mut splits = Vec::new();
        let mut leaf_of: Vec<usize> = vec![0; indices.len()];

        for depth in 0..self.config.max_depth {
            let leaves = 1usize << depth;
            let assignment = leaf_of.as_slice();
            let current = self.partition_score(gradients, hessians, indices, assignment, leaves);

            let candidates: Vec<(f64, usize, usize)> = features
                .par_iter()
                .flat_map_iter(|&feature| {
                    let borders = self.borders.get(feature).map_or(&[][..], Vec::as_slice);
                    borders.iter().enumerate().map(move |(rank, &border)| {
                        let score = self.split_score(
                            gradients, hessians, indices, assignment, leaves, feature, border,
                        );
                        (score, feature, rank)
                    })
                })
                .collect();

            let best = candidates.into_iter().reduce(|best, candidate| {
                if candidate.0 > best.0
                    || (candidate.0 == best.0 && (candidate.1, candidate.2) < (best.1, best.2))
                {
                    candidate
                } else {
                    best
                }
            });
            let Some((score, feature, rank)) = best else {
                break;
            };
            if 0.5 * (score - current) - self.config.gamma <= 0.0 {
                break;
            }

            let border = self.borders[feature][rank];
            for (slot, &row) in leaf_of.iter_mut().zip(indices) {
                if !(self.matrix.get(row, feature) <= border) {
                    *slot |= 1 << depth;
                }
            }
            splits.push(ObliviousSplit { feature, border });
        }

        let leaf_total = 1usize << splits.len();
        let mut sums = vec![(0.0, 0.0); leaf_total];
        for (&leaf, &row) in leaf_of.iter().zip(indices) {
            sums[leaf].0 += gradients[row];
            sums[leaf].1 += hessians[row];
        }
        let leaves = sums
            .into_iter()
            .map(|(g, h)| self.config.leaf_weight(g, h))
            .collect();

        ObliviousTree { splits, leaves }
    }

    fn partition_score(
        &self,
        gradients: &[f64],
        hessians: &[f64],
        indices: &[usize],
        leaf_of: &[usize],
        leaves: usize,
    ) -> f64 {
        let mut sums = vec![(0.0, 0.0); leaves];
        for (&leaf, &row) in leaf_of.iter().zip(indices) {
            sums[leaf].0 += gradients[row];
            sums[leaf].1 += hessians[row];
        }
        sums.iter().map(|&(g, h)| self.config.score(g, h)).sum()
    }

    #[allow(clippy::too_many_arguments)]
    fn split_score(
        &self,
        gradients: &[f64],
        hessians: &[f64],
        indices: &[usize],
        leaf_of: &[usize],
        leaves: usize,
        feature: usize,
        border: f64,
    ) -> f64 {
        let mut sums = vec![(0.0, 0.0); leaves * 2];
        for (&leaf, &row) in leaf_of.iter().zip(indices) {
            let side = usize::from(!(self.matrix.get(row, feature) <= border));
            let slot = &mut sums[leaf * 2 + side];
            slot.0 += gradients[row];
            slot.1 += hessians[row];
        }
        sums.iter().map(|&(g, h)| self.config.score(g, h)).sum()
    }
}
