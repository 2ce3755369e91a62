//! Binary classification metrics

use serde::{Deserialize, Serialize};

use crate::errors::TrainerError;

/// Probabilities are clipped to `[EPS, 1 - EPS]` for log-loss
const EPS: f64 = 1e-15;

pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Counts at a decision threshold
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_negative: usize,
    pub false_positive: usize,
    pub false_negative: usize,
    pub true_positive: usize,
}

impl ConfusionMatrix {
    /// `[[tn, fp], [fn, tp]]`, rows are actual classes.
    pub fn as_rows(&self) -> [[usize; 2]; 2] {
        [
            [self.true_negative, self.false_positive],
            [self.false_negative, self.true_positive],
        ]
    }

    pub fn total(&self) -> usize {
        self.true_negative + self.false_positive + self.false_negative + self.true_positive
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub auc: f64,
    pub f1: f64,
    pub accuracy: f64,
    pub log_loss: f64,
    pub threshold: f64,
    pub confusion_matrix: ConfusionMatrix,
}

impl ClassificationMetrics {
    /// Score probabilities against 0/1 labels; a row is predicted
    /// positive when `p >= threshold`.
    pub fn compute(y_true: &[f64], y_proba: &[f64], threshold: f64) -> Result<Self, TrainerError> {
        if y_true.len() != y_proba.len() {
            return Err(TrainerError::Dataset(format!(
                "{} labels but {} predictions",
                y_true.len(),
                y_proba.len()
            )));
        }
        if y_true.is_empty() {
            return Err(TrainerError::Dataset("no rows to evaluate".into()));
        }

        let mut cm = ConfusionMatrix::default();
        for (&y, &p) in y_true.iter().zip(y_proba) {
            match (y >= 0.5, p >= threshold) {
                (false, false) => cm.true_negative += 1,
                (false, true) => cm.false_positive += 1,
                (true, false) => cm.false_negative += 1,
                (true, true) => cm.true_positive += 1,
            }
        }

        Ok(Self {
            auc: roc_auc(y_true, y_proba),
            f1: f1(&cm),
            accuracy: (cm.true_positive + cm.true_negative) as f64 / cm.total() as f64,
            log_loss: log_loss(y_true, y_proba),
            threshold,
            confusion_matrix: cm,
        })
    }
}

/// Area under the ROC curve from average ranks (Mann-Whitney U).
/// A single-class sample has no ranking to measure and reports 0.5.
pub fn roc_auc(y_true: &[f64], y_proba: &[f64]) -> f64 {
    let positives = y_true.iter().filter(|&&y| y >= 0.5).count();
    let negatives = y_true.len() - positives;
    if positives == 0 || negatives == 0 {
        return 0.5;
    }

    let mut order: Vec<usize> = (0..y_proba.len()).collect();
    order.sort_by(|&a, &b| y_proba[a].total_cmp(&y_proba[b]));

    let mut rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && y_proba[order[end]] == y_proba[order[start]] {
            end += 1;
        }
        // Ranks start..end (1-based start+1..=end) share their average
        let average_rank = (start + 1 + end) as f64 / 2.0;
        let tied_positives = order[start..end].iter().filter(|&&i| y_true[i] >= 0.5).count();
        rank_sum += average_rank * tied_positives as f64;
        start = end;
    }

    let p = positives as f64;
    let n = negatives as f64;
    (rank_sum - p * (p + 1.0) / 2.0) / (p * n)
}

/// Mean binary cross-entropy.
pub fn log_loss(y_true: &[f64], y_proba: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let total: f64 = y_true
        .iter()
        .zip(y_proba)
        .map(|(&y, &p)| {
            let p = p.clamp(EPS, 1.0 - EPS);
            -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
        })
        .sum();
    total / y_true.len() as f64
}

/// F1 of the positive class; 0 when there are no positive predictions
/// or labels.
pub fn f1(cm: &ConfusionMatrix) -> f64 {
    let denominator = 2 * cm.true_positive + cm.false_positive + cm.false_negative;
    if denominator == 0 {
        0.0
    } else {
        (2 * cm.true_positive) as f64 / denominator as f64
    }
}
