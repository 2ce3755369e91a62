//! Gradient boosted decision tree trainer
//!
//! Second-order boosting on the logistic loss with early stopping on the
//! validation log-loss. Row and column sampling draw from a seeded LCG,
//! so the same data, parameters and seed always give the same model.

use nba_longevity_core::{LcgRng, PipelineError, Record, Trainer};
use tracing::{debug, info, warn};

use crate::cart::{CartBuilder, TreeConfig};
use crate::errors::TrainerError;
use crate::matrix::{labels, FeatureMatrix};
use crate::metrics::log_loss;
use crate::model::{logit, sigmoid, BoostedModel, BoostedTree, BoosterKind, ModelMetadata};
use crate::oblivious::{quantize_borders, ObliviousBuilder, DEFAULT_BORDER_COUNT};

/// Deepest tree either strategy may grow
pub const MAX_TREE_DEPTH: usize = 16;

/// Boosting parameters
#[derive(Clone, Debug, PartialEq)]
pub struct TrainingParams {
    pub kind: BoosterKind,
    pub num_rounds: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    pub lambda: f64,
    pub gamma: f64,
    /// Fraction of training rows drawn for each tree
    pub subsample: f64,
    /// Fraction of feature columns drawn for each tree
    pub colsample: f64,
    /// Stop after this many rounds without validation improvement
    pub early_stopping_rounds: Option<usize>,
    /// Candidate borders per feature for oblivious trees
    pub border_count: usize,
    pub seed: u64,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self::for_kind(BoosterKind::Depthwise)
    }
}

impl TrainingParams {
    /// Per-strategy defaults.
    pub fn for_kind(kind: BoosterKind) -> Self {
        match kind {
            BoosterKind::Depthwise => Self {
                kind,
                num_rounds: 1000,
                learning_rate: 0.05,
                max_depth: 4,
                min_child_weight: 1.0,
                lambda: 1.0,
                gamma: 0.0,
                subsample: 0.8,
                colsample: 0.8,
                early_stopping_rounds: Some(50),
                border_count: DEFAULT_BORDER_COUNT,
                seed: 42,
            },
            BoosterKind::Oblivious => Self {
                kind,
                num_rounds: 2000,
                learning_rate: 0.03,
                max_depth: 6,
                min_child_weight: 0.0,
                lambda: 3.0,
                gamma: 0.0,
                subsample: 1.0,
                colsample: 1.0,
                early_stopping_rounds: Some(50),
                border_count: DEFAULT_BORDER_COUNT,
                seed: 42,
            },
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<(), TrainerError> {
        let invalid = |reason: String| Err(TrainerError::InvalidParameter(reason));
        if self.num_rounds == 0 {
            return invalid("num_rounds must be at least 1".into());
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return invalid(format!("learning_rate must be in (0, 1], got {}", self.learning_rate));
        }
        if self.max_depth == 0 || self.max_depth > MAX_TREE_DEPTH {
            return invalid(format!(
                "max_depth must be in 1..={MAX_TREE_DEPTH}, got {}",
                self.max_depth
            ));
        }
        for (name, value) in [("subsample", self.subsample), ("colsample", self.colsample)] {
            if !(value > 0.0 && value <= 1.0) {
                return invalid(format!("{name} must be in (0, 1], got {value}"));
            }
        }
        if self.lambda < 0.0 || self.gamma < 0.0 || self.min_child_weight < 0.0 {
            return invalid("lambda, gamma and min_child_weight must be non-negative".into());
        }
        if self.border_count == 0 {
            return invalid("border_count must be at least 1".into());
        }
        Ok(())
    }

    fn tree_config(&self) -> TreeConfig {
        TreeConfig {
            max_depth: self.max_depth,
            min_child_weight: self.min_child_weight,
            lambda: self.lambda,
            gamma: self.gamma,
        }
    }
}

/// Boosted tree trainer, the canonical [`Trainer`] adapter
#[derive(Clone, Debug, Default)]
pub struct GbdtTrainer {
    feature_space: Option<String>,
}

impl GbdtTrainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the feature space name in the model metadata.
    pub fn with_feature_space(mut self, name: impl Into<String>) -> Self {
        self.feature_space = Some(name.into());
        self
    }

    /// Train on feature-selected rows. `valid_rows` may be empty, in which
    /// case every round is kept.
    pub fn fit(
        &self,
        train_rows: &[Record],
        valid_rows: &[Record],
        feature_columns: &[String],
        target_column: &str,
        params: &TrainingParams,
    ) -> Result<BoostedModel, TrainerError> {
        params.validate()?;
        if train_rows.is_empty() {
            return Err(TrainerError::Dataset("no training rows".into()));
        }
        if feature_columns.is_empty() {
            return Err(TrainerError::Dataset("no feature columns".into()));
        }

        let x_train = FeatureMatrix::from_records(train_rows, feature_columns)?;
        let y_train = labels(train_rows, target_column)?;
        let x_valid = FeatureMatrix::from_records(valid_rows, feature_columns)?;
        let y_valid = labels(valid_rows, target_column)?;

        info!(
            kind = %params.kind,
            train_rows = x_train.n_rows(),
            valid_rows = x_valid.n_rows(),
            features = x_train.n_features(),
            "Starting boosting"
        );
        debug!(?params, "training parameters");

        let positive_rate = y_train.iter().sum::<f64>() / y_train.len() as f64;
        let base_score = logit(positive_rate);
        let tree_config = params.tree_config();
        let borders = match params.kind {
            BoosterKind::Oblivious => quantize_borders(&x_train, params.border_count),
            BoosterKind::Depthwise => Vec::new(),
        };

        let mut margin_train = vec![base_score; x_train.n_rows()];
        let mut margin_valid = vec![base_score; x_valid.n_rows()];
        let mut rng = LcgRng::new(params.seed);
        let mut trees = Vec::with_capacity(params.num_rounds);
        let mut tracker = EarlyStopping::new(params.early_stopping_rounds);

        for round in 0..params.num_rounds {
            let (gradients, hessians) = gradients_hessians(&y_train, &margin_train);
            let rows = sample_indices(&mut rng, x_train.n_rows(), params.subsample);
            let features = sample_indices(&mut rng, x_train.n_features(), params.colsample);

            let tree = match params.kind {
                BoosterKind::Depthwise => BoostedTree::Depthwise(
                    CartBuilder::new(&x_train, &gradients, &hessians, &features, &tree_config).build(&rows),
                ),
                BoosterKind::Oblivious => BoostedTree::Oblivious(
                    ObliviousBuilder::new(&x_train, &borders, &tree_config)
                        .build(&gradients, &hessians, &rows, &features),
                ),
            };

            apply_tree(&tree, &x_train, params.learning_rate, &mut margin_train);
            apply_tree(&tree, &x_valid, params.learning_rate, &mut margin_valid);
            trees.push(tree);

            let (monitored, score) = if x_valid.is_empty() {
                ("train", probability_loss(&y_train, &margin_train))
            } else {
                ("valid", probability_loss(&y_valid, &margin_valid))
            };
            if round % 100 == 0 {
                debug!(round, monitored, logloss = score, "boosting progress");
            }

            if tracker.update(round, score) {
                info!(
                    round,
                    best_iteration = tracker.best_round,
                    best_score = tracker.best_score,
                    "Early stopping"
                );
                break;
            }
        }

        trees.truncate(tracker.best_round + 1);
        if trees.is_empty() {
            warn!("boosting produced no trees");
        }

        let metadata = ModelMetadata {
            version: crate::VERSION.to_string(),
            created_at: chrono::Utc::now().timestamp(),
            feature_space: self.feature_space.clone().unwrap_or_else(|| "custom".to_string()),
            feature_columns: feature_columns.to_vec(),
            target_column: target_column.to_string(),
            train_rows: x_train.n_rows(),
            valid_rows: x_valid.n_rows(),
            best_iteration: tracker.best_round,
            best_score: tracker.best_score,
        };

        info!(
            trees = trees.len(),
            best_iteration = metadata.best_iteration,
            best_score = metadata.best_score,
            "Training complete"
        );

        Ok(BoostedModel {
            kind: params.kind,
            base_score,
            learning_rate: params.learning_rate,
            trees,
            metadata,
        })
    }
}

impl Trainer for GbdtTrainer {
    type Params = TrainingParams;
    type Model = BoostedModel;

    fn train(
        &self,
        train_rows: &[Record],
        valid_rows: &[Record],
        feature_columns: &[String],
        target_column: &str,
        params: &TrainingParams,
    ) -> nba_longevity_core::Result<BoostedModel> {
        self.fit(train_rows, valid_rows, feature_columns, target_column, params)
            .map_err(PipelineError::from)
    }
}

/// Tracks the best round and signals when patience runs out.
#[derive(Debug)]
struct EarlyStopping {
    patience: Option<usize>,
    best_round: usize,
    best_score: f64,
}

impl EarlyStopping {
    fn new(patience: Option<usize>) -> Self {
        Self {
            patience,
            best_round: 0,
            best_score: f64::INFINITY,
        }
    }

    /// Returns true when training should stop.
    fn update(&mut self, round: usize, score: f64) -> bool {
        if score < self.best_score {
            self.best_score = score;
            self.best_round = round;
        }
        match self.patience {
            Some(patience) => round - self.best_round >= patience,
            None => {
                // Without patience every round is kept
                self.best_round = round;
                self.best_score = score;
                false
            }
        }
    }
}

/// Logistic loss gradients `p - y` and hessians `p (1 - p)`.
fn gradients_hessians(labels: &[f64], margins: &[f64]) -> (Vec<f64>, Vec<f64>) {
    labels
        .iter()
        .zip(margins)
        .map(|(&y, &margin)| {
            let p = sigmoid(margin);
            (p - y, (p * (1.0 - p)).max(1e-16))
        })
        .unzip()
}

/// Sorted sample of `ceil(fraction * n)` indices out of `0..n`.
fn sample_indices(rng: &mut LcgRng, n: usize, fraction: f64) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    if fraction >= 1.0 {
        return indices;
    }
    let take = ((fraction * n as f64).ceil() as usize).clamp(1, n.max(1));
    rng.shuffle(&mut indices);
    indices.truncate(take);
    indices.sort_unstable();
    indices
}

fn apply_tree(tree: &BoostedTree, matrix: &FeatureMatrix, learning_rate: f64, margins: &mut [f64]) {
    for (row, margin) in margins.iter_mut().enumerate() {
        *margin += learning_rate * tree.predict(matrix.row(row));
    }
}

fn probability_loss(labels: &[f64], margins: &[f64]) -> f64 {
    let proba: Vec<f64> = margins.iter().map(|&m| sigmoid(m)).collect();
    log_loss(labels, &proba)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nba_longevity_core::TARGET_COLUMN;

    fn separable_rows(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| {
                let x = i as f64;
                Record::new()
                    .with("skill", x)
                    .with("noise", ((i * 7) % 5) as f64)
                    .with(TARGET_COLUMN, if i >= n / 2 { 1.0 } else { 0.0 })
            })
            .collect()
    }

    fn columns() -> Vec<String> {
        vec!["skill".to_string(), "noise".to_string()]
    }

    fn quick_params(kind: BoosterKind) -> TrainingParams {
        TrainingParams {
            num_rounds: 30,
            learning_rate: 0.3,
            min_child_weight: 0.1,
            early_stopping_rounds: None,
            ..TrainingParams::for_kind(kind)
        }
    }

    #[test]
    fn test_train_separable_depthwise() -> Result<(), TrainerError> {
        let rows = separable_rows(40);
        let model = GbdtTrainer::new().fit(&rows, &[], &columns(), TARGET_COLUMN, &quick_params(BoosterKind::Depthwise))?;

        assert_eq!(model.trees.len(), 30);
        assert!(model.predict_proba(&[35.0, 0.0]) > 0.9);
        assert!(model.predict_proba(&[3.0, 0.0]) < 0.1);
        assert_eq!(model.metadata.feature_space, "custom");
        Ok(())
    }

    #[test]
    fn test_train_separable_oblivious() -> Result<(), TrainerError> {
        let rows = separable_rows(40);
        let model = GbdtTrainer::new()
            .with_feature_space("minimal")
            .fit(&rows, &[], &columns(), TARGET_COLUMN, &quick_params(BoosterKind::Oblivious))?;

        assert_eq!(model.kind, BoosterKind::Oblivious);
        assert!(model.predict_proba(&[35.0, 0.0]) > 0.8);
        assert!(model.predict_proba(&[3.0, 0.0]) < 0.2);
        assert_eq!(model.metadata.feature_space, "minimal");
        Ok(())
    }

    #[test]
    fn test_training_is_deterministic() -> Result<(), TrainerError> {
        let rows = separable_rows(60);
        let params = quick_params(BoosterKind::Depthwise);
        let a = GbdtTrainer::new().fit(&rows, &rows[..10], &columns(), TARGET_COLUMN, &params)?;
        let b = GbdtTrainer::new().fit(&rows, &rows[..10], &columns(), TARGET_COLUMN, &params)?;

        assert_eq!(a.trees, b.trees);
        assert_eq!(a.base_score, b.base_score);
        Ok(())
    }

    #[test]
    fn test_early_stopping_truncates_to_best_round() {
        let mut tracker = EarlyStopping::new(Some(2));
        assert!(!tracker.update(0, 0.6));
        assert!(!tracker.update(1, 0.5));
        assert!(!tracker.update(2, 0.55));
        assert!(tracker.update(3, 0.52));
        assert_eq!(tracker.best_round, 1);
    }

    #[test]
    fn test_early_stopping_keeps_best_prefix() -> Result<(), TrainerError> {
        let train = separable_rows(40);
        // Validation labels are inverted, so loss only gets worse.
        let valid: Vec<Record> = separable_rows(10)
            .into_iter()
            .map(|row| {
                let flipped = 1.0 - row.number(TARGET_COLUMN).unwrap_or(0.0);
                row.with(TARGET_COLUMN, flipped)
            })
            .collect();
        let params = TrainingParams {
            early_stopping_rounds: Some(3),
            ..quick_params(BoosterKind::Depthwise)
        };

        let model = GbdtTrainer::new().fit(&train, &valid, &columns(), TARGET_COLUMN, &params)?;
        assert_eq!(model.trees.len(), model.metadata.best_iteration + 1);
        assert!(model.trees.len() < 30);
        Ok(())
    }

    #[test]
    fn test_invalid_params_are_rejected() {
        let rows = separable_rows(10);
        let params = TrainingParams {
            learning_rate: 0.0,
            ..TrainingParams::default()
        };
        let result = GbdtTrainer::new().fit(&rows, &[], &columns(), TARGET_COLUMN, &params);
        assert!(matches!(result, Err(TrainerError::InvalidParameter(_))));

        let params = TrainingParams {
            max_depth: MAX_TREE_DEPTH + 1,
            ..TrainingParams::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_empty_training_set_is_a_port_error() {
        let result = GbdtTrainer::new().train(&[], &[], &columns(), TARGET_COLUMN, &TrainingParams::default());
        assert!(matches!(result, Err(PipelineError::Training(_))));
    }

    #[test]
    fn test_sample_indices() {
        let mut rng = LcgRng::new(1);
        assert_eq!(sample_indices(&mut rng, 5, 1.0), vec![0, 1, 2, 3, 4]);

        let sampled = sample_indices(&mut rng, 10, 0.8);
        assert_eq!(sampled.len(), 8);
        assert!(sampled.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(sample_indices(&mut rng, 3, 0.01).len(), 1);
    }
}
