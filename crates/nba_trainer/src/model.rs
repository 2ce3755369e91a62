//! Boosted tree ensemble and its on-disk form
//!
//! A model directory holds `model.json` (pretty JSON of [`BoostedModel`])
//! and `model.hash`, the blake3 hex digest of the exact JSON bytes.
//! Loading recomputes the digest and refuses a mismatch.

use nba_longevity_core::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

use crate::cart::Tree;
use crate::errors::TrainerError;
use crate::oblivious::ObliviousTree;

pub const MODEL_FILE: &str = "model.json";
pub const HASH_FILE: &str = "model.hash";

/// Tree growth strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoosterKind {
    /// Depth-wise exact-greedy trees (XGBoost-style)
    #[default]
    Depthwise,
    /// Symmetric trees over quantized borders (CatBoost-style)
    Oblivious,
}

impl BoosterKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Depthwise => "depthwise",
            Self::Oblivious => "oblivious",
        }
    }
}

impl fmt::Display for BoosterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BoosterKind {
    type Err = PipelineError;

    /// Accepts the strategy names and the library names they mirror.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "depthwise" | "xgboost" => Ok(Self::Depthwise),
            "oblivious" | "catboost" => Ok(Self::Oblivious),
            _ => Err(PipelineError::UnsupportedConfig {
                kind: "model type",
                value: s.to_string(),
            }),
        }
    }
}

/// One boosting round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BoostedTree {
    Depthwise(Tree),
    Oblivious(ObliviousTree),
}

impl BoostedTree {
    pub fn predict(&self, features: &[f64]) -> f64 {
        match self {
            Self::Depthwise(tree) => tree.predict(features),
            Self::Oblivious(tree) => tree.predict(features),
        }
    }
}

/// Provenance of a trained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub version: String,
    pub created_at: i64,
    pub feature_space: String,
    pub feature_columns: Vec<String>,
    pub target_column: String,
    pub train_rows: usize,
    pub valid_rows: usize,
    pub best_iteration: usize,
    pub best_score: f64,
}

/// Logistic ensemble: `p = sigmoid(base_score + learning_rate * sum(trees))`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostedModel {
    pub kind: BoosterKind,
    pub base_score: f64,
    pub learning_rate: f64,
    pub trees: Vec<BoostedTree>,
    pub metadata: ModelMetadata,
}

impl BoostedModel {
    pub fn feature_columns(&self) -> &[String] {
        &self.metadata.feature_columns
    }

    /// Raw log-odds for one feature vector.
    pub fn predict_margin(&self, features: &[f64]) -> f64 {
        self.base_score
            + self.learning_rate
                * self
                    .trees
                    .iter()
                    .map(|tree| tree.predict(features))
                    .sum::<f64>()
    }

    pub fn predict_proba(&self, features: &[f64]) -> f64 {
        sigmoid(self.predict_margin(features))
    }

    pub fn to_json(&self) -> Result<String, TrainerError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// blake3 hex digest of the serialized model.
    pub fn model_hash(&self) -> Result<String, TrainerError> {
        Ok(digest(self.to_json()?.as_bytes()))
    }

    /// Write `model.json` and `model.hash` into `dir`, returning the digest.
    pub fn save(&self, dir: &Path) -> Result<String, TrainerError> {
        fs::create_dir_all(dir)?;
        let json = self.to_json()?;
        let hash = digest(json.as_bytes());

        let model_path = dir.join(MODEL_FILE);
        info!("Saving model to: {}", model_path.display());
        fs::write(&model_path, &json)?;

        let hash_path = dir.join(HASH_FILE);
        debug!("Saving hash to: {}", hash_path.display());
        fs::write(&hash_path, &hash)?;

        Ok(hash)
    }

    /// Read a model directory written by [`BoostedModel::save`].
    pub fn load(dir: &Path) -> Result<Self, TrainerError> {
        let json = fs::read(model_path(dir))?;
        let expected = fs::read_to_string(dir.join(HASH_FILE))?.trim().to_string();
        let actual = digest(&json);
        if expected != actual {
            return Err(TrainerError::HashMismatch { expected, actual });
        }

        let model: Self = serde_json::from_slice(&json)?;
        info!(
            kind = %model.kind,
            trees = model.trees.len(),
            features = model.metadata.feature_columns.len(),
            hash = %actual,
            "Model loaded"
        );
        Ok(model)
    }
}

pub fn model_path(dir: &Path) -> PathBuf {
    dir.join(MODEL_FILE)
}

pub fn sigmoid(margin: f64) -> f64 {
    1.0 / (1.0 + (-margin).exp())
}

/// Log-odds of a probability, clamped away from 0 and 1.
pub fn logit(p: f64) -> f64 {
    let p = p.clamp(1e-6, 1.0 - 1e-6);
    (p / (1.0 - p)).ln()
}

fn digest(bytes: &[u8]) -> String {
    hex::encode(blake3::hash(bytes).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::Node;
    use crate::oblivious::ObliviousSplit;
    use tempfile::tempdir;

    pub(crate) fn sample_model() -> BoostedModel {
        let depthwise = Tree {
            nodes: vec![
                Node {
                    feature: 0,
                    threshold: 10.0,
                    left: 1,
                    right: 2,
                    value: None,
                },
                Node {
                    feature: 0,
                    threshold: 0.0,
                    left: 0,
                    right: 0,
                    value: Some(-1.0),
                },
                Node {
                    feature: 0,
                    threshold: 0.0,
                    left: 0,
                    right: 0,
                    value: Some(1.0),
                },
            ],
        };
        let oblivious = ObliviousTree {
            splits: vec![ObliviousSplit { feature: 1, border: 0.5 }],
            leaves: vec![0.0, 2.0],
        };
        BoostedModel {
            kind: BoosterKind::Depthwise,
            base_score: 0.0,
            learning_rate: 0.5,
            trees: vec![BoostedTree::Depthwise(depthwise), BoostedTree::Oblivious(oblivious)],
            metadata: ModelMetadata {
                version: "0.1.0".into(),
                created_at: 0,
                feature_space: "custom".into(),
                feature_columns: vec!["a".into(), "b".into()],
                target_column: "y".into(),
                train_rows: 8,
                valid_rows: 2,
                best_iteration: 1,
                best_score: 0.3,
            },
        }
    }

    #[test]
    fn test_margin_sums_trees() {
        let model = sample_model();
        assert_eq!(model.predict_margin(&[5.0, 0.0]), -0.5);
        assert_eq!(model.predict_margin(&[20.0, 1.0]), 1.5);
        assert_eq!(model.predict_proba(&[20.0, 1.0]), sigmoid(1.5));
    }

    #[test]
    fn test_booster_kind_parsing() {
        assert_eq!("depthwise".parse::<BoosterKind>().ok(), Some(BoosterKind::Depthwise));
        assert_eq!(" CatBoost ".parse::<BoosterKind>().ok(), Some(BoosterKind::Oblivious));

        let err = "random_forest".parse::<BoosterKind>().err();
        assert_eq!(
            err.map(|e| e.to_string()),
            Some("unsupported model type: \"random_forest\"".to_string())
        );
    }

    #[test]
    fn test_save_load_round_trip() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let model = sample_model();

        let hash = model.save(dir.path())?;
        assert_eq!(hash.len(), 64);
        assert_eq!(fs::read_to_string(dir.path().join(HASH_FILE))?, hash);

        let loaded = BoostedModel::load(dir.path())?;
        assert_eq!(loaded, model);
        assert_eq!(loaded.model_hash()?, hash);
        Ok(())
    }

    #[test]
    fn test_tampered_model_is_rejected() -> anyhow::Result<()> {
        let dir = tempdir()?;
        sample_model().save(dir.path())?;

        let path = model_path(dir.path());
        let tampered = fs::read_to_string(&path)?.replace("\"learning_rate\": 0.5", "\"learning_rate\": 0.9");
        fs::write(&path, tampered)?;

        let result = BoostedModel::load(dir.path());
        assert!(matches!(result, Err(TrainerError::HashMismatch { .. })));
        Ok(())
    }

    #[test]
    fn test_logit_inverts_sigmoid() {
        assert!((sigmoid(logit(0.3)) - 0.3).abs() < 1e-12);
        assert!(logit(0.0).is_finite());
        assert!(logit(1.0).is_finite());
    }
}
