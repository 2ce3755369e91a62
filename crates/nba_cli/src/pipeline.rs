//! Training and inference pipelines
//!
//! Wires the core stages and the boosted tree adapters together. The
//! dataset backend is chosen here, at the loader, and never again.

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use nba_longevity_core::{
    BoxedDataset, CsvFrameLoader, DatasetLoader, FeatureEngineer,
    FeatureEngineeringStage, FeatureSelectionStage, FeatureSelector, FeatureSpace,
    ObserverHandle, PartitionedCsvLoader, Predictor, Preprocessor, PreprocessingStage, Record,
    StratifiedSplit, Trainer, TracingObserver, ID_COLUMN, TARGET_COLUMN,
};
use nba_longevity_trainer::{
    BoosterKind, ClassificationMetrics, GbdtPredictor, GbdtTrainer, TrainingParams,
    DEFAULT_THRESHOLD,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::InfraConfig;

/// Model directory inside `paths.artifacts_dir`
pub const MODEL_DIR: &str = "model";
/// Validation metrics report inside `paths.artifacts_dir`
pub const METRICS_FILE: &str = "metrics.json";
/// Default predictions file inside `paths.artifacts_dir`
pub const PREDICTIONS_FILE: &str = "predictions.csv";
/// Probability column of the predictions file
pub const PROBA_COLUMN: &str = "proba_5yrs";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Columnar in-memory frame
    #[default]
    Frame,
    /// Row partitions processed in parallel
    Partitioned,
}

impl Backend {
    pub fn loader(self, path: &Path) -> Box<dyn DatasetLoader> {
        match self {
            Backend::Frame => Box::new(CsvFrameLoader::new(path)),
            Backend::Partitioned => Box::new(PartitionedCsvLoader::new(path)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainOptions {
    pub backend: Backend,
    pub input: Option<PathBuf>,
    pub feature_space: FeatureSpace,
    pub params: TrainingParams,
    pub valid_fraction: f64,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            input: None,
            feature_space: FeatureSpace::default(),
            params: TrainingParams::for_kind(BoosterKind::default()),
            valid_fraction: nba_longevity_core::split::DEFAULT_VALID_FRACTION,
        }
    }
}

/// Outcome of a training run, written as the metrics report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub model_type: BoosterKind,
    pub feature_space: String,
    pub train_rows: usize,
    pub valid_rows: usize,
    pub trees: usize,
    pub best_iteration: usize,
    pub model_hash: String,
    pub metrics: ClassificationMetrics,
}

#[derive(Debug, Clone, Default)]
pub struct PredictOptions {
    pub backend: Backend,
    pub input: Option<PathBuf>,
    pub model_dir: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct InferenceReport {
    pub rows: usize,
    pub output: PathBuf,
    pub metrics: Option<ClassificationMetrics>,
}

/// Training needs labelled, filtered rows; scoring keeps every row and
/// treats the target as optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Training,
    Scoring,
}

/// Stages shared by both pipelines, with their outputs.
struct Prepared {
    engineered: Vec<Record>,
    selected: Vec<Record>,
}

fn prepare(
    backend: Backend,
    path: &Path,
    feature_space: FeatureSpace,
    observer: ObserverHandle,
    mode: Mode,
) -> Result<Prepared> {
    let raw: BoxedDataset = backend
        .loader(path)
        .load()
        .with_context(|| format!("Failed to load {}", path.display()))?;

    let preprocessing = match mode {
        Mode::Training => PreprocessingStage::new(),
        Mode::Scoring => PreprocessingStage::for_scoring(),
    };
    let clean = preprocessing
        .with_observer(observer.clone())
        .preprocess(raw.as_ref())?;
    let engineered = FeatureEngineeringStage::new()
        .with_observer(observer.clone())
        .add_features(clean.as_ref())?;
    let selection = match mode {
        Mode::Training => FeatureSelectionStage::new(feature_space),
        Mode::Scoring => FeatureSelectionStage::new(feature_space).features_only(),
    };
    let selected = selection
        .with_observer(observer)
        .select_features(engineered.as_ref())?;

    Ok(Prepared {
        engineered: engineered.collect_rows(),
        selected: selected.collect_rows(),
    })
}

fn labels(rows: &[Record]) -> Vec<f64> {
    rows.iter().filter_map(|row| row.number(TARGET_COLUMN)).collect()
}

/// load → preprocess → add features → select → split → train → evaluate → persist
pub fn run_training(config: &InfraConfig, options: &TrainOptions) -> Result<TrainingReport> {
    let input = options
        .input
        .clone()
        .unwrap_or_else(|| config.paths.raw_data.clone());
    let feature_space = options.feature_space.clone();
    let columns = feature_space.columns().to_vec();
    let params = options.params.clone().with_seed(config.runtime.random_state);

    info!(
        input = %input.display(),
        backend = ?options.backend,
        space = feature_space.name(),
        model_type = %params.kind,
        "Starting training pipeline"
    );

    let observer: ObserverHandle = Arc::new(TracingObserver);
    let prepared = prepare(
        options.backend,
        &input,
        feature_space.clone(),
        observer,
        Mode::Training,
    )?;

    let split = StratifiedSplit::new(options.valid_fraction, config.runtime.random_state);
    let (train_rows, valid_rows) = split.split(&prepared.selected)?;
    info!(train = train_rows.len(), valid = valid_rows.len(), "Split complete");

    let trainer = GbdtTrainer::new().with_feature_space(feature_space.name());
    let model = trainer.train(&train_rows, &valid_rows, &columns, TARGET_COLUMN, &params)?;

    let predictor = GbdtPredictor::new(model);
    let proba = predictor.predict_proba(&valid_rows, &columns)?;
    let metrics = ClassificationMetrics::compute(&labels(&valid_rows), &proba, DEFAULT_THRESHOLD)?;
    info!(
        auc = metrics.auc,
        f1 = metrics.f1,
        accuracy = metrics.accuracy,
        log_loss = metrics.log_loss,
        "Validation metrics"
    );

    let model_dir = config.paths.artifacts_dir.join(MODEL_DIR);
    let model = predictor.model();
    let model_hash = model
        .save(&model_dir)
        .with_context(|| format!("Failed to save model to {}", model_dir.display()))?;

    let report = TrainingReport {
        model_type: model.kind,
        feature_space: feature_space.name().to_string(),
        train_rows: train_rows.len(),
        valid_rows: valid_rows.len(),
        trees: model.trees.len(),
        best_iteration: model.metadata.best_iteration,
        model_hash,
        metrics,
    };

    let metrics_path = config.paths.artifacts_dir.join(METRICS_FILE);
    fs::write(&metrics_path, serde_json::to_string_pretty(&report)?)
        .with_context(|| format!("Failed to write {}", metrics_path.display()))?;
    info!(model = %model_dir.display(), metrics = %metrics_path.display(), "Training artifacts saved");

    Ok(report)
}

/// load → coerce/impute → add features → select features → predict → write CSV,
/// one prediction per input row
pub fn run_inference(config: &InfraConfig, options: &PredictOptions) -> Result<InferenceReport> {
    let input = options
        .input
        .clone()
        .unwrap_or_else(|| config.paths.test_data.clone());
    let model_dir = options
        .model_dir
        .clone()
        .unwrap_or_else(|| config.paths.artifacts_dir.join(MODEL_DIR));
    let output = options
        .output
        .clone()
        .unwrap_or_else(|| config.paths.artifacts_dir.join(PREDICTIONS_FILE));

    let predictor = GbdtPredictor::load(&model_dir)
        .with_context(|| format!("Failed to load model from {}", model_dir.display()))?;
    let metadata = &predictor.model().metadata;
    let feature_space = FeatureSpace::custom(
        metadata.feature_space.clone(),
        metadata.feature_columns.clone(),
    )?;
    let columns = feature_space.columns().to_vec();

    info!(
        input = %input.display(),
        model = %model_dir.display(),
        space = feature_space.name(),
        "Starting inference pipeline"
    );

    let observer: ObserverHandle = Arc::new(TracingObserver);
    let prepared = prepare(options.backend, &input, feature_space, observer, Mode::Scoring)?;
    if prepared.engineered.len() != prepared.selected.len() {
        bail!(
            "identifier rows ({}) and scored rows ({}) are not aligned",
            prepared.engineered.len(),
            prepared.selected.len()
        );
    }

    let proba = predictor.predict_proba(&prepared.selected, &columns)?;
    write_predictions(&output, &prepared.engineered, &proba)?;
    info!(rows = proba.len(), output = %output.display(), "Predictions written");

    // Metrics only when every scored row carries a label
    let truth = labels(&prepared.engineered);
    let metrics = if proba.is_empty() {
        None
    } else if truth.len() == proba.len() {
        let metrics = ClassificationMetrics::compute(&truth, &proba, DEFAULT_THRESHOLD)?;
        info!(auc = metrics.auc, f1 = metrics.f1, "Inference metrics");
        Some(metrics)
    } else {
        warn!(
            labelled = truth.len(),
            rows = proba.len(),
            "Target not available for every row, skipping metrics"
        );
        None
    };

    Ok(InferenceReport {
        rows: proba.len(),
        output,
        metrics,
    })
}

/// Write `PlayerName,proba_5yrs` rows, identifiers aligned by position.
pub fn write_predictions(path: &Path, rows: &[Record], proba: &[f64]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record([ID_COLUMN, PROBA_COLUMN])?;
    for (row, p) in rows.iter().zip(proba) {
        let id = row.get(ID_COLUMN).map(|v| v.to_string()).unwrap_or_default();
        writer.write_record([id, p.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_defaults_to_frame() {
        assert_eq!(Backend::default(), Backend::Frame);
        assert_eq!(
            Backend::from_str("partitioned", true).ok(),
            Some(Backend::Partitioned)
        );
    }

    #[test]
    fn test_predictions_file_layout() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("out/predictions.csv");
        let rows = vec![
            Record::new().with(ID_COLUMN, "Brandon Ingram"),
            Record::new().with(ID_COLUMN, "Andrew Harrison"),
        ];
        write_predictions(&path, &rows, &[0.75, 0.25])?;

        let body = fs::read_to_string(&path)?;
        assert_eq!(body, "PlayerName,proba_5yrs\nBrandon Ingram,0.75\nAndrew Harrison,0.25\n");
        Ok(())
    }

    #[test]
    fn test_default_train_options() {
        let options = TrainOptions::default();
        assert_eq!(options.feature_space.name(), "extended");
        assert_eq!(options.params.kind, BoosterKind::Depthwise);
        assert!((options.valid_fraction - 0.2).abs() < f64::EPSILON);
    }
}
