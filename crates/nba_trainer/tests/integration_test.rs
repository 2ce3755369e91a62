//! Integration tests for the boosted tree trainer
//!
//! Trains through the port traits on feature-selected rows and checks
//! determinism, persistence and evaluation.

use anyhow::Result;
use nba_longevity_core::{
    FeatureSelectionStage, FeatureSelector, FeatureSpace, PipelineError, Predictor, Record,
    RecordSet, StratifiedSplit, Trainer, TARGET_COLUMN,
};
use nba_longevity_trainer::{
    BoostedModel, BoosterKind, ClassificationMetrics, GbdtPredictor, GbdtTrainer, TrainerError,
    TrainingParams, DEFAULT_THRESHOLD, HASH_FILE,
};
use tempfile::tempdir;

/// 200 players whose career length depends on minutes and games played.
fn engineered_rows() -> Vec<Record> {
    (0..200u32)
        .map(|i| {
            let minutes = f64::from(i % 40) + 0.5;
            let games = f64::from((i * 13) % 82);
            let label = if minutes * 2.0 + games > 80.0 { 1.0 } else { 0.0 };
            let mut row = Record::new().with("PlayerName", format!("Player {i}"));
            for column in FeatureSpace::extended().columns() {
                row.insert(column.clone(), f64::from((i * 7) % 11));
            }
            row.insert("MinutesPerGame", minutes);
            row.insert("GamesPlayed", games);
            row.with(TARGET_COLUMN, label)
        })
        .collect()
}

fn selected(space: FeatureSpace) -> Result<(Vec<Record>, Vec<Record>, Vec<String>)> {
    let input = RecordSet::new(engineered_rows());
    let columns = space.columns().to_vec();
    let rows = FeatureSelectionStage::new(space).select_features(&input)?.collect_rows();
    let (train, valid) = StratifiedSplit::default().split(&rows)?;
    Ok((train, valid, columns))
}

fn params(kind: BoosterKind) -> TrainingParams {
    TrainingParams {
        num_rounds: 120,
        learning_rate: 0.2,
        ..TrainingParams::for_kind(kind)
    }
}

fn labels(rows: &[Record]) -> Vec<f64> {
    rows.iter().filter_map(|r| r.number(TARGET_COLUMN)).collect()
}

#[test]
fn test_depthwise_model_ranks_validation_rows() -> Result<()> {
    let (train, valid, columns) = selected(FeatureSpace::minimal())?;
    let trainer = GbdtTrainer::new().with_feature_space("minimal");
    let model = trainer.train(&train, &valid, &columns, TARGET_COLUMN, &params(BoosterKind::Depthwise))?;

    let proba = GbdtPredictor::new(model).predict_proba(&valid, &columns)?;
    let metrics = ClassificationMetrics::compute(&labels(&valid), &proba, DEFAULT_THRESHOLD)?;

    assert!(metrics.auc > 0.9, "auc = {}", metrics.auc);
    assert_eq!(metrics.confusion_matrix.total(), valid.len());
    Ok(())
}

#[test]
fn test_oblivious_model_ranks_validation_rows() -> Result<()> {
    let (train, valid, columns) = selected(FeatureSpace::extended())?;
    let model = GbdtTrainer::new().train(&train, &valid, &columns, TARGET_COLUMN, &params(BoosterKind::Oblivious))?;

    let proba = GbdtPredictor::new(model).predict_proba(&valid, &columns)?;
    let metrics = ClassificationMetrics::compute(&labels(&valid), &proba, DEFAULT_THRESHOLD)?;
    assert!(metrics.auc > 0.9, "auc = {}", metrics.auc);
    Ok(())
}

#[test]
fn test_deterministic_training() -> Result<()> {
    let (train, valid, columns) = selected(FeatureSpace::minimal())?;
    let params = params(BoosterKind::Depthwise);

    let model1 = GbdtTrainer::new().fit(&train, &valid, &columns, TARGET_COLUMN, &params)?;
    let model2 = GbdtTrainer::new().fit(&train, &valid, &columns, TARGET_COLUMN, &params)?;

    assert_eq!(model1.base_score, model2.base_score, "Base score should be identical");
    assert_eq!(model1.trees, model2.trees, "Trees should be identical");
    assert_eq!(model1.metadata.best_iteration, model2.metadata.best_iteration);
    Ok(())
}

#[test]
fn test_saved_model_scores_like_the_original() -> Result<()> {
    let (train, valid, columns) = selected(FeatureSpace::minimal())?;
    let model = GbdtTrainer::new().fit(&train, &valid, &columns, TARGET_COLUMN, &params(BoosterKind::Depthwise))?;

    let dir = tempdir()?;
    let hash = model.save(dir.path())?;
    assert_eq!(std::fs::read_to_string(dir.path().join(HASH_FILE))?, hash);

    let before = GbdtPredictor::new(model).predict_proba(&valid, &columns)?;
    let after = GbdtPredictor::load(dir.path())?.predict_proba(&valid, &columns)?;
    for (a, b) in before.iter().zip(&after) {
        assert!((a - b).abs() < 1e-12);
    }
    Ok(())
}

#[test]
fn test_predictor_refuses_a_different_feature_space() -> Result<()> {
    let (train, valid, columns) = selected(FeatureSpace::minimal())?;
    let model = GbdtTrainer::new().fit(&train, &valid, &columns, TARGET_COLUMN, &params(BoosterKind::Depthwise))?;

    let extended = FeatureSpace::extended().columns().to_vec();
    let rows = FeatureSelectionStage::default()
        .select_features(&RecordSet::new(engineered_rows()))?
        .collect_rows();
    let result = GbdtPredictor::new(model).predict_proba(&rows, &extended);

    assert!(matches!(result, Err(PipelineError::SchemaMismatch { .. })));
    Ok(())
}

#[test]
fn test_unknown_model_type_is_unsupported() {
    let err = "lightgbm".parse::<BoosterKind>().err();
    assert!(matches!(err, Some(PipelineError::UnsupportedConfig { kind: "model type", .. })));
}

#[test]
fn test_load_missing_directory_fails() {
    let result = BoostedModel::load(std::path::Path::new("/definitely/not/a/model"));
    assert!(matches!(result, Err(TrainerError::Io(_))));
}
