//! Environment variables override file values

use anyhow::Result;
use nba_longevity_cli::{InfraConfig, LogLevel};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_environment_overrides_file_values() -> Result<()> {
    let root = tempdir()?;
    let path = root.path().join("infra.yaml");
    fs::write(
        &path,
        r#"
project:
  name: nba-longevity
  environment: local
paths:
  data_dir: data
  raw_data: data/raw.csv
  train_data: data/train.csv
  test_data: data/test.csv
  artifacts_dir: artifacts
  logs_dir: logs
tracking:
  uri: file:./mlruns
  experiment_name: nba-longevity
runtime:
  random_state: 42
  log_level: INFO
"#,
    )?;

    std::env::set_var("NBA_LONGEVITY__RUNTIME__RANDOM_STATE", "7");
    std::env::set_var("NBA_LONGEVITY__RUNTIME__LOG_LEVEL", "DEBUG");
    let config = InfraConfig::load_from(&path, root.path());
    std::env::remove_var("NBA_LONGEVITY__RUNTIME__RANDOM_STATE");
    std::env::remove_var("NBA_LONGEVITY__RUNTIME__LOG_LEVEL");

    let config = config?;
    assert_eq!(config.runtime.random_state, 7);
    assert_eq!(config.runtime.log_level, LogLevel::Debug);
    assert_eq!(config.project.name, "nba-longevity");
    Ok(())
}
