//! Infrastructure configuration
//!
//! Loaded once at startup from a YAML file, then overridden by
//! `NBA_LONGEVITY__SECTION__KEY` environment variables. Relative paths
//! resolve against the repository root. The result is never mutated.

use anyhow::{bail, Context, Result};
use config::{Config, Environment as EnvSource, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default configuration file, relative to the repository root
pub const DEFAULT_CONFIG_PATH: &str = "config/infra.yaml";

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "NBA_LONGEVITY";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployEnvironment {
    Local,
    Staging,
    Prod,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    pub environment: DeployEnvironment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    pub raw_data: PathBuf,
    pub train_data: PathBuf,
    pub test_data: PathBuf,
    pub artifacts_dir: PathBuf,
    pub logs_dir: PathBuf,
}

/// Experiment tracking settings, carried but not acted on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingConfig {
    pub uri: String,
    pub experiment_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// `EnvFilter` directive for this level.
    pub fn directive(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub random_state: u64,
    pub log_level: LogLevel,
    #[serde(default)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfraConfig {
    pub project: ProjectConfig,
    pub paths: PathsConfig,
    pub tracking: TrackingConfig,
    pub runtime: RuntimeConfig,
}

impl InfraConfig {
    /// Load from `config_path` (or the default file under the repository
    /// root) plus environment overrides.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to read working directory")?;
        let root = repository_root(&cwd);

        let path = match config_path {
            Some(path) => {
                if !path.exists() {
                    bail!(
                        "Configuration file {} not found (specified via --config)",
                        path.display()
                    );
                }
                path.to_path_buf()
            }
            None => root.join(DEFAULT_CONFIG_PATH),
        };

        Self::load_from(&path, &root)
    }

    /// Load `path`, resolving relative paths against `root`.
    pub fn load_from(path: &Path, root: &Path) -> Result<Self> {
        let settings = Config::builder()
            .add_source(ConfigFile::from(path))
            .add_source(
                EnvSource::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?;

        let mut config: InfraConfig = settings
            .try_deserialize()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;

        config.validate()?;
        config.paths.resolve(root);
        config.paths.create_directories()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let required = [
            ("project.name", self.project.name.as_str()),
            ("tracking.experiment_name", self.tracking.experiment_name.as_str()),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                bail!("invalid configuration: {field} must not be empty");
            }
        }
        for (field, path) in self.paths.entries() {
            if path.as_os_str().is_empty() {
                bail!("invalid configuration: paths.{field} must not be empty");
            }
        }
        Ok(())
    }
}

impl PathsConfig {
    fn entries(&self) -> [(&'static str, &PathBuf); 6] {
        [
            ("data_dir", &self.data_dir),
            ("raw_data", &self.raw_data),
            ("train_data", &self.train_data),
            ("test_data", &self.test_data),
            ("artifacts_dir", &self.artifacts_dir),
            ("logs_dir", &self.logs_dir),
        ]
    }

    fn resolve(&mut self, root: &Path) {
        for path in [
            &mut self.data_dir,
            &mut self.raw_data,
            &mut self.train_data,
            &mut self.test_data,
            &mut self.artifacts_dir,
            &mut self.logs_dir,
        ] {
            if path.is_relative() {
                *path = root.join(&*path);
            }
        }
    }

    fn create_directories(&self) -> Result<()> {
        for dir in [&self.data_dir, &self.artifacts_dir, &self.logs_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory {}", dir.display()))?;
        }
        Ok(())
    }
}

/// Nearest ancestor of `start` holding a `Cargo.toml` or `.git`, or
/// `start` itself when there is none.
pub fn repository_root(start: &Path) -> PathBuf {
    start
        .ancestors()
        .find(|dir| dir.join("Cargo.toml").exists() || dir.join(".git").exists())
        .unwrap_or(start)
        .to_path_buf()
}
