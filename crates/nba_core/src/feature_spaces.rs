//! Feature space registry
//!
//! A feature space is the ordered list of predictor columns a model is
//! trained on. The target is never listed here: the selection stage
//! appends it. The identifier is never a predictor.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{PipelineError, Result};
use crate::schema::{ID_COLUMN, TARGET_COLUMN};

/// Usage, efficiency and impact metrics plus two raw volume metrics
pub const FEATURE_SPACE_MINIMAL: [&str; 9] = [
    "PointsPerMinute",
    "FieldGoalEfficiency",
    "ThreePointRate",
    "FreeThrowRate",
    "AssistToTurnoverRatio",
    "ReboundRate",
    "DefensiveImpact",
    "MinutesPerGame",
    "GamesPlayed",
];

/// Minimal space plus raw volume and contribution metrics
pub const FEATURE_SPACE_EXTENDED: [&str; 13] = [
    "PointsPerMinute",
    "FieldGoalEfficiency",
    "ThreePointRate",
    "FreeThrowRate",
    "AssistToTurnoverRatio",
    "ReboundRate",
    "DefensiveImpact",
    "MinutesPerGame",
    "GamesPlayed",
    "PointsPerGame",
    "Assists",
    "Turnovers",
    "TotalRebounds",
];

/// Registered feature space selectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureSpaceKind {
    Minimal,
    #[default]
    Extended,
}

impl FeatureSpaceKind {
    pub const ALL: [FeatureSpaceKind; 2] = [FeatureSpaceKind::Minimal, FeatureSpaceKind::Extended];

    pub fn name(self) -> &'static str {
        match self {
            FeatureSpaceKind::Minimal => "minimal",
            FeatureSpaceKind::Extended => "extended",
        }
    }

    pub fn columns(self) -> &'static [&'static str] {
        match self {
            FeatureSpaceKind::Minimal => &FEATURE_SPACE_MINIMAL,
            FeatureSpaceKind::Extended => &FEATURE_SPACE_EXTENDED,
        }
    }
}

impl fmt::Display for FeatureSpaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FeatureSpaceKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minimal" => Ok(FeatureSpaceKind::Minimal),
            "extended" => Ok(FeatureSpaceKind::Extended),
            _ => Err(PipelineError::UnsupportedConfig {
                kind: "feature space",
                value: s.to_string(),
            }),
        }
    }
}

/// A named, ordered set of predictor columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSpace {
    name: String,
    columns: Vec<String>,
}

impl FeatureSpace {
    pub fn minimal() -> Self {
        FeatureSpaceKind::Minimal.into()
    }

    pub fn extended() -> Self {
        FeatureSpaceKind::Extended.into()
    }

    /// Resolve a registered space by name.
    pub fn from_name(name: &str) -> Result<Self> {
        name.parse::<FeatureSpaceKind>().map(Into::into)
    }

    /// Build an ad-hoc space, rejecting anything that would leak the
    /// target or the identifier into the predictors.
    pub fn custom<S: Into<String>>(name: impl Into<String>, columns: Vec<S>) -> Result<Self> {
        let name = name.into();
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();

        if columns.is_empty() {
            return Err(PipelineError::InvalidParameter(format!(
                "feature space {name} has no columns"
            )));
        }
        for (position, column) in columns.iter().enumerate() {
            if column == TARGET_COLUMN || column == ID_COLUMN {
                return Err(PipelineError::InvalidParameter(format!(
                    "feature space {name} must not contain {column}"
                )));
            }
            if columns[..position].contains(column) {
                return Err(PipelineError::InvalidParameter(format!(
                    "feature space {name} lists {column} twice"
                )));
            }
        }

        Ok(Self { name, columns })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Feature columns followed by the target: the selection stage output.
    pub fn selected_columns(&self) -> Vec<String> {
        let mut selected = self.columns.clone();
        selected.push(TARGET_COLUMN.to_string());
        selected
    }
}

impl Default for FeatureSpace {
    fn default() -> Self {
        Self::extended()
    }
}

impl From<FeatureSpaceKind> for FeatureSpace {
    fn from(kind: FeatureSpaceKind) -> Self {
        Self {
            name: kind.name().to_string(),
            columns: kind.columns().iter().map(|c| c.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DERIVED_COLUMNS, NUMERIC_COLUMNS};

    #[test]
    fn extended_is_a_superset_of_minimal() {
        let extended = FeatureSpace::extended();
        let minimal = FeatureSpace::minimal();

        assert!(minimal.columns().iter().all(|c| extended.contains(c)));
        assert!(extended.len() > minimal.len());
        // Extended keeps the minimal prefix order.
        assert_eq!(&extended.columns()[..minimal.len()], minimal.columns());
    }

    #[test]
    fn registered_spaces_never_contain_target_or_identifier() {
        for kind in FeatureSpaceKind::ALL {
            let space = FeatureSpace::from(kind);
            assert!(!space.contains(TARGET_COLUMN), "{kind} leaks the target");
            assert!(!space.contains(ID_COLUMN), "{kind} contains the identifier");
        }
    }

    #[test]
    fn registered_columns_are_raw_or_derived() {
        for kind in FeatureSpaceKind::ALL {
            for column in kind.columns() {
                assert!(
                    NUMERIC_COLUMNS.contains(column) || DERIVED_COLUMNS.contains(column),
                    "{column} is neither raw nor derived"
                );
            }
        }
    }

    #[test]
    fn default_space_is_extended() {
        assert_eq!(FeatureSpace::default().name(), "extended");
        assert_eq!(FeatureSpaceKind::default(), FeatureSpaceKind::Extended);
    }

    #[test]
    fn unknown_name_is_unsupported_config() {
        let err = FeatureSpace::from_name("maximal").unwrap_err();
        assert!(matches!(
            err,
            PipelineError::UnsupportedConfig { kind: "feature space", ref value } if value == "maximal"
        ));
        assert_eq!(FeatureSpace::from_name(" Minimal ").unwrap(), FeatureSpace::minimal());
    }

    #[test]
    fn custom_space_rejects_leakage_and_duplicates() {
        assert!(FeatureSpace::custom("leaky", vec!["PointsPerGame", TARGET_COLUMN]).is_err());
        assert!(FeatureSpace::custom("audit", vec![ID_COLUMN]).is_err());
        assert!(FeatureSpace::custom("dup", vec!["Assists", "Assists"]).is_err());
        assert!(FeatureSpace::custom::<String>("empty", vec![]).is_err());

        let space = FeatureSpace::custom("scoring", vec!["PointsPerGame", "PointsPerMinute"]).unwrap();
        assert_eq!(
            space.selected_columns(),
            vec!["PointsPerGame", "PointsPerMinute", TARGET_COLUMN]
        );
    }
}
