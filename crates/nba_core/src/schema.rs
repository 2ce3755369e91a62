//! Column names shared by every stage

/// Binary target: 1 when the career lasted five years or more
pub const TARGET_COLUMN: &str = "Target5Years";

/// Player identifier, kept for auditing predictions only
pub const ID_COLUMN: &str = "PlayerName";

/// Minutes per game; rows with a non-positive value are dropped
pub const MINUTES_COLUMN: &str = "MinutesPerGame";

/// Raw box-score columns coerced to numbers and imputed during preprocessing
pub const NUMERIC_COLUMNS: [&str; 19] = [
    "GamesPlayed",
    "MinutesPerGame",
    "PointsPerGame",
    "FieldGoalsMade",
    "FieldGoalsAttempted",
    "FieldGoalPct",
    "ThreePointersMade",
    "ThreePointersAttempted",
    "ThreePointerPct",
    "FreeThrowsMade",
    "FreeThrowsAttempted",
    "FreeThrowPct",
    "OffensiveRebounds",
    "DefensiveRebounds",
    "TotalRebounds",
    "Assists",
    "Steals",
    "Blocks",
    "Turnovers",
];

/// Columns appended by feature engineering
pub const DERIVED_COLUMNS: [&str; 7] = [
    "PointsPerMinute",
    "FieldGoalEfficiency",
    "ThreePointRate",
    "FreeThrowRate",
    "AssistToTurnoverRatio",
    "ReboundRate",
    "DefensiveImpact",
];
