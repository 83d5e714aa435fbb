use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The eight pattern families a payload may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    Cycle,
    LayeringPath,
    SmurfingNetwork,
    ProximityRisk,
    MotifFanin,
    MotifFanout,
    TemporalBurst,
    ThresholdEvasion,
}

impl FromStr for PatternType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cycle" => Ok(Self::Cycle),
            "layering_path" => Ok(Self::LayeringPath),
            "smurfing_network" => Ok(Self::SmurfingNetwork),
            "proximity_risk" => Ok(Self::ProximityRisk),
            "motif_fanin" => Ok(Self::MotifFanin),
            "motif_fanout" => Ok(Self::MotifFanout),
            "temporal_burst" => Ok(Self::TemporalBurst),
            "threshold_evasion" => Ok(Self::ThresholdEvasion),
            _ => Err(()),
        }
    }
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Cycle => "cycle",
            Self::LayeringPath => "layering_path",
            Self::SmurfingNetwork => "smurfing_network",
            Self::ProximityRisk => "proximity_risk",
            Self::MotifFanin => "motif_fanin",
            Self::MotifFanout => "motif_fanout",
            Self::TemporalBurst => "temporal_burst",
            Self::ThresholdEvasion => "threshold_evasion",
        };
        write!(f, "{}", s)
    }
}

/// Element type of a declared feature column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Text,
    Integer,
    Float,
}

impl ColumnKind {
    /// Whether a raw CSV cell is a well-typed, non-null element.
    pub fn accepts(&self, raw: &str) -> bool {
        let raw = raw.trim();
        if raw.is_empty() {
            return false;
        }
        match self {
            Self::Text => true,
            Self::Integer => raw.parse::<i64>().is_ok(),
            // Integers are acceptable floats; NaN/inf are not data.
            Self::Float => raw.parse::<f64>().map(f64::is_finite).unwrap_or(false),
        }
    }
}

/// Declared schema of the features artifact: the `address` primary key plus
/// typed feature columns. Extra columns produced by the payload are ignored;
/// missing or mistyped declared columns invalidate the artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub columns: Vec<(String, ColumnKind)>,
}

impl FeatureSchema {
    pub const PRIMARY_KEY: &'static str = "address";

    pub fn declared(&self) -> impl Iterator<Item = (&str, ColumnKind)> {
        self.columns.iter().map(|(name, kind)| (name.as_str(), *kind))
    }
}

impl Default for FeatureSchema {
    fn default() -> Self {
        let columns = [
            ("degree_in", ColumnKind::Integer),
            ("degree_out", ColumnKind::Integer),
            ("total_amount_in", ColumnKind::Float),
            ("total_amount_out", ColumnKind::Float),
            ("tx_count", ColumnKind::Integer),
            ("unique_counterparties", ColumnKind::Integer),
            ("mean_transfer_amount", ColumnKind::Float),
            ("activity_span_seconds", ColumnKind::Integer),
        ]
        .into_iter()
        .map(|(name, kind)| (name.to_string(), kind))
        .collect();
        Self { columns }
    }
}
