use crate::artifacts::{csv_reader, split_list, ReportedPattern};
use crate::error::{Result, ScoringError};
use crate::schema::{FeatureSchema, PatternType};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

const FEATURES_FILE: &str = "features.csv";
const PATTERNS_FILE: &str = "patterns.csv";

/// Result of validating one run's output directory.
#[derive(Debug)]
pub struct ValidationOutcome {
    /// The hard gate: false forces a zero final score and disqualifies the
    /// submission.
    pub features_valid: bool,
    /// Human-readable reason when the gate failed.
    pub invalid_reason: Option<String>,
    /// Parsed pattern rows, including structurally invalid ones.
    pub patterns: Vec<ReportedPattern>,
}

impl ValidationOutcome {
    fn invalid(reason: impl Into<String>) -> Self {
        Self {
            features_valid: false,
            invalid_reason: Some(reason.into()),
            patterns: Vec::new(),
        }
    }
}

/// Validates the two artifacts a payload must produce.
///
/// File-level defects (missing artifact, unreadable CSV, schema violations in
/// features) fail the hard gate. Row-level defects in patterns mark only that
/// row structurally invalid; classification counts it as an invalid pattern.
pub struct OutputValidator {
    schema: FeatureSchema,
}

impl Default for OutputValidator {
    fn default() -> Self {
        Self {
            schema: FeatureSchema::default(),
        }
    }
}

impl OutputValidator {
    pub fn new(schema: FeatureSchema) -> Self {
        Self { schema }
    }

    pub fn validate(&self, output_dir: &Path) -> Result<ValidationOutcome> {
        let feature_addresses = match self.validate_features(&output_dir.join(FEATURES_FILE)) {
            Ok(addresses) => addresses,
            Err(ValidationFailure::Gate(reason)) => {
                warn!(reason = %reason, "features artifact failed the schema gate");
                return Ok(ValidationOutcome::invalid(reason));
            }
            Err(ValidationFailure::Fatal(e)) => return Err(e),
        };

        let patterns = match self.parse_patterns(&output_dir.join(PATTERNS_FILE), &feature_addresses)
        {
            Ok(patterns) => patterns,
            Err(ValidationFailure::Gate(reason)) => {
                warn!(reason = %reason, "patterns artifact failed the schema gate");
                return Ok(ValidationOutcome::invalid(reason));
            }
            Err(ValidationFailure::Fatal(e)) => return Err(e),
        };

        debug!(
            addresses = feature_addresses.len(),
            patterns = patterns.len(),
            "output artifacts validated"
        );
        Ok(ValidationOutcome {
            features_valid: true,
            invalid_reason: None,
            patterns,
        })
    }

    /// Feature gate: declared columns present with correct element types,
    /// non-empty table, non-null and duplicate-free primary keys. Returns the
    /// primary-key set for the pattern cross-check.
    fn validate_features(
        &self,
        path: &Path,
    ) -> std::result::Result<HashSet<String>, ValidationFailure> {
        let mut reader = gate_reader(path)?;

        let headers = reader
            .headers()
            .map_err(|e| ValidationFailure::Gate(format!("unreadable features header: {e}")))?
            .clone();

        let column_index = |name: &str| headers.iter().position(|h| h == name);

        let Some(pk_idx) = column_index(FeatureSchema::PRIMARY_KEY) else {
            return Err(ValidationFailure::Gate(
                "features missing 'address' column".to_string(),
            ));
        };

        let mut declared_indices = Vec::with_capacity(self.schema.columns.len());
        for (name, kind) in self.schema.declared() {
            match column_index(name) {
                Some(idx) => declared_indices.push((name.to_string(), kind, idx)),
                None => {
                    return Err(ValidationFailure::Gate(format!(
                        "features missing declared column '{name}'"
                    )))
                }
            }
        }

        let mut addresses = HashSet::new();
        for (row_number, record) in reader.records().enumerate() {
            let record = record
                .map_err(|e| ValidationFailure::Gate(format!("malformed features row: {e}")))?;

            let address = record.get(pk_idx).unwrap_or("").trim();
            if address.is_empty() {
                return Err(ValidationFailure::Gate(format!(
                    "null primary key at features row {}",
                    row_number + 1
                )));
            }
            if !addresses.insert(address.to_string()) {
                return Err(ValidationFailure::Gate(format!(
                    "duplicate primary key '{address}'"
                )));
            }

            for (name, kind, idx) in &declared_indices {
                let raw = record.get(*idx).unwrap_or("");
                if !kind.accepts(raw) {
                    return Err(ValidationFailure::Gate(format!(
                        "column '{name}' has non-{kind:?} value '{raw}' at row {}",
                        row_number + 1
                    )));
                }
            }
        }

        if addresses.is_empty() {
            return Err(ValidationFailure::Gate("features table is empty".to_string()));
        }

        Ok(addresses)
    }

    /// Parse pattern rows. The file itself must exist and be readable CSV
    /// with the required columns; individual rows degrade to structurally
    /// invalid instead of failing the gate.
    fn parse_patterns(
        &self,
        path: &Path,
        feature_addresses: &HashSet<String>,
    ) -> std::result::Result<Vec<ReportedPattern>, ValidationFailure> {
        let mut reader = gate_reader(path)?;

        let headers = reader
            .headers()
            .map_err(|e| ValidationFailure::Gate(format!("unreadable patterns header: {e}")))?
            .clone();
        let column_index = |name: &str| headers.iter().position(|h| h == name);

        let (Some(id_idx), Some(type_idx), Some(path_idx)) = (
            column_index("pattern_id"),
            column_index("pattern_type"),
            column_index("address_path"),
        ) else {
            return Err(ValidationFailure::Gate(
                "patterns missing required columns (pattern_id, pattern_type, address_path)"
                    .to_string(),
            ));
        };
        let hops_idx = column_index("hop_timestamps");

        let mut patterns = Vec::new();
        for record in reader.records() {
            let record = record
                .map_err(|e| ValidationFailure::Gate(format!("malformed patterns row: {e}")))?;

            let pattern_id = record.get(id_idx).unwrap_or("").trim().to_string();
            let pattern_type = record
                .get(type_idx)
                .unwrap_or("")
                .trim()
                .parse::<PatternType>()
                .ok();
            let address_path = split_list(record.get(path_idx).unwrap_or(""));

            let hop_timestamps = hops_idx
                .and_then(|idx| record.get(idx))
                .filter(|raw| !raw.trim().is_empty())
                .map(|raw| {
                    split_list(raw)
                        .iter()
                        .map(|s| s.parse::<i64>())
                        .collect::<std::result::Result<Vec<i64>, _>>()
                });

            // hop_timestamps, when present, must parse and have exactly one
            // entry per hop.
            let (hop_timestamps, hops_ok) = match hop_timestamps {
                None => (None, true),
                Some(Ok(times)) => {
                    let ok = times.len() + 1 == address_path.len();
                    (Some(times), ok)
                }
                Some(Err(_)) => (None, false),
            };

            let structurally_valid = !pattern_id.is_empty()
                && pattern_type.is_some()
                && address_path.len() >= 2
                && hops_ok
                && address_path
                    .iter()
                    .all(|addr| feature_addresses.contains(addr));

            patterns.push(ReportedPattern {
                pattern_id,
                pattern_type,
                address_path,
                hop_timestamps,
                structurally_valid,
            });
        }

        Ok(patterns)
    }
}

enum ValidationFailure {
    /// Output fails the schema gate; the run scores zero.
    Gate(String),
    /// Host-side problem unrelated to the payload's output.
    Fatal(ScoringError),
}

fn gate_reader(path: &Path) -> std::result::Result<csv::Reader<std::fs::File>, ValidationFailure> {
    match csv_reader(path) {
        Ok(reader) => Ok(reader),
        Err(ScoringError::ArtifactMissing(p)) => Err(ValidationFailure::Gate(format!(
            "required artifact missing: {}",
            p.display()
        ))),
        Err(ScoringError::Csv { path, source }) => Err(ValidationFailure::Gate(format!(
            "unreadable csv {}: {source}",
            path.display()
        ))),
        Err(e) => Err(ValidationFailure::Fatal(e)),
    }
}
