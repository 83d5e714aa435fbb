use crate::error::{DatasetError, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// One row of `ground_truth.csv`: a member address of one injected pattern
/// instance. Pattern instances span multiple rows.
#[derive(Debug, Clone, Deserialize)]
pub struct GroundTruthRow {
    pub pattern_id: String,
    pub pattern_type: String,
    pub address: String,
}

/// The validator-only known-answer key for one dataset. Identity of a
/// reported pattern is literal `pattern_id` match against `ids`.
#[derive(Debug, Clone, Default)]
pub struct GroundTruth {
    ids: HashSet<String>,
}

impl GroundTruth {
    pub fn from_rows(rows: impl IntoIterator<Item = GroundTruthRow>) -> Self {
        let mut ids = HashSet::new();
        for row in rows {
            ids.insert(row.pattern_id);
        }
        Self { ids }
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(DatasetError::ArtifactMissing(path.to_path_buf()));
        }
        let mut reader = csv::Reader::from_path(path).map_err(|source| DatasetError::Csv {
            path: path.to_path_buf(),
            source,
        })?;

        let mut rows = Vec::new();
        for record in reader.deserialize::<GroundTruthRow>() {
            rows.push(record.map_err(|source| DatasetError::Csv {
                path: path.to_path_buf(),
                source,
            })?);
        }

        let gt = Self::from_rows(rows);
        info!(
            path = %path.display(),
            pattern_instances = gt.ids.len(),
            "ground truth loaded"
        );
        Ok(gt)
    }

    /// |ground_truth_ids|, the `E` of the scoring formulas.
    pub fn expected_count(&self) -> u32 {
        self.ids.len() as u32
    }

    pub fn contains(&self, pattern_id: &str) -> bool {
        self.ids.contains(pattern_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_distinct_ids_counted_once() {
        let rows = vec![
            GroundTruthRow {
                pattern_id: "gt-1".into(),
                pattern_type: "cycle".into(),
                address: "a".into(),
            },
            GroundTruthRow {
                pattern_id: "gt-1".into(),
                pattern_type: "cycle".into(),
                address: "b".into(),
            },
            GroundTruthRow {
                pattern_id: "gt-2".into(),
                pattern_type: "layering_path".into(),
                address: "c".into(),
            },
        ];
        let gt = GroundTruth::from_rows(rows);
        assert_eq!(gt.expected_count(), 2);
        assert!(gt.contains("gt-1"));
        assert!(!gt.contains("gt-3"));
    }

    #[test]
    fn test_load_from_csv() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("ground_truth.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "pattern_id,pattern_type,address").unwrap();
        writeln!(f, "gt-1,cycle,a").unwrap();
        writeln!(f, "gt-1,cycle,b").unwrap();

        let gt = GroundTruth::load(&path).unwrap();
        assert_eq!(gt.expected_count(), 1);
    }
}
