use crate::error::{DatasetError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// One row of `transfers.csv`.
#[derive(Debug, Clone, Deserialize)]
pub struct TransferRow {
    pub from_address: String,
    pub to_address: String,
    #[serde(default)]
    pub asset: String,
    #[serde(default)]
    pub amount: f64,
    /// Unix seconds.
    pub block_time: i64,
}

/// Directed edge index over a dataset's transfers, built once per dataset:
/// `from -> to -> sorted block times`. Per-hop membership checks are O(1)
/// expected; memory is proportional to the transfer count.
#[derive(Debug, Default)]
pub struct TransferIndex {
    edges: HashMap<String, HashMap<String, Vec<i64>>>,
    transfer_count: usize,
}

impl TransferIndex {
    pub fn from_rows(rows: impl IntoIterator<Item = TransferRow>) -> Self {
        let mut edges: HashMap<String, HashMap<String, Vec<i64>>> = HashMap::new();
        let mut transfer_count = 0;
        for row in rows {
            edges
                .entry(row.from_address)
                .or_default()
                .entry(row.to_address)
                .or_default()
                .push(row.block_time);
            transfer_count += 1;
        }
        for targets in edges.values_mut() {
            for times in targets.values_mut() {
                times.sort_unstable();
            }
        }
        Self {
            edges,
            transfer_count,
        }
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
        for record in reader.deserialize::<TransferRow>() {
            let row = record.map_err(|source| DatasetError::Csv {
                path: path.to_path_buf(),
                source,
            })?;
            rows.push(row);
        }

        let index = Self::from_rows(rows);
        info!(
            path = %path.display(),
            transfers = index.transfer_count,
            from_addresses = index.edges.len(),
            "transfer index built"
        );
        Ok(index)
    }

    pub fn transfer_count(&self) -> usize {
        self.transfer_count
    }

    /// At least one transfer `from -> to` exists. Direction is significant.
    pub fn edge_exists(&self, from: &str, to: &str) -> bool {
        self.edges
            .get(from)
            .map(|targets| targets.contains_key(to))
            .unwrap_or(false)
    }

    /// Sorted block times of all transfers `from -> to`, empty when the edge
    /// does not exist.
    pub fn edge_times(&self, from: &str, to: &str) -> &[i64] {
        self.edges
            .get(from)
            .and_then(|targets| targets.get(to))
            .map(|times| times.as_slice())
            .unwrap_or(&[])
    }
}
