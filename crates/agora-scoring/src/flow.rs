use crate::artifacts::ReportedPattern;
use agora_dataset::TransferIndex;

/// Traces claimed pattern paths against the dataset's transfer table.
///
/// For an address path `[a0, a1, ..., ak]`, flows exist iff every adjacent
/// directed pair has at least one transfer. Direction is significant;
/// multiplicity is irrelevant. When the pattern carries hop timestamps, each
/// claimed time must additionally match an actual transfer on its hop and the
/// sequence must be non-decreasing.
pub struct FlowVerifier<'a> {
    index: &'a TransferIndex,
}

impl<'a> FlowVerifier<'a> {
    pub fn new(index: &'a TransferIndex) -> Self {
        Self { index }
    }

    pub fn flows_exist(&self, pattern: &ReportedPattern) -> bool {
        if !pattern.structurally_valid || pattern.address_path.len() < 2 {
            return false;
        }

        let hops = pattern.address_path.windows(2);

        match &pattern.hop_timestamps {
            None => hops
                .into_iter()
                .all(|pair| self.index.edge_exists(&pair[0], &pair[1])),
            Some(times) => {
                let mut previous = i64::MIN;
                for (pair, &claimed) in hops.zip(times.iter()) {
                    if claimed < previous {
                        return false;
                    }
                    let edge_times = self.index.edge_times(&pair[0], &pair[1]);
                    if edge_times.binary_search(&claimed).is_err() {
                        return false;
                    }
                    previous = claimed;
                }
                true
            }
        }
    }
}
