/*!
# Agora Dataset

Read-only access to known-answer datasets and the on-disk layout shared with
sandboxed payloads.

Datasets are immutable directories keyed by `(network, test_date)`:

```text
{data_root}/{network}/{YYYY-MM-DD}/{window}/
    transfers.csv
    address_labels.csv
    asset_prices.csv
    assets.csv
    ground_truth.csv   # validator-only, never staged into run inputs
```

Run outputs land under `{work_root}/{tournament_id}/{epoch}/{participant}/`.
*/

pub mod error;
pub mod ground_truth;
pub mod layout;
pub mod transfers;

pub use error::DatasetError;
pub use ground_truth::{GroundTruth, GroundTruthRow};
pub use layout::{DatasetLayout, RunDirs, WorkLayout, DEFAULT_WINDOW};
pub use transfers::{TransferIndex, TransferRow};
