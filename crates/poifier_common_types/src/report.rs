use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{IpfsCid, PoiBytes};

/// A single reference PoI, as uploaded to the POIfier server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRecord {
    pub dataset_id: IpfsCid,
    pub block_number: u64,
    /// Only present for records sampled at an epoch start block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epoch_number: Option<u64>,
    pub poi_value: PoiBytes,
}

impl fmt::Display for ReportRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.dataset_id, self.block_number)?;
        if let Some(epoch) = self.epoch_number {
            write!(f, " (epoch {})", epoch)?;
        }
        write!(f, ": {}", self.poi_value)
    }
}

/// All reference PoIs collected during one cycle. Serializes as a plain JSON
/// array of [`ReportRecord`]s, which is the upload body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Report {
    records: Vec<ReportRecord>,
}

impl Report {
    pub fn new(records: Vec<ReportRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[ReportRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn summary(&self) -> ReportSummary {
        let distinct_dataset_count = self
            .records
            .iter()
            .map(|record| &record.dataset_id)
            .collect::<HashSet<_>>()
            .len();

        ReportSummary {
            distinct_dataset_count,
            record_count: self.records.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub distinct_dataset_count: usize,
    pub record_count: usize,
}
