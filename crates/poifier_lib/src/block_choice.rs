use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Decides which head block height a network's block samples are derived
/// from, given the head blocks of all healthy datasets on that network.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum BlockChoicePolicy {
    // Use the most advanced head, approximating the chain head. Datasets that
    // lag behind simply have no PoI for the newest samples.
    #[default]
    Latest,
    // Use the least advanced head, so that every dataset can answer every
    // block sample.
    Earliest,
}

impl BlockChoicePolicy {
    pub fn choose_head(&self, heads: impl Iterator<Item = u64>) -> Option<u64> {
        match self {
            BlockChoicePolicy::Latest => heads.max(),
            BlockChoicePolicy::Earliest => heads.min(),
        }
    }
}
