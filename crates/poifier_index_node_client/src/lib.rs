mod real_index_node;

use std::borrow::Cow;
use std::fmt::{self, Debug};
use std::sync::Arc;

use async_trait::async_trait;
use poifier_common_types::{BlockHash, IndexerAddress, IpfsCid, Network, PoiBytes};
pub use real_index_node::RealIndexNode;
use serde::Deserialize;

/// A `graph-node` index node, queried through its status GraphQL API.
#[async_trait]
pub trait IndexNodeClient: Send + Sync + Debug {
    /// Human-readable identifier of this index node, used for logging and
    /// metrics.
    fn name(&self) -> Cow<str>;

    /// Returns the indexing status of every subgraph deployment on this index
    /// node. Deployments without a chain status are skipped, as are
    /// unparsable statuses of deployments that aren't healthy. An unparsable
    /// status of a healthy deployment fails the whole query.
    async fn indexing_statuses(self: Arc<Self>) -> anyhow::Result<Vec<IndexingStatus>>;

    /// Looks up the canonical hash of the block with the given number on the
    /// given network. `Ok(None)` means the index node doesn't know the block.
    async fn block_hash(
        self: Arc<Self>,
        network: &Network,
        block_number: u64,
    ) -> anyhow::Result<Option<BlockHash>>;

    /// Requests a proof of indexing. `Ok(None)` means the deployment has no
    /// PoI at that block, e.g. because it hasn't indexed that far yet.
    async fn proof_of_indexing(self: Arc<Self>, request: PoiRequest)
        -> anyhow::Result<Option<PoiBytes>>;
}

/// The health of a subgraph deployment, as reported by `graph-node`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SubgraphHealth {
    Healthy,
    Unhealthy,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockPointer {
    pub number: u64,
    pub hash: Option<BlockHash>,
}

impl fmt::Display for BlockPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} ({})",
            self.number,
            self.hash
                .as_ref()
                .map_or("no hash".to_string(), |hash| hash.to_string())
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexingStatus {
    pub deployment: IpfsCid,
    pub health: SubgraphHealth,
    pub network: Network,
    /// The latest block the deployment has processed, if it has started
    /// indexing at all.
    pub latest_block: Option<BlockPointer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoiRequest {
    pub deployment: IpfsCid,
    pub block_number: u64,
    pub block_hash: BlockHash,
    /// The indexer identity the PoI is computed for.
    pub indexer: IndexerAddress,
}
