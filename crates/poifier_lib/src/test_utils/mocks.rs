use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;
use poifier_common_types::{BlockHash, IpfsCid, Network, PoiBytes};
use poifier_epoch_oracle_client::{EpochOracle, NetworkEpochs};
use poifier_index_node_client::{IndexNodeClient, IndexingStatus, PoiRequest};

/// An in-memory index node. Blocks and PoIs that aren't in the maps are
/// reported as unknown.
#[derive(Debug, Default)]
pub struct MockIndexNode {
    pub statuses: Vec<IndexingStatus>,
    pub block_hashes: HashMap<(Network, u64), BlockHash>,
    pub pois: HashMap<(IpfsCid, u64), PoiBytes>,
    pub fail_indexing_statuses: bool,
    pub fail_pois: bool,

    // Call tracking
    // -------------
    pub indexing_statuses_calls: AtomicUsize,
    pub block_hash_calls: AtomicUsize,
    pub poi_requests: Mutex<Vec<PoiRequest>>,
}

#[async_trait]
impl IndexNodeClient for MockIndexNode {
    fn name(&self) -> Cow<str> {
        Cow::Borrowed("mock-index-node")
    }

    async fn indexing_statuses(self: Arc<Self>) -> anyhow::Result<Vec<IndexingStatus>> {
        self.indexing_statuses_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_indexing_statuses {
            Err(anyhow!("boo"))
        } else {
            Ok(self.statuses.clone())
        }
    }

    async fn block_hash(
        self: Arc<Self>,
        network: &Network,
        block_number: u64,
    ) -> anyhow::Result<Option<BlockHash>> {
        self.block_hash_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .block_hashes
            .get(&(network.clone(), block_number))
            .cloned())
    }

    async fn proof_of_indexing(
        self: Arc<Self>,
        request: PoiRequest,
    ) -> anyhow::Result<Option<PoiBytes>> {
        if self.fail_pois {
            return Err(anyhow!("boo"));
        }

        let poi = self
            .pois
            .get(&(request.deployment.clone(), request.block_number))
            .copied();
        self.poi_requests
            .lock()
            .map_err(|_| anyhow!("poisoned"))?
            .push(request);
        Ok(poi)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockEpochOracle {
    pub networks: Vec<NetworkEpochs>,
    pub fail: bool,
}

#[async_trait]
impl EpochOracle for MockEpochOracle {
    async fn latest_epochs(self: Arc<Self>, count: u32) -> anyhow::Result<Vec<NetworkEpochs>> {
        if self.fail {
            return Err(anyhow!("boo"));
        }

        Ok(self
            .networks
            .iter()
            .map(|network| NetworkEpochs {
                caip2: network.caip2.clone(),
                epochs: network.epochs.iter().take(count as usize).copied().collect(),
            })
            .collect())
    }
}
