use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use poifier_common_types::{BlockHash, Network};
use poifier_index_node_client::IndexNodeClient;
use tracing::*;

use crate::error::Stage;
use crate::ranges::ReferencePoint;
use crate::PoifierError;

/// A [`ReferencePoint`] together with the hash of its block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPoint {
    pub point: ReferencePoint,
    pub block_hash: BlockHash,
}

/// Resolves block numbers to hashes through the index node, querying every
/// `(network, block)` pair at most once. Meant to live for a single cycle.
#[derive(Debug)]
pub struct BlockHashResolver {
    index_node: Arc<dyn IndexNodeClient>,
    cache: HashMap<(Network, u64), BlockHash>,
}

impl BlockHashResolver {
    pub fn new(index_node: Arc<dyn IndexNodeClient>) -> Self {
        Self {
            index_node,
            cache: HashMap::new(),
        }
    }

    /// Returns the hash of `block_number` on `network`. A block the index node
    /// doesn't know is an error: there's no hash to fall back to.
    pub async fn resolve(
        &mut self,
        network: &Network,
        block_number: u64,
    ) -> Result<BlockHash, PoifierError> {
        let key = (network.clone(), block_number);
        if let Some(hash) = self.cache.get(&key) {
            return Ok(hash.clone());
        }

        let hash = self
            .index_node
            .clone()
            .block_hash(network, block_number)
            .await
            .and_then(|hash| match hash {
                Some(hash) if !hash.is_empty() => Ok(hash),
                _ => Err(anyhow!(
                    "index node has no hash for block #{} on {}",
                    block_number,
                    network
                )),
            })
            .map_err(PoifierError::upstream(Stage::BlockHashes))?;

        trace!(%network, block_number, block_hash = %hash, "Resolved block hash");
        self.cache.insert(key, hash.clone());
        Ok(hash)
    }

    #[instrument(skip_all)]
    pub async fn resolve_points(
        &mut self,
        points: impl IntoIterator<Item = ReferencePoint>,
    ) -> Result<Vec<ResolvedPoint>, PoifierError> {
        let mut resolved = vec![];
        for point in points {
            let block_hash = self.resolve(&point.network, point.block_number).await?;
            resolved.push(ResolvedPoint { point, block_hash });
        }

        debug!(
            points = resolved.len(),
            distinct_blocks = self.cache.len(),
            "Resolved block hashes"
        );
        Ok(resolved)
    }
}
