use std::sync::Arc;

use poifier_common_types::{PoiBytes, REFERENCE_INDEXER};
use poifier_index_node_client::{IndexNodeClient, PoiRequest};
use tracing::*;

use crate::block_hashes::ResolvedPoint;
use crate::directory::Dataset;
use crate::error::Stage;
use crate::PoifierError;

/// Queries reference PoIs, i.e. PoIs computed on behalf of the zero indexer
/// address, so that reports from different indexers are directly comparable.
#[derive(Debug, Clone)]
pub struct PoiFetcher {
    index_node: Arc<dyn IndexNodeClient>,
}

impl PoiFetcher {
    pub fn new(index_node: Arc<dyn IndexNodeClient>) -> Self {
        Self { index_node }
    }

    /// Returns `Ok(None)` when the deployment has no PoI at this block, which
    /// is common for deployments that haven't caught up yet.
    pub async fn fetch(
        &self,
        dataset: &Dataset,
        point: &ResolvedPoint,
    ) -> Result<Option<PoiBytes>, PoifierError> {
        let request = PoiRequest {
            deployment: dataset.id.clone(),
            block_number: point.point.block_number,
            block_hash: point.block_hash.clone(),
            indexer: REFERENCE_INDEXER,
        };

        trace!(
            deployment = %request.deployment,
            block_number = request.block_number,
            block_hash = %request.block_hash,
            "Querying proof of indexing"
        );

        let poi = self
            .index_node
            .clone()
            .proof_of_indexing(request)
            .await
            .map_err(PoifierError::upstream(Stage::ProofsOfIndexing))?;

        match &poi {
            Some(poi) => debug!(
                deployment = %dataset.id,
                reference_point = %point.point,
                %poi,
                "Got proof of indexing"
            ),
            None => info!(
                deployment = %dataset.id,
                reference_point = %point.point,
                "No proof of indexing available"
            ),
        }

        Ok(poi)
    }
}
