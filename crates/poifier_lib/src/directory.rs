use std::sync::Arc;

use poifier_common_types::{IpfsCid, Network};
use poifier_index_node_client::{IndexNodeClient, SubgraphHealth};
use tracing::*;

use crate::error::Stage;
use crate::PoifierError;

/// A healthy subgraph deployment that reference PoIs are collected for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    pub id: IpfsCid,
    pub network: Network,
    /// The latest block the deployment has processed.
    pub head_block: u64,
}

/// Lists all healthy deployments on the index node. Failing to list them is an
/// error rather than an empty list, since an incomplete list would silently
/// under-report.
#[instrument(skip_all)]
pub async fn list_healthy_datasets(
    index_node: Arc<dyn IndexNodeClient>,
) -> Result<Vec<Dataset>, PoifierError> {
    info!(index_node = %index_node.name(), "Querying indexing statuses");

    let statuses = index_node
        .clone()
        .indexing_statuses()
        .await
        .map_err(PoifierError::upstream(Stage::DatasetDirectory))?;

    let total = statuses.len();
    let mut datasets = vec![];
    for status in statuses {
        if status.health != SubgraphHealth::Healthy {
            debug!(
                deployment = %status.deployment,
                health = %status.health,
                "Skipping deployment that isn't healthy"
            );
            continue;
        }

        let Some(latest_block) = status.latest_block else {
            warn!(
                deployment = %status.deployment,
                network = %status.network,
                "Skipping deployment that hasn't started indexing yet"
            );
            continue;
        };

        datasets.push(Dataset {
            id: status.deployment,
            network: status.network,
            head_block: latest_block.number,
        });
    }

    info!(
        deployments = total,
        healthy = datasets.len(),
        "Finished querying indexing statuses"
    );

    Ok(datasets)
}
