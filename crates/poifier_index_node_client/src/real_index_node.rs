use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use graphql_client::Response;
use poifier_common_types::{BlockHash, Network, PoiBytes};
use prometheus::IntCounterVec;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::*;
use url::Url;

use crate::{IndexNodeClient, IndexingStatus, PoiRequest, SubgraphHealth};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

mod queries {
    pub const INDEXING_STATUSES: &str = include_str!("queries/indexing_statuses.graphql");
    pub const BLOCK_HASH_FROM_NUMBER: &str =
        include_str!("queries/block_hash_from_number.graphql");
    pub const PROOF_OF_INDEXING: &str = include_str!("queries/proof_of_indexing.graphql");
}

/// An [`IndexNodeClient`] that talks to a real `graph-node` over HTTP.
#[derive(Debug, Clone)]
pub struct RealIndexNode {
    endpoint: Url,
    timeout: Duration,
    client: reqwest::Client,
    // Metrics
    // -------
    requests: IntCounterVec,
}

impl RealIndexNode {
    /// Creates a new [`RealIndexNode`] for the given status endpoint, e.g.
    /// `http://index-node-0:8030/graphql`. `requests` must have the labels
    /// `query` and `success`.
    pub fn new(endpoint: Url, requests: IntCounterVec) -> Self {
        Self {
            endpoint,
            timeout: DEFAULT_TIMEOUT,
            client: reqwest::Client::new(),
            requests,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sends a GraphQL query and returns its `data`. `errors` and `data` are
    /// treated as mutually exclusive: any error in the response fails the
    /// whole query.
    async fn graphql_query<O: DeserializeOwned>(
        &self,
        label: &'static str,
        query: &str,
        variables: serde_json::Value,
    ) -> anyhow::Result<O> {
        let result = self.send_query(query, variables).await;
        let success = if result.is_ok() { "1" } else { "0" };
        self.requests.with_label_values(&[label, success]).inc();
        result.with_context(|| format!("`{}` query to {} failed", label, self.endpoint))
    }

    async fn send_query<O: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> anyhow::Result<O> {
        let request = GraphqlRequest { query, variables };

        trace!(endpoint = %self.endpoint, timeout = ?self.timeout, "Sending GraphQL request");

        let response: Response<O> = self
            .client
            .post(self.endpoint.clone())
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(errors) = response.errors.filter(|errors| !errors.is_empty()) {
            let errors = errors
                .iter()
                .map(|e| e.message.clone())
                .collect::<Vec<_>>()
                .join(", ");
            warn!(endpoint = %self.endpoint, %errors, "Index node returned errors");
            return Err(anyhow!("index node returned errors: {}", errors));
        }

        response
            .data
            .ok_or_else(|| anyhow!("index node response has neither data nor errors"))
    }
}

#[async_trait]
impl IndexNodeClient for RealIndexNode {
    fn name(&self) -> Cow<str> {
        Cow::Owned(self.endpoint.to_string())
    }

    async fn indexing_statuses(self: Arc<Self>) -> anyhow::Result<Vec<IndexingStatus>> {
        let data: gql_types::IndexingStatusesData = self
            .graphql_query("indexing_statuses", queries::INDEXING_STATUSES, json!({}))
            .await?;

        let mut statuses = vec![];
        for raw_status in data.indexing_statuses {
            let deployment = raw_status.subgraph.clone();
            let health = raw_status.health;

            // Deployments that haven't started indexing have no chain status.
            if raw_status.chains.is_empty() {
                warn!(
                    endpoint = %self.endpoint,
                    %deployment,
                    "Deployment has no chain status, skipping it"
                );
                continue;
            }

            match IndexingStatus::try_from(raw_status) {
                Ok(status) => statuses.push(status),
                // Dropping a healthy deployment would silently under-report.
                Err(e) if health == SubgraphHealth::Healthy => {
                    return Err(e.context(format!(
                        "invalid indexing status for healthy deployment {}",
                        deployment
                    )));
                }
                Err(e) => debug!(
                    endpoint = %self.endpoint,
                    %deployment,
                    %health,
                    error = %e,
                    "Failed to parse indexing status of deployment that isn't healthy, skipping it"
                ),
            }
        }

        Ok(statuses)
    }

    async fn block_hash(
        self: Arc<Self>,
        network: &Network,
        block_number: u64,
    ) -> anyhow::Result<Option<BlockHash>> {
        let variables = json!({
            "network": network.as_str(),
            "blockNumber": gql_types::block_number_to_int(block_number)?,
        });
        let data: gql_types::BlockHashData = self
            .graphql_query("block_hash", queries::BLOCK_HASH_FROM_NUMBER, variables)
            .await?;

        data.block_hash_from_number
            .as_deref()
            .map(gql_types::parse_bytes::<Vec<u8>>)
            .transpose()
    }

    async fn proof_of_indexing(
        self: Arc<Self>,
        request: PoiRequest,
    ) -> anyhow::Result<Option<PoiBytes>> {
        let variables = json!({
            "subgraph": request.deployment.to_string(),
            "blockNumber": gql_types::block_number_to_int(request.block_number)?,
            "blockHash": request.block_hash,
            "indexer": request.indexer,
        });
        let data: gql_types::ProofOfIndexingData = self
            .graphql_query("proof_of_indexing", queries::PROOF_OF_INDEXING, variables)
            .await?;

        match data.proof_of_indexing.as_deref() {
            None | Some("") | Some("0x") => Ok(None),
            Some(poi) => gql_types::parse_bytes::<[u8; 32]>(poi).map(Some),
        }
    }
}

#[derive(Serialize)]
struct GraphqlRequest<'a> {
    query: &'a str,
    variables: serde_json::Value,
}

mod gql_types {
    use std::str::FromStr;

    use poifier_common_types::HexString;
    use serde::Deserialize;

    use super::*;
    use crate::BlockPointer;

    /// `BigInt` scalars are encoded as decimal strings.
    pub fn parse_big_int(s: &str) -> anyhow::Result<u64> {
        s.parse()
            .with_context(|| format!("invalid BigInt value {:?}", s))
    }

    /// `Bytes` scalars are encoded as `0x`-prefixed hex strings.
    pub fn parse_bytes<T>(s: &str) -> anyhow::Result<HexString<T>>
    where
        HexString<T>: FromStr<Err = String>,
    {
        HexString::<T>::from_str(s).map_err(|e| anyhow!(e))
    }

    /// GraphQL `Int` is a signed 32-bit integer.
    pub fn block_number_to_int(block_number: u64) -> anyhow::Result<i32> {
        i32::try_from(block_number)
            .with_context(|| format!("block number {} doesn't fit in a GraphQL Int", block_number))
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct IndexingStatusesData {
        pub indexing_statuses: Vec<RawIndexingStatus>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct RawIndexingStatus {
        pub subgraph: String,
        pub health: SubgraphHealth,
        pub chains: Vec<RawChainStatus>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct RawChainStatus {
        pub network: String,
        pub latest_block: Option<RawBlock>,
    }

    #[derive(Debug, Deserialize)]
    pub struct RawBlock {
        pub number: String,
        pub hash: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct BlockHashData {
        pub block_hash_from_number: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ProofOfIndexingData {
        pub proof_of_indexing: Option<String>,
    }

    impl TryFrom<RawIndexingStatus> for IndexingStatus {
        type Error = anyhow::Error;

        fn try_from(raw: RawIndexingStatus) -> Result<Self, Self::Error> {
            // Subgraph deployments index exactly one chain.
            let chain = raw
                .chains
                .first()
                .ok_or_else(|| anyhow!("chain status missing"))?;

            let latest_block = chain
                .latest_block
                .as_ref()
                .map(|block| -> anyhow::Result<BlockPointer> {
                    Ok(BlockPointer {
                        number: parse_big_int(&block.number)?,
                        hash: block
                            .hash
                            .as_deref()
                            .map(parse_bytes::<Vec<u8>>)
                            .transpose()?,
                    })
                })
                .transpose()?;

            Ok(IndexingStatus {
                deployment: raw.subgraph.parse()?,
                health: raw.health,
                network: chain.network.parse()?,
                latest_block,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::gql_types::*;
    use super::*;
    use crate::SubgraphHealth;

    #[test]
    fn parse_indexing_statuses_response() {
        let data: IndexingStatusesData = serde_json::from_value(json!({
            "indexingStatuses": [
                {
                    "subgraph": "QmNY7gDNXHECV8SXoEY7hbfg4BX1aDMxTBDiFuG4huaSGA",
                    "health": "healthy",
                    "chains": [{
                        "network": "mainnet",
                        "latestBlock": { "number": "12345678", "hash": "0xabcd" }
                    }]
                },
                {
                    "subgraph": "QmeYTH2fK2wv96XvnCGH2eyKFE8kmRfo53zYVy5dKysZtH",
                    "health": "failed",
                    "chains": [{ "network": "gnosis", "latestBlock": null }]
                }
            ]
        }))
        .unwrap();

        let statuses = data
            .indexing_statuses
            .into_iter()
            .map(IndexingStatus::try_from)
            .collect::<anyhow::Result<Vec<_>>>()
            .unwrap();

        assert_eq!(statuses[0].health, SubgraphHealth::Healthy);
        assert_eq!(statuses[0].network.as_str(), "mainnet");
        let latest_block = statuses[0].latest_block.as_ref().unwrap();
        assert_eq!(latest_block.number, 12345678);
        assert_eq!(latest_block.hash.as_ref().unwrap().to_string(), "0xabcd");

        assert_eq!(statuses[1].health, SubgraphHealth::Failed);
        assert_eq!(statuses[1].latest_block, None);
    }

    #[test]
    fn unknown_health_values_are_not_healthy() {
        let health: SubgraphHealth = serde_json::from_value(json!("degraded")).unwrap();
        assert_eq!(health, SubgraphHealth::Unknown);
    }

    #[test]
    fn missing_chain_is_an_error() {
        let raw: RawIndexingStatus = serde_json::from_value(json!({
            "subgraph": "QmNY7gDNXHECV8SXoEY7hbfg4BX1aDMxTBDiFuG4huaSGA",
            "health": "healthy",
            "chains": []
        }))
        .unwrap();

        assert!(IndexingStatus::try_from(raw).is_err());
    }

    #[test]
    fn block_numbers_must_fit_graphql_int() {
        assert_eq!(block_number_to_int(12345000).unwrap(), 12345000);
        assert!(block_number_to_int(u64::from(u32::MAX)).is_err());
    }
}
