//! A client for the epoch block oracle subgraph, which records, for every
//! network supported by The Graph, the block number at which each epoch
//! started.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use prometheus::IntCounterVec;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::*;
use url::Url;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Source of epoch start blocks, keyed by CAIP-2 chain ID.
#[async_trait]
pub trait EpochOracle: Send + Sync + Debug {
    /// Returns up to `count` of the most recent epochs for every network the
    /// oracle knows about, most recent epoch first.
    async fn latest_epochs(self: Arc<Self>, count: u32) -> anyhow::Result<Vec<NetworkEpochs>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkEpochs {
    /// The CAIP-2 chain ID of the network, e.g. `eip155:1`.
    pub caip2: String,
    /// Ordered by descending epoch number.
    pub epochs: Vec<EpochBlock>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EpochBlock {
    pub epoch_number: u64,
    pub block_number: u64,
}

/// A GraphQL client for the epoch block oracle subgraph.
#[derive(Debug, Clone)]
pub struct EpochOracleClient {
    endpoint: Url,
    timeout: Duration,
    client: reqwest::Client,
    // Metrics
    // -------
    requests: IntCounterVec,
}

impl EpochOracleClient {
    /// Creates a new [`EpochOracleClient`] with the given endpoint.
    /// `requests` must have a single `success` label.
    pub fn new(endpoint: Url, requests: IntCounterVec) -> Self {
        Self {
            endpoint,
            timeout: DEFAULT_TIMEOUT,
            client: reqwest::Client::new(),
            requests,
        }
    }

    /// Sets the timeout for requests to the epoch oracle subgraph.
    ///
    /// The default timeout is 30 seconds.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// A wrapper around [`EpochOracleClient::graphql_query`] that requires
    /// no errors in the response, and deserializes the response data into the
    /// given type.
    async fn graphql_query_no_errors<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
        err_msg: &str,
    ) -> anyhow::Result<T> {
        let response = self.graphql_query(query, variables).await?;
        let errors = response.errors.unwrap_or_default();
        if !errors.is_empty() {
            return Err(anyhow!(
                "{}: {}",
                err_msg,
                serde_json::to_string(&errors).unwrap_or_else(|_| format!("{:?}", errors))
            ));
        }

        let data = response
            .data
            .ok_or_else(|| anyhow!("{}: response has no data", err_msg))?;
        serde_json::from_value(data).with_context(|| format!("{}: unexpected data", err_msg))
    }

    /// Sends a generic GraphQL query to the epoch oracle subgraph.
    pub async fn graphql_query(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> anyhow::Result<GraphqlResponse> {
        let request = GraphqlRequest { query, variables };

        trace!(timeout = ?self.timeout, endpoint = %self.endpoint, "Sending GraphQL request");

        Ok(self
            .client
            .post(self.endpoint.as_str())
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }
}

#[async_trait]
impl EpochOracle for EpochOracleClient {
    async fn latest_epochs(self: Arc<Self>, count: u32) -> anyhow::Result<Vec<NetworkEpochs>> {
        let result = self
            .graphql_query_no_errors::<LatestEpochBlocksData>(
                queries::LATEST_EPOCH_BLOCKS,
                json!({ "first": count }),
                "error(s) querying latest epoch blocks from the epoch oracle",
            )
            .await
            .and_then(|data| {
                data.networks
                    .into_iter()
                    .map(NetworkEpochs::try_from)
                    .collect::<anyhow::Result<Vec<_>>>()
            });

        let success = if result.is_ok() { "1" } else { "0" };
        self.requests.with_label_values(&[success]).inc();

        let networks = result?;
        debug!(
            endpoint = %self.endpoint,
            networks = networks.len(),
            "Received latest epoch blocks"
        );
        Ok(networks)
    }
}

#[derive(Serialize)]
struct GraphqlRequest<'a> {
    query: &'a str,
    variables: serde_json::Value,
}

/// A generic GraphQL response.
#[derive(Deserialize)]
pub struct GraphqlResponse {
    /// The response data.
    pub data: Option<serde_json::Value>,
    /// The response error data.
    pub errors: Option<Vec<serde_json::Value>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LatestEpochBlocksData {
    networks: Vec<RawNetwork>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNetwork {
    id: String,
    block_numbers: Vec<RawEpochBlock>,
}

/// `BigInt` values arrive as decimal strings.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEpochBlock {
    epoch_number: String,
    block_number: String,
}

impl TryFrom<RawNetwork> for NetworkEpochs {
    type Error = anyhow::Error;

    fn try_from(raw: RawNetwork) -> Result<Self, Self::Error> {
        let mut epochs = raw
            .block_numbers
            .into_iter()
            .map(|raw_epoch| -> anyhow::Result<EpochBlock> {
                Ok(EpochBlock {
                    epoch_number: raw_epoch.epoch_number.parse().with_context(|| {
                        format!("invalid epoch number {:?}", raw_epoch.epoch_number)
                    })?,
                    block_number: raw_epoch.block_number.parse().with_context(|| {
                        format!("invalid block number {:?}", raw_epoch.block_number)
                    })?,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()
            .with_context(|| format!("bad epoch data for network {}", raw.id))?;

        // The query already asks for this order; don't rely on it.
        epochs.sort_by(|a, b| b.epoch_number.cmp(&a.epoch_number));

        Ok(NetworkEpochs {
            caip2: raw.id,
            epochs,
        })
    }
}

mod queries {
    pub const LATEST_EPOCH_BLOCKS: &str = include_str!("queries/latest_epoch_blocks.graphql");
}
