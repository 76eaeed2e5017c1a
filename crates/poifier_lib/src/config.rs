//! POIfier configuration parsing and validation.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use poifier_common_types::{IndexerAddress, Network};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::auth::CredentialSource;
use crate::block_choice::BlockChoicePolicy;
use crate::{CliOptions, PoifierError};

/// A string that must never end up in logs, e.g. a token or a mnemonic.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Chain-specific configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
    /// The CAIP-2 chain ID the epoch block oracle uses for this network, e.g.
    /// `eip155:1`. Networks without one get no epoch samples.
    pub caip2: Option<String>,
}

/// A [`serde`]-compatible representation of POIfier's YAML configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// The `graph-node` status endpoint, e.g. `http://index-node-0:8030/graphql`.
    #[serde(default = "Config::default_index_node_endpoint")]
    pub index_node_endpoint: Url,
    /// The epoch block oracle subgraph endpoint.
    pub epoch_oracle_endpoint: Url,
    /// The base URL of the POIfier server. Reports are posted to
    /// `{serverUrl}/api/poi`.
    pub server_url: Url,

    // Credentials: either `token`, or `mnemonic` together with
    // `indexerAddress`.
    // -----------
    #[serde(default)]
    pub token: Option<Secret>,
    #[serde(default)]
    pub mnemonic: Option<Secret>,
    #[serde(default)]
    pub indexer_address: Option<IndexerAddress>,

    // Sampling options
    // ----------------
    /// How many recent 1000-block boundaries and epochs to sample.
    #[serde(default = "Config::default_window_size")]
    pub window_size: u32,
    #[serde(default)]
    pub block_choice_policy: BlockChoicePolicy,
    /// Network name to chain configuration. Doubles as the mapping from the
    /// epoch oracle's CAIP-2 IDs to network names.
    #[serde(default = "Config::default_chains")]
    pub chains: BTreeMap<Network, ChainConfig>,

    // Scheduling and networking
    // -------------------------
    #[serde(default = "Config::default_interval_in_seconds")]
    pub interval_in_seconds: u64,
    #[serde(default = "Config::default_initial_delay_in_seconds")]
    pub initial_delay_in_seconds: u64,
    #[serde(default = "Config::default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    #[serde(default = "Config::default_request_timeout_in_seconds")]
    pub request_timeout_in_seconds: u64,
    /// The port on which the Prometheus exporter should listen. No exporter
    /// is started if unset.
    #[serde(default)]
    pub prometheus_port: Option<u16>,
}

impl Config {
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("can't open config file {}", path.display()))?;
        serde_yaml::from_reader(file).context("invalid config file")
    }

    /// Command-line and environment credentials take precedence over the
    /// ones in the configuration file.
    pub fn apply_cli_overrides(&mut self, cli: &CliOptions) {
        if let Some(token) = &cli.token {
            self.token = Some(Secret::new(token.as_str()));
        }
        if let Some(mnemonic) = &cli.mnemonic {
            self.mnemonic = Some(Secret::new(mnemonic.as_str()));
        }
        if let Some(indexer_address) = cli.indexer_address {
            self.indexer_address = Some(indexer_address);
        }
    }

    /// Checks everything that can be checked without touching the network.
    pub fn validate(&self) -> Result<(), PoifierError> {
        if self.window_size == 0 {
            return Err(PoifierError::config("`windowSize` must be at least 1"));
        }
        if self.max_concurrent_requests == 0 {
            return Err(PoifierError::config(
                "`maxConcurrentRequests` must be at least 1",
            ));
        }
        if self.interval_in_seconds == 0 {
            return Err(PoifierError::config(
                "`intervalInSeconds` must be at least 1",
            ));
        }
        self.credential_source().map(|_| ())
    }

    /// Exactly one of `token` or `mnemonic` + `indexerAddress` must be
    /// configured.
    pub fn credential_source(&self) -> Result<CredentialSource, PoifierError> {
        let token = self.token.as_ref().filter(|t| !t.expose().trim().is_empty());
        let mnemonic = self
            .mnemonic
            .as_ref()
            .filter(|m| !m.expose().trim().is_empty());

        match (token, mnemonic, self.indexer_address) {
            (Some(_), Some(_), _) => Err(PoifierError::config(
                "both `token` and `mnemonic` are set; configure only one of them",
            )),
            (Some(token), None, _) => Ok(CredentialSource::Token(token.clone())),
            (None, Some(mnemonic), Some(indexer_address)) => Ok(CredentialSource::Wallet {
                mnemonic: mnemonic.clone(),
                indexer_address,
            }),
            (None, Some(_), None) => Err(PoifierError::config(
                "`mnemonic` requires `indexerAddress` to be set as well",
            )),
            (None, None, _) => Err(PoifierError::config(
                "no credentials configured; set either `token` or `mnemonic` and `indexerAddress`",
            )),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_in_seconds)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_in_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_in_seconds)
    }

    fn default_index_node_endpoint() -> Url {
        Url::parse("http://index-node-0:8030/graphql").expect("valid default URL")
    }

    fn default_window_size() -> u32 {
        10
    }

    fn default_interval_in_seconds() -> u64 {
        // Every 4 hours.
        14400
    }

    fn default_initial_delay_in_seconds() -> u64 {
        15
    }

    fn default_max_concurrent_requests() -> usize {
        8
    }

    fn default_request_timeout_in_seconds() -> u64 {
        30
    }

    /// Networks indexed on The Graph, with their CAIP-2 chain IDs.
    pub fn default_chains() -> BTreeMap<Network, ChainConfig> {
        [
            ("mainnet", "eip155:1"),
            ("optimism", "eip155:10"),
            ("bsc", "eip155:56"),
            ("gnosis", "eip155:100"),
            ("matic", "eip155:137"),
            ("fantom", "eip155:250"),
            ("base", "eip155:8453"),
            ("celo", "eip155:42220"),
            ("arbitrum-one", "eip155:42161"),
            ("avalanche", "eip155:43114"),
            ("sepolia", "eip155:11155111"),
            ("arbitrum-sepolia", "eip155:421614"),
        ]
        .into_iter()
        .filter_map(|(network, caip2)| {
            let network = network.parse().ok()?;
            Some((
                network,
                ChainConfig {
                    caip2: Some(caip2.to_owned()),
                },
            ))
        })
        .collect()
    }
}
