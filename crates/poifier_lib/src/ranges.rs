//! Reference point selection: which blocks, per network, PoIs are sampled at.
//!
//! There are two independent sources of reference points:
//!
//! 1. Block samples: the most recent 1000-block boundaries below a network's
//!    head block.
//! 2. Epoch samples: the start blocks of the most recent epochs, as recorded
//!    by the epoch block oracle.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use itertools::Itertools;
use poifier_common_types::Network;
use poifier_epoch_oracle_client::EpochOracle;
use tracing::*;

use crate::block_choice::BlockChoicePolicy;
use crate::config::ChainConfig;
use crate::directory::Dataset;
use crate::error::Stage;
use crate::PoifierError;

/// Block samples are aligned to multiples of this.
pub const BLOCK_SAMPLE_STEP: u64 = 1000;

/// A block on a specific network at which PoIs are sampled, optionally tagged
/// with the epoch it starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReferencePoint {
    pub network: Network,
    pub block_number: u64,
    pub epoch_number: Option<u64>,
}

impl fmt::Display for ReferencePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.network, self.block_number)?;
        if let Some(epoch) = self.epoch_number {
            write!(f, " (epoch {})", epoch)?;
        }
        Ok(())
    }
}

/// Reference points grouped by network. Within a network, block samples come
/// first (descending), followed by epoch samples (descending epoch).
pub type ReferencePoints = BTreeMap<Network, Vec<ReferencePoint>>;

/// Returns the `window` most recent 1000-block boundaries at or below `head`,
/// in descending order. Boundaries that would fall below genesis are dropped.
pub fn block_samples(head: u64, window: u32) -> Vec<u64> {
    let top = head / BLOCK_SAMPLE_STEP;
    (0..u64::from(window))
        .map_while(|i| top.checked_sub(i))
        .map(|step| step * BLOCK_SAMPLE_STEP)
        .collect()
}

/// Computes block samples for every network that has at least one healthy
/// dataset. Datasets on the same network share one list.
pub fn block_reference_points(
    datasets: &[Dataset],
    window: u32,
    policy: BlockChoicePolicy,
) -> ReferencePoints {
    let heads_by_network = datasets
        .iter()
        .map(|dataset| (dataset.network.clone(), dataset.head_block))
        .into_group_map();

    let mut points = ReferencePoints::new();
    for (network, heads) in heads_by_network {
        let Some(head) = policy.choose_head(heads.into_iter()) else {
            continue;
        };

        let samples = block_samples(head, window);
        debug!(%network, head, ?samples, "Resolved block samples");

        points.insert(
            network.clone(),
            samples
                .into_iter()
                .map(|block_number| ReferencePoint {
                    network: network.clone(),
                    block_number,
                    epoch_number: None,
                })
                .collect(),
        );
    }

    points
}

/// Maps the epoch oracle's CAIP-2 chain IDs to network names.
#[derive(Debug, Clone, Default)]
pub struct NetworkTable {
    by_caip2: HashMap<String, Network>,
}

impl NetworkTable {
    pub fn from_chains(chains: &BTreeMap<Network, ChainConfig>) -> Self {
        let by_caip2 = chains
            .iter()
            .filter_map(|(network, chain)| Some((chain.caip2.clone()?, network.clone())))
            .collect();

        Self { by_caip2 }
    }

    pub fn network(&self, caip2: &str) -> Option<&Network> {
        self.by_caip2.get(caip2)
    }
}

/// Queries the epoch oracle for the `window` most recent epochs and keeps
/// those of the given `networks`. Oracle networks missing from `table` are
/// ignored.
#[instrument(skip_all)]
pub async fn epoch_reference_points(
    oracle: Arc<dyn EpochOracle>,
    table: &NetworkTable,
    networks: &BTreeSet<Network>,
    window: u32,
) -> Result<ReferencePoints, PoifierError> {
    info!(window, "Querying latest epochs from the epoch oracle");

    let oracle_networks = oracle
        .latest_epochs(window)
        .await
        .map_err(PoifierError::upstream(Stage::EpochOracle))?;

    let mut points = ReferencePoints::new();
    for oracle_network in oracle_networks {
        let Some(network) = table.network(&oracle_network.caip2) else {
            trace!(caip2 = %oracle_network.caip2, "Ignoring unmapped epoch oracle network");
            continue;
        };
        if !networks.contains(network) {
            continue;
        }

        let epochs = oracle_network
            .epochs
            .into_iter()
            .take(window as usize)
            .collect::<Vec<_>>();
        debug!(
            %network,
            caip2 = %oracle_network.caip2,
            epochs = ?epochs.iter().map(|e| (e.epoch_number, e.block_number)).collect::<Vec<_>>(),
            "Resolved epoch samples"
        );

        points
            .entry(network.clone())
            .or_default()
            .extend(epochs.into_iter().map(|epoch| ReferencePoint {
                network: network.clone(),
                block_number: epoch.block_number,
                epoch_number: Some(epoch.epoch_number),
            }));
    }

    Ok(points)
}

/// Concatenates block and epoch reference points per network, block samples
/// first.
pub fn merge_reference_points(blocks: ReferencePoints, epochs: ReferencePoints) -> ReferencePoints {
    let mut merged = blocks;
    for (network, epoch_points) in epochs {
        merged.entry(network).or_default().extend(epoch_points);
    }
    merged
}

#[cfg(test)]
mod tests {
    use poifier_epoch_oracle_client::{EpochBlock, NetworkEpochs};
    use quickcheck_macros::quickcheck;

    use super::*;
    use crate::test_utils::mocks::MockEpochOracle;
    use crate::test_utils::{dataset, network, DEPLOYMENT_A, DEPLOYMENT_B, DEPLOYMENT_C};

    #[test]
    fn block_samples_are_1000_aligned_and_descending() {
        assert_eq!(
            block_samples(12_345_000, 3),
            vec![12_345_000, 12_344_000, 12_343_000]
        );
        assert_eq!(
            block_samples(12_345_999, 3),
            vec![12_345_000, 12_344_000, 12_343_000]
        );
    }

    #[test]
    fn block_samples_stop_at_genesis() {
        assert_eq!(block_samples(2_500, 10), vec![2_000, 1_000, 0]);
        assert_eq!(block_samples(999, 10), vec![0]);
    }

    #[quickcheck]
    fn block_samples_properties(head: u64, window: u8) -> bool {
        let samples = block_samples(head, u32::from(window));

        samples.len() <= window as usize
            && samples.iter().all(|b| b % BLOCK_SAMPLE_STEP == 0 && *b <= head)
            && samples.windows(2).all(|w| w[0] - w[1] == BLOCK_SAMPLE_STEP)
            && (head < u64::from(window) * BLOCK_SAMPLE_STEP || samples.len() == window as usize)
    }

    #[test]
    fn block_points_are_shared_per_network() {
        let datasets = vec![
            dataset(DEPLOYMENT_A, "mainnet", 12_345_678),
            dataset(DEPLOYMENT_B, "mainnet", 12_341_000),
            dataset(DEPLOYMENT_C, "gnosis", 30_000_100),
        ];

        let latest = block_reference_points(&datasets, 2, BlockChoicePolicy::Latest);
        assert_eq!(latest.len(), 2);
        assert_eq!(
            latest[&network("mainnet")]
                .iter()
                .map(|p| p.block_number)
                .collect::<Vec<_>>(),
            vec![12_345_000, 12_344_000]
        );
        assert_eq!(
            latest[&network("gnosis")]
                .iter()
                .map(|p| p.block_number)
                .collect::<Vec<_>>(),
            vec![30_000_000, 29_999_000]
        );

        let earliest = block_reference_points(&datasets, 2, BlockChoicePolicy::Earliest);
        assert_eq!(
            earliest[&network("mainnet")]
                .iter()
                .map(|p| p.block_number)
                .collect::<Vec<_>>(),
            vec![12_341_000, 12_340_000]
        );
    }

    fn oracle() -> MockEpochOracle {
        MockEpochOracle {
            networks: vec![
                NetworkEpochs {
                    caip2: "eip155:1".to_string(),
                    epochs: vec![
                        EpochBlock {
                            epoch_number: 420,
                            block_number: 12_340_017,
                        },
                        EpochBlock {
                            epoch_number: 419,
                            block_number: 12_333_000,
                        },
                    ],
                },
                NetworkEpochs {
                    caip2: "eip155:100".to_string(),
                    epochs: vec![EpochBlock {
                        epoch_number: 420,
                        block_number: 30_000_017,
                    }],
                },
                NetworkEpochs {
                    caip2: "eip155:999999".to_string(),
                    epochs: vec![EpochBlock {
                        epoch_number: 420,
                        block_number: 1,
                    }],
                },
            ],
            fail: false,
        }
    }

    #[tokio::test]
    async fn epoch_points_keep_only_mapped_and_indexed_networks() {
        let table = NetworkTable::from_chains(&crate::config::Config::default_chains());
        let networks = BTreeSet::from([network("mainnet")]);

        let points = epoch_reference_points(Arc::new(oracle()), &table, &networks, 10)
            .await
            .unwrap();

        assert_eq!(points.len(), 1);
        assert_eq!(
            points[&network("mainnet")],
            vec![
                ReferencePoint {
                    network: network("mainnet"),
                    block_number: 12_340_017,
                    epoch_number: Some(420),
                },
                ReferencePoint {
                    network: network("mainnet"),
                    block_number: 12_333_000,
                    epoch_number: Some(419),
                },
            ]
        );
    }

    #[tokio::test]
    async fn epoch_points_respect_window() {
        let table = NetworkTable::from_chains(&crate::config::Config::default_chains());
        let networks = BTreeSet::from([network("mainnet"), network("gnosis")]);

        let points = epoch_reference_points(Arc::new(oracle()), &table, &networks, 1)
            .await
            .unwrap();

        assert_eq!(points[&network("mainnet")].len(), 1);
        assert_eq!(points[&network("gnosis")].len(), 1);
    }

    #[tokio::test]
    async fn oracle_failure_is_an_error() {
        let table = NetworkTable::default();
        let oracle = MockEpochOracle {
            fail: true,
            ..oracle()
        };

        let err = epoch_reference_points(Arc::new(oracle), &table, &BTreeSet::new(), 10)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PoifierError::Upstream {
                stage: Stage::EpochOracle,
                ..
            }
        ));
    }

    #[test]
    fn merge_puts_block_samples_first() {
        let mainnet = network("mainnet");
        let point = |block_number, epoch_number| ReferencePoint {
            network: mainnet.clone(),
            block_number,
            epoch_number,
        };

        let blocks = ReferencePoints::from([(mainnet.clone(), vec![point(2000, None)])]);
        let epochs = ReferencePoints::from([
            (mainnet.clone(), vec![point(1999, Some(7))]),
            (network("gnosis"), vec![]),
        ]);

        let merged = merge_reference_points(blocks, epochs);
        assert_eq!(
            merged[&mainnet],
            vec![point(2000, None), point(1999, Some(7))]
        );
        assert!(merged[&network("gnosis")].is_empty());
    }
}
