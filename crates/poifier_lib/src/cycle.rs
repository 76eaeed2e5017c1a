//! One POIfier cycle: list datasets, resolve reference points and their
//! hashes, collect PoIs, upload the report.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use poifier_common_types::{Report, ReportSummary};
use poifier_epoch_oracle_client::{EpochOracle, EpochOracleClient};
use poifier_index_node_client::{IndexNodeClient, RealIndexNode};
use tracing::*;

use crate::auth::Credential;
use crate::block_choice::BlockChoicePolicy;
use crate::block_hashes::BlockHashResolver;
use crate::config::Config;
use crate::directory::list_healthy_datasets;
use crate::pois::PoiFetcher;
use crate::ranges::{
    block_reference_points, epoch_reference_points, merge_reference_points, NetworkTable,
};
use crate::report::{aggregate, group_by_network};
use crate::upload::{UploadError, Uploader};
use crate::{metrics, PoifierError};

/// Sampling parameters of a [`Poifier`].
#[derive(Debug, Clone)]
pub struct SamplingOptions {
    pub window_size: u32,
    pub block_choice_policy: BlockChoicePolicy,
    pub max_concurrent_requests: usize,
    pub networks: NetworkTable,
}

impl SamplingOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            window_size: config.window_size,
            block_choice_policy: config.block_choice_policy,
            max_concurrent_requests: config.max_concurrent_requests,
            networks: NetworkTable::from_chains(&config.chains),
        }
    }
}

/// What happened in a cycle that produced a report.
#[derive(Debug)]
pub struct CycleOutcome {
    pub summary: ReportSummary,
    /// Upload failures don't fail the cycle, the report is simply rebuilt and
    /// sent again next time.
    pub upload: Result<(), UploadError>,
}

pub struct Poifier {
    index_node: Arc<dyn IndexNodeClient>,
    epoch_oracle: Arc<dyn EpochOracle>,
    uploader: Uploader,
    credential: Credential,
    options: SamplingOptions,
}

impl Poifier {
    pub fn new(
        index_node: Arc<dyn IndexNodeClient>,
        epoch_oracle: Arc<dyn EpochOracle>,
        uploader: Uploader,
        credential: Credential,
        options: SamplingOptions,
    ) -> Self {
        Self {
            index_node,
            epoch_oracle,
            uploader,
            credential,
            options,
        }
    }

    /// Connects to the index node, epoch oracle and POIfier server from
    /// `config`.
    pub fn from_config(config: &Config, credential: Credential) -> anyhow::Result<Self> {
        let timeout = config.request_timeout();

        let index_node = RealIndexNode::new(
            config.index_node_endpoint.clone(),
            metrics().index_node_requests.clone(),
        )
        .with_timeout(timeout);
        let epoch_oracle = EpochOracleClient::new(
            config.epoch_oracle_endpoint.clone(),
            metrics().epoch_oracle_requests.clone(),
        )
        .with_timeout(timeout);
        let uploader = Uploader::new(&config.server_url, timeout)?;

        Ok(Self::new(
            Arc::new(index_node),
            Arc::new(epoch_oracle),
            uploader,
            credential,
            SamplingOptions::from_config(config),
        ))
    }

    /// Builds this cycle's report. Nothing partial is ever returned: if any
    /// query fails, so does the whole report.
    pub async fn build_report(&self) -> Result<Report, PoifierError> {
        let options = &self.options;

        let datasets = list_healthy_datasets(self.index_node.clone()).await?;
        if datasets.is_empty() {
            warn!("No healthy deployments found on the index node");
            return Ok(Report::default());
        }

        let block_points =
            block_reference_points(&datasets, options.window_size, options.block_choice_policy);
        let networks = block_points.keys().cloned().collect::<BTreeSet<_>>();
        let epoch_points = epoch_reference_points(
            self.epoch_oracle.clone(),
            &options.networks,
            &networks,
            options.window_size,
        )
        .await?;

        let points = merge_reference_points(block_points, epoch_points);
        info!(
            networks = points.len(),
            reference_points = points.values().map(Vec::len).sum::<usize>(),
            "Resolved reference points"
        );

        let mut resolver = BlockHashResolver::new(self.index_node.clone());
        let resolved = resolver
            .resolve_points(points.into_values().flatten())
            .await?;

        let fetcher = PoiFetcher::new(self.index_node.clone());
        aggregate(
            &fetcher,
            &datasets,
            &group_by_network(resolved),
            options.max_concurrent_requests,
        )
        .await
    }

    #[instrument(skip_all)]
    pub async fn run_cycle(&self) -> Result<CycleOutcome, PoifierError> {
        let report = self.build_report().await?;

        for record in report.records() {
            info!(%record, "Collected reference PoI");
        }
        let summary = report.summary();
        info!(
            datasets = summary.distinct_dataset_count,
            records = summary.record_count,
            "Built PoI report"
        );

        let upload = self.uploader.upload(&self.credential, &report).await;

        Ok(CycleOutcome { summary, upload })
    }

    /// Runs cycles separated by `interval`, forever or until `limit` cycles
    /// have run. A failed cycle is logged and the next one runs as
    /// scheduled.
    pub async fn run_cycles(&self, interval: Duration, limit: Option<usize>) {
        let mut cycles = 0;
        loop {
            info!(cycle = cycles, "Starting new cycle");
            match self.run_cycle().await {
                Ok(outcome) if outcome.upload.is_ok() => info!("Cycle completed"),
                Ok(_) => warn!("Cycle completed, but the report wasn't uploaded"),
                Err(e) => error!(error = %e, "Cycle failed, nothing was uploaded"),
            }

            cycles += 1;
            if limit.is_some_and(|limit| cycles >= limit) {
                break;
            }

            info!(
                sleep_seconds = interval.as_secs(),
                "Sleeping for a while before next cycle"
            );
            tokio::time::sleep(interval).await;
        }
    }
}
