//! Assembles the PoI report of a cycle.

use std::collections::BTreeMap;

use futures::{stream, StreamExt, TryStreamExt};
use poifier_common_types::{Network, Report, ReportRecord};
use tracing::*;

use crate::block_hashes::ResolvedPoint;
use crate::directory::Dataset;
use crate::pois::PoiFetcher;
use crate::{metrics, PoifierError};

/// Reference points with resolved block hashes, grouped by network.
pub type ResolvedPoints = BTreeMap<Network, Vec<ResolvedPoint>>;

/// Fetches the PoI of every dataset at every resolved point of its network
/// and keeps the ones that exist.
///
/// Up to `max_concurrent_requests` PoI queries are in flight at once, but
/// records are always ordered by dataset (in the order given) and then by
/// reference point. Any failed query fails the whole report.
#[instrument(skip_all, fields(datasets = datasets.len()))]
pub async fn aggregate(
    fetcher: &PoiFetcher,
    datasets: &[Dataset],
    points: &ResolvedPoints,
    max_concurrent_requests: usize,
) -> Result<Report, PoifierError> {
    let queries = datasets.iter().flat_map(|dataset| {
        points
            .get(&dataset.network)
            .into_iter()
            .flatten()
            .map(move |point| (dataset, point))
    });

    let results: Vec<_> = stream::iter(queries)
        .map(|(dataset, point)| async move {
            let poi = fetcher.fetch(dataset, point).await?;
            Ok::<_, PoifierError>((dataset, point, poi))
        })
        .buffered(max_concurrent_requests.max(1))
        .try_collect()
        .await?;

    let records = results
        .into_iter()
        .filter_map(|(dataset, point, poi)| {
            Some(ReportRecord {
                dataset_id: dataset.id.clone(),
                block_number: point.point.block_number,
                epoch_number: point.point.epoch_number,
                poi_value: poi?,
            })
        })
        .collect();

    let report = Report::new(records);
    metrics()
        .poi_report_records
        .set(report.len().try_into().unwrap_or(i64::MAX));

    Ok(report)
}

/// Groups resolved points by network, preserving their relative order.
pub fn group_by_network(points: Vec<ResolvedPoint>) -> ResolvedPoints {
    let mut grouped = ResolvedPoints::new();
    for point in points {
        grouped
            .entry(point.point.network.clone())
            .or_default()
            .push(point);
    }
    grouped
}
