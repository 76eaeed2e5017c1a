pub mod auth;
pub mod block_choice;
pub mod block_hashes;
mod cli;
pub mod config;
pub mod cycle;
pub mod directory;
mod error;
pub mod pois;
mod prometheus_metrics;
pub mod ranges;
pub mod report;
pub mod upload;

#[cfg(any(test, feature = "tests"))]
pub mod test_utils;

pub use cli::CliOptions;
pub use error::{PoifierError, Stage};
pub use prometheus_metrics::{metrics, PrometheusExporter, PrometheusMetrics};

pub const POIFIER_VERSION: &str = env!("CARGO_PKG_VERSION");
