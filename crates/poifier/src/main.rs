use anyhow::Context;
use clap::Parser;
use poifier_lib::auth::credential;
use poifier_lib::config::Config;
use poifier_lib::cycle::Poifier;
use poifier_lib::{CliOptions, PrometheusExporter, POIFIER_VERSION};
use prometheus_exporter::prometheus;
use tracing::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!(version = POIFIER_VERSION, "Parse options");
    let cli_options = CliOptions::parse();

    info!("Loading configuration file");
    let mut config = Config::read(&cli_options.config)?;
    config.apply_cli_overrides(&cli_options);
    config.validate()?;

    // Signing is deterministic, so the credential is the same for every
    // cycle.
    let credential_source = config.credential_source()?;
    let credential = credential(&credential_source).await?;
    info!("Upload credential ready");

    // Prometheus metrics.
    let _exporter = match config.prometheus_port {
        Some(port) => {
            let registry = prometheus::default_registry().clone();
            let exporter = PrometheusExporter::start(port, registry)
                .context("failed to start Prometheus exporter")?;
            info!(port = exporter.port(), "Prometheus exporter started");
            Some(exporter)
        }
        None => None,
    };

    let poifier = Poifier::from_config(&config, credential)?;

    if cli_options.once {
        let outcome = poifier.run_cycle().await?;
        outcome.upload?;
        return Ok(());
    }

    info!(
        sleep_seconds = config.initial_delay().as_secs(),
        "Waiting before the first cycle"
    );
    tokio::time::sleep(config.initial_delay()).await;

    poifier.run_cycles(config.interval(), None).await;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}
