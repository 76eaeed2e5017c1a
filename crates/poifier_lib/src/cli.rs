use std::path::PathBuf;

use clap::Parser;
use poifier_common_types::IndexerAddress;

#[derive(Parser, Debug)]
#[clap(author, about, version)]
pub struct CliOptions {
    /// Path to the YAML configuration file.
    #[clap(long)]
    pub config: PathBuf,
    /// Pre-issued POIfier token. Overrides `token` from the configuration
    /// file.
    #[clap(long, env = "POIFIER_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
    /// Mnemonic of the indexer's operator wallet, used to sign the upload
    /// credential. Overrides `mnemonic` from the configuration file.
    #[clap(long, env = "POIFIER_MNEMONIC", hide_env_values = true)]
    pub mnemonic: Option<String>,
    /// The indexer address the mnemonic signs for. Overrides
    /// `indexerAddress` from the configuration file.
    #[clap(long, env = "POIFIER_INDEXER_ADDRESS")]
    pub indexer_address: Option<IndexerAddress>,
    /// Run a single cycle and exit instead of looping forever.
    #[clap(long)]
    pub once: bool,
}
