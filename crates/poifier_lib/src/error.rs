use std::fmt;

/// The pipeline stage an upstream failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    DatasetDirectory,
    EpochOracle,
    BlockHashes,
    ProofsOfIndexing,
}

/// Errors that stop a cycle (or, for configuration errors, the process).
#[derive(Debug, thiserror::Error)]
pub enum PoifierError {
    /// Missing or contradictory configuration. Detected before any network
    /// activity and always fatal.
    #[error("configuration error: {0}")]
    Config(String),
    /// A query that the report depends on failed. The cycle is aborted and
    /// nothing is uploaded.
    #[error("{stage} failed: {error:#}")]
    Upstream { stage: Stage, error: anyhow::Error },
}

impl PoifierError {
    pub fn config(msg: impl fmt::Display) -> Self {
        Self::Config(msg.to_string())
    }

    pub fn upstream(stage: Stage) -> impl FnOnce(anyhow::Error) -> Self {
        move |error| Self::Upstream { stage, error }
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
