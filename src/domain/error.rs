use thiserror::Error;

/// Link resolution failures. Non-fatal: the workflow continues with the
/// resolver's fallback links (degraded mode).
#[derive(Debug, Clone, Error)]
pub enum ResolutionError {
    #[error("manifest request failed: {0}")]
    Request(String),

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("no manifest entry for {os} {version}")]
    MissingEntry { os: String, version: String },
}

/// Preparation failures. Fatal: the run aborts before any bytes move.
#[derive(Debug, Clone, Error)]
pub enum PreparationError {
    #[error("destination not usable: {0}")]
    Destination(String),

    #[error("duplicate destination: {0}")]
    DuplicateDestination(String),

    #[error("no download links for asset")]
    NoUnits,
}

/// Per-unit transfer failures. Fatal: the first unrecoverable one fails the
/// whole run fast.
#[derive(Debug, Clone, Error)]
pub enum TransferError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// The reduced, user-presentable reason carried by `TerminalOutcome::Failed`.
/// Raw transport errors never leave the workflow runner.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("preparation failed: {0}")]
    Preparation(String),

    #[error("transfer failed: {0}")]
    Transfer(String),
}
