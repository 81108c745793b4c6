use url::Url;

use super::error::FailureReason;

/// A versioned developer disk image pair required before the device can be
/// driven. Immutable once an orchestration run starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiskImageAsset {
    pub os: String,
    pub version: String,
}

impl DiskImageAsset {
    pub fn new(os: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            version: version.into(),
        }
    }
}

/// One resolved download source for a single asset file.
#[derive(Debug, Clone)]
pub struct DownloadLink {
    pub label: String,
    pub url: Url,
    pub file_name: String,
}

/// Per-unit transfer state. Transitions only run
/// `Pending -> InFlight -> {Succeeded | Failed | Cancelled}`; terminal states
/// are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Pending,
    InFlight,
    Succeeded,
    Failed,
    Cancelled,
}

impl UnitState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            UnitState::Succeeded | UnitState::Failed | UnitState::Cancelled
        )
    }
}

/// The single final result of one orchestration run. Exactly one of these is
/// produced per run, and delivered exactly once.
#[derive(Debug, Clone, PartialEq)]
pub enum TerminalOutcome {
    Succeeded,
    Failed(FailureReason),
    Cancelled,
}
