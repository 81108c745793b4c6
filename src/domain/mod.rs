pub mod error;
pub mod model;

pub use error::{FailureReason, PreparationError, ResolutionError, TransferError};
pub use model::{DiskImageAsset, DownloadLink, TerminalOutcome, UnitState};
