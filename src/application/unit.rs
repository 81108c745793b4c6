use std::path::PathBuf;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use super::progress::{ProgressTracker, UnitId};
use super::Transport;
use crate::domain::{TransferError, UnitState};

/// One fetchable artifact: a source URL, a destination path and the transfer
/// lifecycle around them. Owned exclusively by the workflow runner for the
/// duration of one run.
pub struct DownloadUnit {
    id: UnitId,
    label: String,
    source: Url,
    destination: PathBuf,
    state: UnitState,
    bytes_received: u64,
    bytes_expected: Option<u64>,
    failure: Option<TransferError>,
    token: CancellationToken,
}

enum Stop {
    Cancelled,
    Failed(TransferError),
}

impl DownloadUnit {
    pub fn new(id: UnitId, label: String, source: Url, destination: PathBuf) -> Self {
        Self {
            id,
            label,
            source,
            destination,
            state: UnitState::Pending,
            bytes_received: 0,
            bytes_expected: None,
            failure: None,
            token: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn destination(&self) -> &PathBuf {
        &self.destination
    }

    pub fn state(&self) -> UnitState {
        self.state
    }

    pub fn failure(&self) -> Option<&TransferError> {
        self.failure.as_ref()
    }

    /// Handle the runner keeps so it can fan out run-level cancellation.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Idempotent; may fire before `start`, in which case the unit goes
    /// straight to `Cancelled` and no file is ever created.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Run the transfer to completion. Cancellation is cooperative: it is
    /// observed between chunks, and an in-flight chunk is always written out
    /// before the unit unwinds. Cancelled and failed transfers remove their
    /// partial file so nothing half-written can be mistaken for a success.
    pub async fn start(&mut self, transport: &dyn Transport, tracker: &ProgressTracker) -> UnitState {
        debug_assert_eq!(self.state, UnitState::Pending);

        if self.token.is_cancelled() {
            self.state = UnitState::Cancelled;
            tracker.mark(self.id, self.state);
            return self.state;
        }

        self.state = UnitState::InFlight;
        tracker.mark(self.id, self.state);

        let result = self.transfer(transport, tracker).await;
        self.state = match result {
            Ok(()) => UnitState::Succeeded,
            Err(Stop::Cancelled) => {
                self.discard_partial().await;
                UnitState::Cancelled
            }
            Err(Stop::Failed(err)) => {
                self.discard_partial().await;
                self.failure = Some(err);
                UnitState::Failed
            }
        };
        tracker.mark(self.id, self.state);
        debug!(
            unit = %self.label,
            dest = %self.destination().display(),
            state = ?self.state,
            "download unit finished"
        );
        self.state
    }

    async fn transfer(
        &mut self,
        transport: &dyn Transport,
        tracker: &ProgressTracker,
    ) -> Result<(), Stop> {
        let (expected, mut stream) = transport
            .open(&self.source)
            .await
            .map_err(Stop::Failed)?;
        self.bytes_expected = expected;
        tracker.update(self.id, 0, expected);

        if self.token.is_cancelled() {
            return Err(Stop::Cancelled);
        }

        let mut file = tokio::fs::File::create(&self.destination)
            .await
            .map_err(|e| Stop::Failed(TransferError::Io(format!("Failed to create file: {}", e))))?;

        loop {
            // A chunk that is already available is always drained and
            // written before cancellation is honored.
            let chunk = tokio::select! {
                biased;
                chunk = stream.next() => chunk,
                _ = self.token.cancelled() => return Err(Stop::Cancelled),
            };
            match chunk {
                Some(Ok(chunk)) => {
                    file.write_all(&chunk)
                        .await
                        .map_err(|e| Stop::Failed(TransferError::Io(format!("Write error: {}", e))))?;
                    self.bytes_received += chunk.len() as u64;
                    tracker.update(self.id, self.bytes_received, self.bytes_expected);
                    // The chunk just written is complete; only now honor a
                    // pending cancellation.
                    if self.token.is_cancelled() {
                        return Err(Stop::Cancelled);
                    }
                }
                Some(Err(err)) => return Err(Stop::Failed(err)),
                None => {
                    file.sync_all().await.map_err(|e| {
                        Stop::Failed(TransferError::Io(format!("Failed to sync file: {}", e)))
                    })?;
                    return Ok(());
                }
            }
        }
    }

    async fn discard_partial(&self) {
        if let Err(err) = tokio::fs::remove_file(&self.destination).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                debug!(unit = %self.label, error = %err, "could not remove partial file");
            }
        }
    }
}
