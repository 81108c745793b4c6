use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::progress::ProgressTracker;
use super::unit::DownloadUnit;
use super::{LinkResolver, Preparer, Transport};
use crate::domain::{DiskImageAsset, FailureReason, TerminalOutcome, UnitState};

/// Phase the runner is currently in. Transitions are strictly sequential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowPhase {
    ResolvingLinks,
    Preparing,
    Transferring,
    Done,
}

/// Drives the three ordered phases of one acquisition run on a background
/// task: resolve links, prepare destinations, transfer. Each phase is
/// independently cancellable; the runner reduces whatever happens into a
/// single `TerminalOutcome`, and raw collaborator errors never leave it.
#[derive(Clone)]
pub struct WorkflowPhaseRunner {
    resolver: Arc<dyn LinkResolver>,
    preparer: Arc<dyn Preparer>,
    transport: Arc<dyn Transport>,
}

impl WorkflowPhaseRunner {
    pub fn new(
        resolver: Arc<dyn LinkResolver>,
        preparer: Arc<dyn Preparer>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            resolver,
            preparer,
            transport,
        }
    }

    /// Run all phases to completion. `cancel` is the user's cancellation;
    /// it is observed at phase boundaries and at chunk checkpoints inside a
    /// transfer, never pre-emptively.
    pub async fn execute(
        &self,
        asset: &DiskImageAsset,
        cancel: CancellationToken,
        tracker: Arc<ProgressTracker>,
    ) -> TerminalOutcome {
        if cancel.is_cancelled() {
            // User cancelled before any phase started.
            return TerminalOutcome::Cancelled;
        }

        info!(os = %asset.os, version = %asset.version, phase = ?WorkflowPhase::ResolvingLinks, "run started");
        let links = tokio::select! {
            resolved = self.resolver.resolve_links(asset) => match resolved {
                Ok(links) => links,
                Err(err) => {
                    // Non-fatal: continue degraded with the default links.
                    // The user is not told the links may be stale.
                    warn!(error = %err, "link resolution failed, using fallback links");
                    self.resolver.fallback_links(asset)
                }
            },
            _ = cancel.cancelled() => return TerminalOutcome::Cancelled,
        };

        debug!(phase = ?WorkflowPhase::Preparing, links = links.len(), "links resolved");
        let units = tokio::select! {
            prepared = self.preparer.prepare(asset, &links) => match prepared {
                Ok(units) => units,
                Err(err) => {
                    warn!(error = %err, "preparation failed");
                    return TerminalOutcome::Failed(FailureReason::Preparation(err.to_string()));
                }
            },
            _ = cancel.cancelled() => return TerminalOutcome::Cancelled,
        };

        if cancel.is_cancelled() {
            return TerminalOutcome::Cancelled;
        }

        debug!(phase = ?WorkflowPhase::Transferring, units = units.len(), "destinations prepared");
        let outcome = self.transfer(units, &cancel, tracker).await;
        info!(phase = ?WorkflowPhase::Done, outcome = ?outcome, "run finished");
        outcome
    }

    /// Transfer all units in parallel. Completions are reduced into the
    /// tracker one at a time. Fail-fast: the first unit failure cancels
    /// every unit that has not reached a terminal state, but in-flight units
    /// always unwind cleanly before the phase concludes, so nothing remains
    /// `InFlight` once the outcome is reported.
    async fn transfer(
        &self,
        units: Vec<DownloadUnit>,
        cancel: &CancellationToken,
        tracker: Arc<ProgressTracker>,
    ) -> TerminalOutcome {
        for unit in &units {
            tracker.register(unit.id(), unit.label());
        }
        let handles: Vec<_> = units.iter().map(|u| u.cancel_handle()).collect();

        // Fan the user's cancellation out to every unit.
        let fan_out = {
            let cancel = cancel.clone();
            let handles = handles.clone();
            tokio::spawn(async move {
                cancel.cancelled().await;
                for handle in &handles {
                    handle.cancel();
                }
            })
        };

        let mut tasks = JoinSet::new();
        for mut unit in units {
            let transport = self.transport.clone();
            let tracker = tracker.clone();
            tasks.spawn(async move {
                unit.start(transport.as_ref(), &tracker).await;
                unit
            });
        }

        let mut first_failure: Option<FailureReason> = None;
        let mut finished = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let unit = joined.expect("download unit task panicked");
            if unit.state() == UnitState::Failed
                && first_failure.is_none()
                && !cancel.is_cancelled()
            {
                let reason = unit
                    .failure()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown transfer error".to_string());
                warn!(unit = %unit.label(), error = %reason, "unit failed, aborting remaining units");
                first_failure = Some(FailureReason::Transfer(reason));
                for handle in &handles {
                    handle.cancel();
                }
            }
            finished.push(unit);
        }
        fan_out.abort();

        debug_assert!(finished.iter().all(|u| u.state().is_terminal()));

        if let Some(reason) = first_failure {
            TerminalOutcome::Failed(reason)
        } else if cancel.is_cancelled() {
            TerminalOutcome::Cancelled
        } else if finished.iter().all(|u| u.state() == UnitState::Succeeded) {
            TerminalOutcome::Succeeded
        } else {
            // Units cancelled without a user cancel or a recorded failure;
            // reduce conservatively.
            TerminalOutcome::Cancelled
        }
    }
}
