use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use super::gateway::ModalGateway;
use super::progress::ProgressTracker;
use super::runner::WorkflowPhaseRunner;
use super::surface::ModalSurface;
use super::{LinkResolver, Preparer, Transport};
use crate::domain::{DiskImageAsset, TerminalOutcome};

/// Wires user intent, the modal surface and the background phase runner
/// together, and owns the single-outcome delivery. This is the one entry
/// point external callers use.
pub struct OrchestrationController {
    runner: WorkflowPhaseRunner,
    active: AtomicBool,
}

impl OrchestrationController {
    pub fn new(
        resolver: Arc<dyn LinkResolver>,
        preparer: Arc<dyn Preparer>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            runner: WorkflowPhaseRunner::new(resolver, preparer, transport),
            active: AtomicBool::new(false),
        }
    }

    /// Acquire the asset behind a modal surface. Semantically blocking: the
    /// caller suspends until exactly one `TerminalOutcome` arrives.
    ///
    /// A user cancel trips the run's cancellation token immediately, without
    /// waiting for the runner to acknowledge; the runner independently
    /// decides how far it can unwind. Calling `run` while another run is
    /// active on this controller is a programming defect and panics.
    pub async fn run(
        &self,
        asset: DiskImageAsset,
        surface: Arc<dyn ModalSurface>,
    ) -> TerminalOutcome {
        assert!(
            !self.active.swap(true, Ordering::SeqCst),
            "orchestration run already active"
        );

        let cancel = CancellationToken::new();
        {
            let cancel = cancel.clone();
            surface.on_cancel(Box::new(move || cancel.cancel()));
        }

        let tracker = Arc::new(ProgressTracker::new());
        let gateway = Arc::new(ModalGateway::new());

        // Forward coalesced tracker snapshots to the surface until the
        // tracker is dropped with the finished run.
        let forwarder = {
            let mut snapshots = tracker.subscribe();
            let surface = surface.clone();
            tokio::spawn(async move {
                while snapshots.changed().await.is_ok() {
                    let snapshot = snapshots.borrow_and_update().clone();
                    surface.render(&snapshot);
                }
            })
        };

        // The runner owns the outcome; the gateway guarantees it is
        // delivered at most once.
        {
            let runner = self.runner.clone();
            let gateway = gateway.clone();
            let cancel = cancel.clone();
            let tracker = tracker.clone();
            tokio::spawn(async move {
                let outcome = runner.execute(&asset, cancel, tracker).await;
                gateway.deliver(outcome);
            });
        }

        let outcome = gateway.present_and_await(surface.as_ref()).await;
        forwarder.abort();
        // Nothing may still fire into this run: the runner has concluded and
        // the cancel callback only touches the (now spent) token.
        self.active.store(false, Ordering::SeqCst);
        info!(outcome = ?outcome, "orchestration run concluded");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{
        link, DirPreparer, RecordingSurface, ScriptedTransport, StaticResolver,
    };
    use bytes::Bytes;

    const IMAGE_URL: &str = "https://dl.test/DeveloperDiskImage.dmg";
    const SIG_URL: &str = "https://dl.test/DeveloperDiskImage.dmg.signature";

    fn asset() -> DiskImageAsset {
        DiskImageAsset::new("iOS", "17.0")
    }

    fn controller(dir: std::path::PathBuf, transport: Arc<ScriptedTransport>) -> OrchestrationController {
        OrchestrationController::new(
            Arc::new(StaticResolver {
                resolved: Ok(vec![link("image", IMAGE_URL), link("signature", SIG_URL)]),
                fallback: vec![],
            }),
            Arc::new(DirPreparer {
                dir,
                fail_with: None,
            }),
            transport,
        )
    }

    #[tokio::test]
    async fn run_returns_one_outcome_and_shows_dismisses_once() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(ScriptedTransport::default());
        transport.script(IMAGE_URL, Some(4), vec![Ok(Bytes::from_static(b"dmg!"))]);
        transport.script(SIG_URL, Some(3), vec![Ok(Bytes::from_static(b"sig"))]);
        let controller = controller(dir.path().to_path_buf(), transport);
        let surface = Arc::new(RecordingSurface::default());

        let outcome = controller.run(asset(), surface.clone()).await;

        assert_eq!(outcome, TerminalOutcome::Succeeded);
        assert_eq!(*surface.shown.lock().unwrap(), 1);
        assert_eq!(*surface.dismissed.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn rendered_fractions_are_monotone_for_a_successful_run() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(ScriptedTransport::default());
        transport.script(
            IMAGE_URL,
            Some(100),
            vec![
                Ok(Bytes::from_static(&[1u8; 25])),
                Ok(Bytes::from_static(&[1u8; 25])),
                Ok(Bytes::from_static(&[1u8; 50])),
            ],
        );
        transport.script(SIG_URL, Some(3), vec![Ok(Bytes::from_static(b"sig"))]);
        let controller = controller(dir.path().to_path_buf(), transport);
        let surface = Arc::new(RecordingSurface::default());

        let outcome = controller.run(asset(), surface.clone()).await;
        assert_eq!(outcome, TerminalOutcome::Succeeded);

        let snapshots = surface.snapshots.lock().unwrap();
        let mut last = 0.0f32;
        for snapshot in snapshots.iter() {
            assert!(snapshot.fraction >= last);
            last = snapshot.fraction;
        }
    }

    #[tokio::test]
    async fn cancel_before_any_unit_starts_is_cancelled_with_no_files() {
        let dir = tempfile::tempdir().unwrap();
        // Nothing scripted: if a transfer were attempted it would fail, so a
        // clean `Cancelled` proves no unit ever started.
        let transport = Arc::new(ScriptedTransport::default());
        let controller = controller(dir.path().to_path_buf(), transport);
        let surface = Arc::new(RecordingSurface::cancelling_immediately());

        let outcome = controller.run(asset(), surface).await;

        assert_eq!(outcome, TerminalOutcome::Cancelled);
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn run_can_be_repeated_after_a_finished_run() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(ScriptedTransport::default());
        transport.script(IMAGE_URL, Some(4), vec![Ok(Bytes::from_static(b"dmg!"))]);
        transport.script(SIG_URL, Some(3), vec![Ok(Bytes::from_static(b"sig"))]);
        let controller = controller(dir.path().to_path_buf(), transport.clone());

        let surface = Arc::new(RecordingSurface::default());
        let first = controller.run(asset(), surface).await;
        assert_eq!(first, TerminalOutcome::Succeeded);

        transport.script(IMAGE_URL, Some(4), vec![Ok(Bytes::from_static(b"dmg!"))]);
        transport.script(SIG_URL, Some(3), vec![Ok(Bytes::from_static(b"sig"))]);
        let surface = Arc::new(RecordingSurface::default());
        let second = controller.run(asset(), surface).await;
        assert_eq!(second, TerminalOutcome::Succeeded);
    }

    #[tokio::test]
    async fn reentrant_run_is_a_contract_violation() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(ScriptedTransport::default());
        let controller = Arc::new(controller(dir.path().to_path_buf(), transport));

        // Hold the controller in a run that never concludes by never
        // scripting the transport and never cancelling.
        controller.active.store(true, Ordering::SeqCst);

        let reentrant = controller.clone();
        let surface = Arc::new(RecordingSurface::default());
        let result = tokio::spawn(async move { reentrant.run(asset(), surface).await }).await;
        assert!(result.unwrap_err().is_panic());
    }
}
