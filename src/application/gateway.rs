use std::sync::Mutex;

use tokio::sync::oneshot;
use tracing::warn;

use super::surface::ModalSurface;
use crate::domain::TerminalOutcome;

/// One-shot bridge between the background workflow and the caller blocked on
/// the modal. `present_and_await` suspends exactly one caller until
/// `deliver` fires exactly once from any task; the oneshot wake is what
/// marshals the outcome back to the waiting context.
///
/// Delivering twice, or awaiting twice, is a programming defect and panics;
/// it is never silently swallowed.
pub struct ModalGateway {
    sender: Mutex<Option<oneshot::Sender<TerminalOutcome>>>,
    receiver: Mutex<Option<oneshot::Receiver<TerminalOutcome>>>,
}

impl Default for ModalGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl ModalGateway {
    pub fn new() -> Self {
        let (sender, receiver) = oneshot::channel();
        Self {
            sender: Mutex::new(Some(sender)),
            receiver: Mutex::new(Some(receiver)),
        }
    }

    /// Show the surface, suspend until the terminal outcome arrives, dismiss
    /// the surface, and hand the outcome back. This is the only blocking
    /// point the orchestration exposes to its caller.
    pub async fn present_and_await(&self, surface: &dyn ModalSurface) -> TerminalOutcome {
        let receiver = self
            .receiver
            .lock()
            .expect("gateway receiver slot poisoned")
            .take()
            .unwrap_or_else(|| panic!("modal wait entered twice for one run"));

        surface.show();
        let outcome = match receiver.await {
            Ok(outcome) => outcome,
            Err(_) => panic!("terminal outcome sender dropped without delivering"),
        };
        surface.dismiss();
        outcome
    }

    /// Callable from the workflow runner or the user-cancel path, from any
    /// task. At-most-once: a second call for the same run panics.
    pub fn deliver(&self, outcome: TerminalOutcome) {
        let sender = self
            .sender
            .lock()
            .expect("gateway sender slot poisoned")
            .take()
            .unwrap_or_else(|| panic!("terminal outcome delivered twice"));

        if sender.send(outcome).is_err() {
            // Only possible if the waiting side was torn down mid-run.
            warn!("terminal outcome delivered but no modal wait was active");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::RecordingSurface;
    use crate::domain::FailureReason;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn deliver_unblocks_the_waiter_with_the_outcome() {
        let gateway = Arc::new(ModalGateway::new());
        let surface = RecordingSurface::default();

        let background = gateway.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            background.deliver(TerminalOutcome::Succeeded);
        });

        let outcome = gateway.present_and_await(&surface).await;
        assert_eq!(outcome, TerminalOutcome::Succeeded);
        assert_eq!(*surface.shown.lock().unwrap(), 1);
        assert_eq!(*surface.dismissed.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn carries_failure_outcomes_unchanged() {
        let gateway = ModalGateway::new();
        let surface = RecordingSurface::default();

        gateway.deliver(TerminalOutcome::Failed(FailureReason::Transfer(
            "request failed: 503".to_string(),
        )));
        let outcome = gateway.present_and_await(&surface).await;
        assert!(matches!(outcome, TerminalOutcome::Failed(_)));
    }

    #[tokio::test]
    #[should_panic(expected = "terminal outcome delivered twice")]
    async fn second_delivery_is_a_contract_violation() {
        let gateway = ModalGateway::new();
        gateway.deliver(TerminalOutcome::Succeeded);
        gateway.deliver(TerminalOutcome::Cancelled);
    }

    #[tokio::test]
    #[should_panic(expected = "modal wait entered twice")]
    async fn second_wait_is_a_contract_violation() {
        let gateway = ModalGateway::new();
        let surface = RecordingSurface::default();
        gateway.deliver(TerminalOutcome::Succeeded);
        let _ = gateway.present_and_await(&surface).await;
        let _ = gateway.present_and_await(&surface).await;
    }
}
