use std::sync::Mutex;

use futures::channel::mpsc;

use super::progress::ProgressSnapshot;

pub type CancelCallback = Box<dyn Fn() + Send + Sync>;

/// Opaque modal capability the orchestration core drives: something that can
/// be shown and dismissed, render progress, and emit a user-cancel event.
/// The desktop app implements it with `ChannelSurface`; tests use doubles.
pub trait ModalSurface: Send + Sync {
    fn show(&self);
    fn dismiss(&self);
    fn render(&self, snapshot: &ProgressSnapshot);
    fn on_cancel(&self, callback: CancelCallback);
}

/// Surface lifecycle events, as consumed by the UI event loop.
#[derive(Debug, Clone)]
pub enum SurfaceEvent {
    Shown,
    Progress(ProgressSnapshot),
    Dismissed,
}

/// Bridges the core's surface calls onto a message stream the iced runtime
/// can subscribe to. The cancel button routes back in via `request_cancel`.
pub struct ChannelSurface {
    events: mpsc::UnboundedSender<SurfaceEvent>,
    cancel: Mutex<Option<CancelCallback>>,
}

impl ChannelSurface {
    pub fn new() -> (std::sync::Arc<Self>, mpsc::UnboundedReceiver<SurfaceEvent>) {
        let (events, receiver) = mpsc::unbounded();
        (
            std::sync::Arc::new(Self {
                events,
                cancel: Mutex::new(None),
            }),
            receiver,
        )
    }

    /// Invoked by the UI when the user presses Cancel. Signals the run's
    /// cancellation immediately; the runner unwinds on its own schedule.
    pub fn request_cancel(&self) {
        if let Some(callback) = &*self.cancel.lock().expect("cancel slot poisoned") {
            callback();
        }
    }

    fn send(&self, event: SurfaceEvent) {
        // The UI side may already be gone during teardown.
        let _ = self.events.unbounded_send(event);
    }
}

impl ModalSurface for ChannelSurface {
    fn show(&self) {
        self.send(SurfaceEvent::Shown);
    }

    fn dismiss(&self) {
        self.send(SurfaceEvent::Dismissed);
    }

    fn render(&self, snapshot: &ProgressSnapshot) {
        self.send(SurfaceEvent::Progress(snapshot.clone()));
    }

    fn on_cancel(&self, callback: CancelCallback) {
        *self.cancel.lock().expect("cancel slot poisoned") = Some(callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn forwards_lifecycle_events_in_order() {
        let (surface, mut events) = ChannelSurface::new();
        surface.show();
        surface.render(&ProgressSnapshot::default());
        surface.dismiss();

        assert!(matches!(events.next().await, Some(SurfaceEvent::Shown)));
        assert!(matches!(events.next().await, Some(SurfaceEvent::Progress(_))));
        assert!(matches!(events.next().await, Some(SurfaceEvent::Dismissed)));
    }

    #[tokio::test]
    async fn request_cancel_fires_registered_callback() {
        let (surface, _events) = ChannelSurface::new();
        let fired = Arc::new(AtomicBool::new(false));

        surface.request_cancel(); // no callback yet, must not panic

        let flag = fired.clone();
        surface.on_cancel(Box::new(move || flag.store(true, Ordering::SeqCst)));
        surface.request_cancel();
        assert!(fired.load(Ordering::SeqCst));
    }
}
