use std::path::PathBuf;
use std::sync::Arc;

use futures::StreamExt;
use iced::Task;

use crate::api::{ApiConfig, HttpTransport, ManifestClient};
use crate::application::{
    ChannelSurface, DiskPreparer, ModalSurface, OrchestrationController, SurfaceEvent,
};
use crate::domain::{DiskImageAsset, TerminalOutcome};
use crate::ui::{FetchMessage, FetchView};

pub struct FetchApp {
    view: FetchView,
    controller: Arc<OrchestrationController>,
    // Kept for the duration of one run so the cancel button can reach it
    surface: Option<Arc<ChannelSurface>>,
}

impl Default for FetchApp {
    fn default() -> Self {
        Self::new()
    }
}

impl FetchApp {
    pub fn new() -> Self {
        let manifest_client = ManifestClient::new(ApiConfig::default());
        let controller = Arc::new(OrchestrationController::new(
            Arc::new(manifest_client),
            Arc::new(DiskPreparer::with_default_root()),
            Arc::new(HttpTransport),
        ));

        Self {
            view: FetchView::default(),
            controller,
            surface: None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    UiMessage(FetchMessage),
    /// Selected GPX route, if any
    RouteChosen(Option<PathBuf>),
    /// Modal surface lifecycle and progress events
    Surface(SurfaceEvent),
    /// The single terminal outcome of one orchestration run
    RunFinished(TerminalOutcome),
}

pub fn update(app: &mut FetchApp, message: Message) -> Task<Message> {
    match message {
        Message::UiMessage(ui_msg) => {
            app.view.update(ui_msg.clone());

            match ui_msg {
                FetchMessage::ChooseRoutePressed => {
                    if !app.view.is_fetching {
                        return Task::perform(
                            async {
                                rfd::AsyncFileDialog::new()
                                    .add_filter("GPX route", &["gpx"])
                                    .pick_file()
                                    .await
                                    .map(|handle| handle.path().to_path_buf())
                            },
                            Message::RouteChosen,
                        );
                    }
                }
                FetchMessage::FetchPressed => {
                    if !app.view.is_fetching {
                        return start_fetch(app);
                    }
                }
                FetchMessage::CancelPressed => {
                    // Signal cancellation immediately; the runner unwinds on
                    // its own and still delivers the one terminal outcome.
                    if let Some(surface) = &app.surface {
                        surface.request_cancel();
                        app.view.status_message = "Cancelling...".to_string();
                    }
                }
                _ => {}
            }
        }
        Message::RouteChosen(path) => match path {
            Some(path) => {
                app.view.status_message = format!("Route loaded: {}", path.display());
                app.view.route = Some(path);
            }
            None => {
                app.view.status_message = "No route selected".to_string();
            }
        },
        Message::Surface(event) => match event {
            SurfaceEvent::Shown => {
                app.view.is_fetching = true;
            }
            SurfaceEvent::Progress(snapshot) => {
                app.view.snapshot = snapshot;
            }
            SurfaceEvent::Dismissed => {
                // Final state is handled by RunFinished
            }
        },
        Message::RunFinished(outcome) => {
            app.view.is_fetching = false;
            app.view.snapshot = Default::default();
            app.surface = None;
            app.view.status_message = match outcome {
                TerminalOutcome::Succeeded => {
                    "Disk image ready, device can be driven".to_string()
                }
                TerminalOutcome::Failed(_) => {
                    "Download failed, please try again".to_string()
                }
                TerminalOutcome::Cancelled => "Download cancelled".to_string(),
            };
        }
    }
    Task::none()
}

fn start_fetch(app: &mut FetchApp) -> Task<Message> {
    if !crate::utils::is_valid_version(&app.view.version) {
        app.view.status_message = "Enter an OS version like 17.0".to_string();
        return Task::none();
    }

    let asset = DiskImageAsset::new(app.view.os.trim(), app.view.version.trim());
    app.view.status_message = format!("Fetching disk image for {} {}", asset.os, asset.version);
    // Guard against a second press before the surface's Shown event arrives;
    // a reentrant run is a contract violation in the controller.
    app.view.is_fetching = true;

    let (surface, events) = ChannelSurface::new();
    app.surface = Some(surface.clone());

    let controller = app.controller.clone();
    let run_surface: Arc<dyn ModalSurface> = surface;

    Task::batch([
        Task::stream(events.map(Message::Surface)),
        Task::perform(
            async move { controller.run(asset, run_surface).await },
            Message::RunFinished,
        ),
    ])
}

pub fn view(app: &FetchApp) -> iced::Element<'_, Message> {
    app.view.view().map(Message::UiMessage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_fetch_press_while_running_starts_no_second_run() {
        let mut app = FetchApp::new();
        app.view.version = "17.0".to_string();

        let _task = update(&mut app, Message::UiMessage(FetchMessage::FetchPressed));
        assert!(app.view.is_fetching);
        let first_surface = app.surface.clone().expect("run should hold a surface");

        // A rapid second press must hit the guard, not the controller.
        let _task = update(&mut app, Message::UiMessage(FetchMessage::FetchPressed));
        assert!(Arc::ptr_eq(
            &first_surface,
            app.surface.as_ref().expect("run surface replaced")
        ));
    }

    #[test]
    fn invalid_version_does_not_start_a_run() {
        let mut app = FetchApp::new();
        app.view.version = "latest".to_string();

        let _task = update(&mut app, Message::UiMessage(FetchMessage::FetchPressed));
        assert!(!app.view.is_fetching);
        assert!(app.surface.is_none());
    }
}
