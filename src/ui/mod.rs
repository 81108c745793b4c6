use std::path::PathBuf;

use iced::{
    widget::{button, column, progress_bar, row, text, text_input, Space},
    Element, Length,
};

use crate::application::ProgressSnapshot;

/// Main view state
pub struct FetchView {
    pub os: String,
    pub version: String,
    pub route: Option<PathBuf>,
    pub status_message: String,
    pub is_fetching: bool,
    pub snapshot: ProgressSnapshot,
}

impl Default for FetchView {
    fn default() -> Self {
        Self {
            os: "iOS".to_string(),
            version: String::new(),
            route: None,
            status_message: "Pick a GPX route, then fetch the disk image for your device"
                .to_string(),
            is_fetching: false,
            snapshot: ProgressSnapshot::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum FetchMessage {
    OsChanged(String),
    VersionChanged(String),
    ChooseRoutePressed,
    FetchPressed,
    CancelPressed,
}

impl FetchView {
    pub fn update(&mut self, message: FetchMessage) {
        match message {
            FetchMessage::OsChanged(os) => {
                self.os = os;
            }
            FetchMessage::VersionChanged(version) => {
                self.version = version;
            }
            FetchMessage::ChooseRoutePressed
            | FetchMessage::FetchPressed
            | FetchMessage::CancelPressed => {
                // Handled by the app
            }
        }
    }

    pub fn view(&self) -> Element<'_, FetchMessage> {
        if self.is_fetching {
            return self.modal_view();
        }

        let route_line = match &self.route {
            Some(path) => format!("Route: {}", path.display()),
            None => "No route loaded".to_string(),
        };

        column![
            text("DevDisk Downloader").size(32),
            Space::new().height(Length::Fixed(20.0)),
            text("Device OS:").size(16),
            text_input("iOS", &self.os)
                .on_input(FetchMessage::OsChanged)
                .padding(10),
            text("OS version:").size(16),
            text_input("e.g. 17.0", &self.version)
                .on_input(FetchMessage::VersionChanged)
                .padding(10),
            Space::new().height(Length::Fixed(10.0)),
            text(route_line).size(14),
            text(&self.status_message).size(14),
            Space::new().height(Length::Fixed(20.0)),
            row![
                button("Choose GPX route...")
                    .on_press(FetchMessage::ChooseRoutePressed)
                    .padding([10, 20]),
                button("Fetch disk image")
                    .on_press(FetchMessage::FetchPressed)
                    .padding([10, 20]),
            ]
            .spacing(10),
        ]
        .padding(20)
        .spacing(10)
        .into()
    }

    /// Blocking modal surface shown while a download run is active: one
    /// progress row per unit plus the cancel button.
    fn modal_view(&self) -> Element<'_, FetchMessage> {
        let mut units = column![].spacing(8);
        for unit in &self.snapshot.units {
            let detail = match unit.bytes_expected {
                Some(expected) => format!("{} / {} bytes", unit.bytes_received, expected),
                None => format!("{} bytes", unit.bytes_received),
            };
            units = units.push(
                column![
                    text(unit.label.clone()).size(14),
                    progress_bar(0.0..=1.0, unit.fraction),
                    text(detail).size(12),
                ]
                .spacing(4),
            );
        }

        column![
            text("Downloading developer disk image").size(24),
            Space::new().height(Length::Fixed(10.0)),
            text(format!("{:.0}%", self.snapshot.fraction * 100.0)).size(16),
            units,
            Space::new().height(Length::Fixed(20.0)),
            button("Cancel")
                .on_press(FetchMessage::CancelPressed)
                .padding([10, 20]),
        ]
        .padding(20)
        .spacing(10)
        .into()
    }
}
