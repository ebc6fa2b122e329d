//! Main application state and event loop logic.
//!
//! Follows The Elm Architecture: `update` folds terminal events into state,
//! `handle_message` folds background task results, and `view` renders.

use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};
use tracing::{debug, info, trace, warn};

use crate::api::types::{Hotspot, User};
use crate::api::SonarClient;
use crate::config::Settings;
use crate::events::Event;
use crate::tasks::{ApiMessage, TaskSpawner};
use crate::ui::{AssigneeAction, AssigneeSelect, Theme};

/// The current phase of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppState {
    /// Waiting for the server connection to be validated.
    #[default]
    Connecting,
    /// The assignee select has focus.
    Selecting,
    /// An assignment request is in flight.
    Assigning,
    /// Application is in the process of exiting.
    Exiting,
}

/// Severity of the status line message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Success,
    Error,
}

/// One-line message shown under the picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub text: String,
}

/// The main application struct that holds all state.
pub struct App {
    state: AppState,
    should_quit: bool,
    hotspot_key: String,
    hotspot: Option<Hotspot>,
    /// Login of the current assignee, as last confirmed by the server.
    current_assignee: Option<String>,
    select: AssigneeSelect,
    client: Option<SonarClient>,
    spawner: TaskSpawner,
    status: Option<StatusMessage>,
    theme: Theme,
}

impl App {
    /// Create the application for one hotspot.
    pub fn new(hotspot_key: String, settings: &Settings, spawner: TaskSpawner) -> Self {
        debug!(hotspot = %hotspot_key, "Creating application");
        Self {
            state: AppState::Connecting,
            should_quit: false,
            hotspot_key,
            hotspot: None,
            current_assignee: None,
            select: AssigneeSelect::with_settings(
                settings.min_query_length,
                settings.search_debounce(),
            ),
            client: None,
            spawner,
            status: Some(StatusMessage {
                kind: StatusKind::Info,
                text: "Connecting...".to_string(),
            }),
            theme: Theme::default(),
        }
    }

    /// Returns the current application state.
    #[cfg(test)]
    pub fn state(&self) -> AppState {
        self.state
    }

    /// Whether the main loop should stop.
    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Login of the current assignee, if any.
    pub fn current_assignee(&self) -> Option<&str> {
        self.current_assignee.as_deref()
    }

    /// The status line message.
    #[cfg(test)]
    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }

    /// The assignee select widget.
    #[cfg(test)]
    pub fn select(&self) -> &AssigneeSelect {
        &self.select
    }

    fn set_status(&mut self, kind: StatusKind, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            kind,
            text: text.into(),
        });
    }

    fn quit(&mut self) {
        self.should_quit = true;
        self.state = AppState::Exiting;
    }

    /// Update the application state based on an event.
    pub fn update(&mut self, event: Event) {
        match event {
            Event::Key(key_event) => {
                trace!(key = ?key_event.code, modifiers = ?key_event.modifiers, "Key event");
                self.handle_key_event(key_event);
            }
            Event::Resize(width, height) => {
                trace!(width, height, "Terminal resize event");
            }
            Event::Tick => self.handle_tick(Instant::now()),
        }
    }

    fn handle_key_event(&mut self, key_event: KeyEvent) {
        if key_event.code == KeyCode::Char('c') && key_event.modifiers == KeyModifiers::CONTROL {
            self.quit();
            return;
        }

        match self.state {
            AppState::Connecting => {
                if key_event.code == KeyCode::Esc {
                    self.quit();
                }
            }
            AppState::Selecting => {
                if let Some(action) = self.select.handle_input(key_event) {
                    self.handle_assignee_action(action);
                }
            }
            AppState::Assigning | AppState::Exiting => {}
        }
    }

    fn handle_assignee_action(&mut self, action: AssigneeAction) {
        match action {
            AssigneeAction::Select(user) => {
                if self.hotspot.is_some()
                    && self.current_assignee.as_deref() == Some(user.login.as_str())
                {
                    self.set_status(
                        StatusKind::Info,
                        format!("Already assigned to {}", user.display_name()),
                    );
                    return;
                }
                self.start_assignment(Some(user));
            }
            AssigneeAction::Unassign => {
                // The assignee is only known once the hotspot has loaded.
                if self.hotspot.is_some() && self.current_assignee.is_none() {
                    debug!("Unassign requested but hotspot has no assignee");
                    self.set_status(StatusKind::Info, "Hotspot is already unassigned");
                    return;
                }
                self.start_assignment(None);
            }
            AssigneeAction::Cancel => {
                debug!("Assignee selection cancelled");
                self.quit();
            }
        }
    }

    fn start_assignment(&mut self, assignee: Option<User>) {
        let Some(client) = &self.client else {
            warn!("Assignment requested before the client connected");
            return;
        };

        let text = match &assignee {
            Some(user) => format!("Assigning to {}...", user.display_name()),
            None => "Unassigning...".to_string(),
        };
        self.spawner
            .spawn_assign(client, self.hotspot_key.clone(), assignee);
        self.state = AppState::Assigning;
        self.set_status(StatusKind::Info, text);
    }

    /// Release debounced searches once a client is available.
    fn handle_tick(&mut self, now: Instant) {
        let Some(client) = &self.client else {
            return;
        };
        if let Some(request) = self.select.poll_search(now) {
            self.spawner.spawn_search_users(client, request);
        }
    }

    /// Apply the result of a background task.
    pub fn handle_message(&mut self, message: ApiMessage) {
        match message {
            ApiMessage::ClientConnected(Ok(client)) => {
                info!(url = %client.base_url(), "Client connected");
                self.spawner
                    .spawn_fetch_hotspot(&client, self.hotspot_key.clone());
                self.client = Some(client);
                self.state = AppState::Selecting;
                self.set_status(StatusKind::Info, "Type a name or login to search");
            }
            ApiMessage::ClientConnected(Err(e)) => {
                warn!("Connection failed: {}", e);
                self.set_status(StatusKind::Error, format!("{} (Esc to quit)", e));
            }
            ApiMessage::HotspotFetched(Ok(hotspot)) => {
                debug!(assignee = ?hotspot.assignee, "Hotspot loaded");
                self.current_assignee = hotspot.assignee.clone();
                self.hotspot = Some(hotspot);
            }
            ApiMessage::HotspotFetched(Err(e)) => {
                warn!("Failed to load hotspot: {}", e);
                self.set_status(StatusKind::Error, e);
            }
            ApiMessage::UsersFound {
                generation,
                query,
                result,
            } => {
                let error = result.as_ref().err().cloned();
                if self.select.handle_results(generation, result) {
                    match error {
                        Some(e) => self.set_status(
                            StatusKind::Error,
                            format!("User search failed: {}", e),
                        ),
                        None => trace!(query = %query, "Applied user search results"),
                    }
                }
            }
            ApiMessage::AssigneeChanged { assignee, result } => {
                self.state = AppState::Selecting;
                match result {
                    Ok(()) => {
                        let text = match &assignee {
                            Some(user) => format!("Assigned to {}", user),
                            None => "Hotspot unassigned".to_string(),
                        };
                        info!("{}", text);
                        self.current_assignee = assignee.map(|u| u.login);
                        self.set_status(StatusKind::Success, text);
                    }
                    Err(e) => {
                        warn!("Assignment failed: {}", e);
                        self.set_status(StatusKind::Error, e);
                    }
                }
            }
        }
    }

    /// Render the application UI.
    pub fn view(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(5), // Hotspot header
                Constraint::Min(6),    // Assignee select
                Constraint::Length(1), // Status line
            ])
            .split(frame.area());

        self.render_header(frame, chunks[0]);
        self.select.render(frame, chunks[1], &self.theme);
        self.render_status(frame, chunks[2]);
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .title(format!(" Hotspot {} ", self.hotspot_key))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.accent));

        let assignee = self.current_assignee.as_deref().unwrap_or("Unassigned");
        let mut lines = vec![Line::from(vec![
            Span::styled("Assignee: ", Style::default().fg(self.theme.muted)),
            Span::styled(
                assignee,
                Style::default()
                    .fg(self.theme.warning)
                    .add_modifier(Modifier::BOLD),
            ),
        ])];
        match &self.hotspot {
            Some(hotspot) => {
                lines.push(Line::from(Span::styled(
                    format!("{}  [{}]", hotspot.location(), hotspot.status),
                    Style::default().fg(self.theme.muted),
                )));
                lines.push(Line::from(hotspot.message.as_str()));
            }
            None => lines.push(Line::from(Span::styled(
                "Loading hotspot...",
                Style::default().fg(self.theme.muted),
            ))),
        }

        frame.render_widget(
            Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
            area,
        );
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let Some(status) = &self.status else {
            return;
        };
        let color = match status.kind {
            StatusKind::Info => self.theme.muted,
            StatusKind::Success => self.theme.success,
            StatusKind::Error => self.theme.error,
        };
        frame.render_widget(
            Paragraph::new(status.text.as_str()).style(Style::default().fg(color)),
            area,
        );
    }
}
