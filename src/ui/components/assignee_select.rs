//! Assignee select component.
//!
//! A search box backed by the remote user directory. Typing schedules a
//! debounced search, results are shown as a suggestion list that can be
//! walked with the arrow keys, and Enter confirms the highlighted user.
//! Clearing the box asks for the hotspot to be unassigned.
//!
//! The component never talks to the network itself: the parent polls
//! [`AssigneeSelect::poll_search`] on every tick, runs the returned
//! [`SearchRequest`] in the background and hands the outcome back through
//! [`AssigneeSelect::handle_results`]. Every edit of the query bumps a
//! generation counter, and results tagged with an older generation are
//! dropped.

use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};
use tracing::{debug, trace, warn};

use crate::api::types::User;
use crate::ui::theme::Theme;

/// Queries shorter than this never reach the server.
pub const DEFAULT_MIN_QUERY_LENGTH: usize = 2;

/// Quiet period after the last keystroke before a search is issued.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Action resulting from assignee select input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssigneeAction {
    /// Assign the hotspot to this user.
    Select(User),
    /// Remove the current assignee.
    Unassign,
    /// Close the picker without changing anything.
    Cancel,
}

/// A user search that is due to be sent to the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Generation the results must be tagged with.
    pub generation: u64,
    /// The settled query.
    pub query: String,
}

#[derive(Debug)]
struct PendingSearch {
    query: String,
    deadline: Instant,
}

/// Assignee select component.
#[derive(Debug)]
pub struct AssigneeSelect {
    /// Text typed by the user.
    query: String,
    /// Results of the last completed search.
    suggested_users: Vec<User>,
    /// Index into `suggested_users`.
    highlighted: Option<usize>,
    /// Whether the suggestion list is shown.
    open: bool,
    /// Whether a search is scheduled or in flight.
    loading: bool,
    /// Bumped on every query edit; results from older generations are stale.
    generation: u64,
    /// Search waiting for the debounce deadline.
    pending: Option<PendingSearch>,
    min_query_length: usize,
    debounce: Duration,
}

impl AssigneeSelect {
    /// Create a new assignee select with default thresholds.
    pub fn new() -> Self {
        Self::with_settings(DEFAULT_MIN_QUERY_LENGTH, DEFAULT_DEBOUNCE)
    }

    /// Create a new assignee select with explicit thresholds.
    ///
    /// A minimum length of zero is treated as one.
    pub fn with_settings(min_query_length: usize, debounce: Duration) -> Self {
        Self {
            query: String::new(),
            suggested_users: Vec::new(),
            highlighted: None,
            open: false,
            loading: false,
            generation: 0,
            pending: None,
            min_query_length: min_query_length.max(1),
            debounce,
        }
    }

    /// The current query text.
    #[cfg(test)]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Users returned by the last accepted search.
    #[cfg(test)]
    pub fn suggested_users(&self) -> &[User] {
        &self.suggested_users
    }

    /// The highlighted suggestion, if any.
    pub fn highlighted(&self) -> Option<&User> {
        self.highlighted.and_then(|i| self.suggested_users.get(i))
    }

    /// Whether the suggestion list is visible.
    #[cfg(test)]
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Whether a search is scheduled or in flight.
    #[cfg(test)]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Handle a new value of the query text.
    ///
    /// Short queries reset the suggestions without searching. An empty
    /// query additionally returns [`AssigneeAction::Unassign`]. Anything
    /// longer marks the component as loading and schedules a search that
    /// [`poll_search`](Self::poll_search) releases once the debounce
    /// period has passed.
    pub fn handle_search(&mut self, query: &str) -> Option<AssigneeAction> {
        self.query = query.to_string();
        self.generation += 1;

        if query.chars().count() < self.min_query_length {
            trace!(generation = self.generation, "Query too short, clearing suggestions");
            self.reset_suggestions();
            return query.is_empty().then_some(AssigneeAction::Unassign);
        }

        self.loading = true;
        self.pending = Some(PendingSearch {
            query: query.to_string(),
            deadline: Instant::now() + self.debounce,
        });
        None
    }

    /// Release the scheduled search if its debounce deadline has passed.
    pub fn poll_search(&mut self, now: Instant) -> Option<SearchRequest> {
        if self.pending.as_ref().map_or(true, |p| p.deadline > now) {
            return None;
        }

        let pending = self.pending.take()?;
        debug!(query = %pending.query, generation = self.generation, "Issuing user search");
        Some(SearchRequest {
            generation: self.generation,
            query: pending.query,
        })
    }

    /// Apply the outcome of a search.
    ///
    /// Results for any generation but the latest are ignored and `false` is
    /// returned. A failed search is shown as an empty result set.
    pub fn handle_results(&mut self, generation: u64, result: Result<Vec<User>, String>) -> bool {
        if generation != self.generation || self.pending.is_some() {
            debug!(
                generation,
                latest = self.generation,
                "Discarding stale user search results"
            );
            return false;
        }

        let users = result.unwrap_or_else(|e| {
            warn!("User search failed: {}", e);
            Vec::new()
        });

        self.loading = false;
        self.open = !users.is_empty();
        self.highlighted = if users.is_empty() { None } else { Some(0) };
        self.suggested_users = users;
        true
    }

    /// Move the highlight to the next suggestion, wrapping to the first.
    pub fn highlight_next(&mut self) {
        let len = self.suggested_users.len();
        if len == 0 {
            self.highlighted = None;
            return;
        }
        self.highlighted = Some(match self.highlighted {
            Some(i) => (i + 1) % len,
            None => 0,
        });
    }

    /// Move the highlight to the previous suggestion, wrapping to the last.
    pub fn highlight_previous(&mut self) {
        let len = self.suggested_users.len();
        if len == 0 {
            self.highlighted = None;
            return;
        }
        self.highlighted = Some(match self.highlighted {
            Some(i) => (i + len - 1) % len,
            None => len - 1,
        });
    }

    /// Handle keyboard input.
    ///
    /// Navigation keys (arrows, Ctrl+N/Ctrl+P, Enter, Esc) are always
    /// consumed and never edit the query. Printable characters and
    /// Backspace edit the query and go through
    /// [`handle_search`](Self::handle_search).
    pub fn handle_input(&mut self, key: KeyEvent) -> Option<AssigneeAction> {
        match (key.code, key.modifiers) {
            (KeyCode::Down, _) | (KeyCode::Char('n'), KeyModifiers::CONTROL) => {
                self.highlight_next();
                None
            }
            (KeyCode::Up, _) | (KeyCode::Char('p'), KeyModifiers::CONTROL) => {
                self.highlight_previous();
                None
            }
            (KeyCode::Enter, _) => {
                let user = self.highlighted()?.clone();
                debug!(login = %user.login, "Assignee selected");
                self.query.clear();
                self.generation += 1;
                self.reset_suggestions();
                Some(AssigneeAction::Select(user))
            }
            (KeyCode::Esc, _) => Some(AssigneeAction::Cancel),
            (KeyCode::Backspace, _) => {
                if self.query.is_empty() {
                    return None;
                }
                let mut query = self.query.clone();
                query.pop();
                self.handle_search(&query)
            }
            (KeyCode::Char(c), KeyModifiers::NONE | KeyModifiers::SHIFT) => {
                let mut query = self.query.clone();
                query.push(c);
                self.handle_search(&query)
            }
            _ => None,
        }
    }

    fn reset_suggestions(&mut self) {
        self.suggested_users.clear();
        self.highlighted = None;
        self.open = false;
        self.loading = false;
        self.pending = None;
    }

    /// Render the assignee select into `area`.
    pub fn render(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let block = Block::default()
            .title(" Assign to ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.accent));

        let inner = block.inner(area);
        frame.render_widget(block, area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2), // Search box
                Constraint::Min(3),    // Suggestions
                Constraint::Length(1), // Help text
            ])
            .split(inner);

        let search_line = if self.query.is_empty() {
            Line::from(vec![
                Span::styled("> ", Style::default().fg(theme.accent)),
                Span::styled("Search for a user...", Style::default().fg(theme.muted)),
            ])
        } else {
            Line::from(vec![
                Span::styled("> ", Style::default().fg(theme.accent)),
                Span::styled(self.query.as_str(), Style::default().fg(theme.fg)),
                Span::styled("▏", Style::default().fg(theme.accent)),
            ])
        };
        frame.render_widget(Paragraph::new(search_line), chunks[0]);

        if self.open {
            let items: Vec<ListItem> = self
                .suggested_users
                .iter()
                .map(|user| {
                    let detail = match &user.email {
                        Some(email) => format!("  {} <{}>", user.login, email),
                        None => format!("  {}", user.login),
                    };
                    let mut spans = vec![
                        Span::raw(user.display_name().to_string()),
                        Span::styled(detail, Style::default().fg(theme.muted)),
                    ];
                    if !user.active {
                        spans.push(Span::styled(" (deactivated)", Style::default().fg(theme.error)));
                    }
                    ListItem::new(Line::from(spans))
                })
                .collect();

            let list = List::new(items)
                .highlight_style(
                    Style::default()
                        .bg(theme.highlight_bg)
                        .add_modifier(Modifier::BOLD),
                )
                .highlight_symbol("> ");

            let mut state = ListState::default();
            state.select(self.highlighted);
            frame.render_stateful_widget(list, chunks[1], &mut state);
        } else {
            let hint = if self.loading {
                "Searching users...".to_string()
            } else if self.query.chars().count() < self.min_query_length {
                format!("Type at least {} characters", self.min_query_length)
            } else {
                "No users found".to_string()
            };
            frame.render_widget(
                Paragraph::new(hint)
                    .style(Style::default().fg(theme.muted))
                    .alignment(Alignment::Center),
                chunks[1],
            );
        }

        let help_text = Line::from(vec![
            Span::styled("↑/↓", Style::default().fg(theme.warning)),
            Span::raw(": navigate  "),
            Span::styled("Enter", Style::default().fg(theme.success)),
            Span::raw(": assign  "),
            Span::styled("clear", Style::default().fg(theme.warning)),
            Span::raw(": unassign  "),
            Span::styled("Esc", Style::default().fg(theme.error)),
            Span::raw(": cancel"),
        ]);
        frame.render_widget(
            Paragraph::new(help_text).alignment(Alignment::Center),
            chunks[2],
        );
    }
}

impl Default for AssigneeSelect {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};

    fn mock_user(login: &str) -> User {
        User {
            login: login.to_string(),
            name: format!("User {}", login),
            email: None,
            avatar: None,
            active: true,
        }
    }

    fn mock_users(count: usize) -> Vec<User> {
        (1..=count).map(|i| mock_user(&i.to_string())).collect()
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    /// A select with no debounce so searches are due immediately.
    fn immediate_select() -> AssigneeSelect {
        AssigneeSelect::with_settings(DEFAULT_MIN_QUERY_LENGTH, Duration::ZERO)
    }

    /// Run a full search cycle for `query` answered with `users`.
    fn search_with(select: &mut AssigneeSelect, query: &str, users: Vec<User>) {
        select.handle_search(query);
        let request = select.poll_search(Instant::now()).unwrap();
        assert!(select.handle_results(request.generation, Ok(users)));
    }

    #[test]
    fn test_new_select() {
        let select = AssigneeSelect::new();
        assert!(select.query().is_empty());
        assert!(select.suggested_users().is_empty());
        assert!(select.highlighted().is_none());
        assert!(!select.is_open());
        assert!(!select.is_loading());
    }

    #[test]
    fn test_keydown_scenario() {
        let users = mock_users(3);
        let mut select = immediate_select();

        // Up on an empty list leaves nothing highlighted
        assert_eq!(select.handle_input(key(KeyCode::Up)), None);
        assert!(select.highlighted().is_none());

        select.suggested_users = users.clone();

        select.handle_input(key(KeyCode::Down));
        assert_eq!(select.highlighted(), Some(&users[0]));

        // Wraps around to the last
        select.handle_input(key(KeyCode::Up));
        assert_eq!(select.highlighted(), Some(&users[2]));

        // Wraps around to the first
        select.handle_input(key(KeyCode::Down));
        assert_eq!(select.highlighted(), Some(&users[0]));

        select.handle_input(key(KeyCode::Down));
        assert_eq!(select.highlighted(), Some(&users[1]));

        let action = select.handle_input(key(KeyCode::Enter));
        assert_eq!(action, Some(AssigneeAction::Select(users[1].clone())));
    }

    #[test]
    fn test_search_scenario() {
        let users = mock_users(3);
        let mut select = immediate_select();

        assert_eq!(select.handle_search("j"), None);
        assert!(select.poll_search(Instant::now()).is_none());
        assert!(!select.is_open());
        assert!(!select.is_loading());

        assert_eq!(select.handle_search("jo"), None);
        assert!(select.is_loading());
        let request = select.poll_search(Instant::now()).unwrap();
        assert_eq!(request.query, "jo");

        assert!(select.handle_results(request.generation, Ok(users.clone())));
        assert_eq!(select.highlighted(), Some(&users[0]));
        assert!(!select.is_loading());
        assert!(select.is_open());
        assert_eq!(select.suggested_users().len(), 3);

        assert_eq!(select.handle_search(""), Some(AssigneeAction::Unassign));
        assert!(select.poll_search(Instant::now()).is_none());
        assert!(!select.is_open());
        assert!(select.suggested_users().is_empty());
    }

    #[test]
    fn test_short_query_counts_characters_not_bytes() {
        let mut select = immediate_select();

        // One character, two bytes
        select.handle_search("é");
        assert!(select.poll_search(Instant::now()).is_none());

        select.handle_search("éa");
        assert!(select.poll_search(Instant::now()).is_some());
    }

    #[test]
    fn test_short_query_clears_previous_results() {
        let mut select = immediate_select();
        search_with(&mut select, "jo", mock_users(2));
        assert!(select.is_open());

        assert_eq!(select.handle_search("j"), None);
        assert!(!select.is_open());
        assert!(select.suggested_users().is_empty());
        assert!(select.highlighted().is_none());
    }

    #[test]
    fn test_debounce_holds_search_until_deadline() {
        let mut select = AssigneeSelect::with_settings(2, Duration::from_secs(60));
        let start = Instant::now();

        select.handle_search("jo");
        select.handle_search("joh");
        select.handle_search("john");
        assert!(select.is_loading());
        assert!(select.poll_search(start).is_none());

        let request = select.poll_search(start + Duration::from_secs(61)).unwrap();
        assert_eq!(request.query, "john");

        // Only one request per settled query
        assert!(select.poll_search(start + Duration::from_secs(120)).is_none());
    }

    #[test]
    fn test_stale_results_discarded() {
        let mut select = immediate_select();

        select.handle_search("jo");
        let first = select.poll_search(Instant::now()).unwrap();
        select.handle_search("joe");
        let second = select.poll_search(Instant::now()).unwrap();
        assert!(second.generation > first.generation);

        let latest = vec![mock_user("joe")];
        assert!(select.handle_results(second.generation, Ok(latest.clone())));

        // The older response arrives late and must not win
        assert!(!select.handle_results(first.generation, Ok(mock_users(3))));
        assert_eq!(select.suggested_users(), latest.as_slice());
        assert_eq!(select.highlighted(), Some(&latest[0]));
    }

    #[test]
    fn test_results_ignored_while_newer_search_pending() {
        let mut select = AssigneeSelect::with_settings(2, Duration::from_secs(60));
        let start = Instant::now();

        select.handle_search("jo");
        let request = select.poll_search(start + Duration::from_secs(61)).unwrap();

        // A newer keystroke is still waiting for its debounce
        select.handle_search("jon");
        assert!(!select.handle_results(request.generation, Ok(mock_users(3))));
        assert!(select.is_loading());
        assert!(!select.is_open());
    }

    #[test]
    fn test_results_after_short_query_discarded() {
        let mut select = immediate_select();
        select.handle_search("jo");
        let request = select.poll_search(Instant::now()).unwrap();

        select.handle_search("j");
        assert!(!select.handle_results(request.generation, Ok(mock_users(3))));
        assert!(!select.is_open());
        assert!(!select.is_loading());
    }

    #[test]
    fn test_failed_search_treated_as_empty() {
        let mut select = immediate_select();
        search_with(&mut select, "jo", mock_users(2));

        select.handle_search("jon");
        let request = select.poll_search(Instant::now()).unwrap();
        assert!(select.handle_results(request.generation, Err("HTTP 500".to_string())));

        assert!(!select.is_open());
        assert!(!select.is_loading());
        assert!(select.suggested_users().is_empty());
        assert!(select.highlighted().is_none());
    }

    #[test]
    fn test_empty_results_close_list() {
        let mut select = immediate_select();
        search_with(&mut select, "zz", Vec::new());
        assert!(!select.is_open());
        assert!(!select.is_loading());
        assert!(select.highlighted().is_none());
    }

    #[test]
    fn test_down_n_times_is_modular() {
        for k in 1..=4 {
            let users = mock_users(k);
            let mut select = immediate_select();
            search_with(&mut select, "us", users.clone());

            for n in 0..(3 * k) {
                assert_eq!(select.highlighted(), Some(&users[n % k]));
                select.handle_input(key(KeyCode::Down));
            }
        }
    }

    #[test]
    fn test_up_is_modular() {
        let k = 4;
        let users = mock_users(k);
        let mut select = immediate_select();
        search_with(&mut select, "us", users.clone());

        for i in 0..k {
            select.highlighted = Some(i);
            select.handle_input(key(KeyCode::Up));
            assert_eq!(select.highlighted(), Some(&users[(i + k - 1) % k]));
        }
    }

    #[test]
    fn test_ctrl_n_and_ctrl_p_navigate() {
        let users = mock_users(2);
        let mut select = immediate_select();
        search_with(&mut select, "us", users.clone());

        select.handle_input(KeyEvent::new(KeyCode::Char('n'), KeyModifiers::CONTROL));
        assert_eq!(select.highlighted(), Some(&users[1]));
        select.handle_input(KeyEvent::new(KeyCode::Char('p'), KeyModifiers::CONTROL));
        assert_eq!(select.highlighted(), Some(&users[0]));
        assert_eq!(select.query(), "us");
    }

    #[test]
    fn test_enter_without_highlight_is_noop() {
        let mut select = immediate_select();
        assert_eq!(select.handle_input(key(KeyCode::Enter)), None);

        select.handle_search("jo");
        assert_eq!(select.handle_input(key(KeyCode::Enter)), None);
        assert!(select.is_loading());
    }

    #[test]
    fn test_enter_selects_once_and_resets() {
        let users = mock_users(3);
        let mut select = immediate_select();
        search_with(&mut select, "us", users.clone());

        let action = select.handle_input(key(KeyCode::Enter));
        assert_eq!(action, Some(AssigneeAction::Select(users[0].clone())));

        assert!(!select.is_open());
        assert!(select.highlighted().is_none());
        assert!(select.query().is_empty());
        assert_eq!(select.handle_input(key(KeyCode::Enter)), None);
    }

    #[test]
    fn test_navigation_keys_do_not_edit_query() {
        let mut select = immediate_select();
        search_with(&mut select, "jo", mock_users(2));

        select.handle_input(key(KeyCode::Down));
        select.handle_input(key(KeyCode::Up));
        assert_eq!(select.query(), "jo");
    }

    #[test]
    fn test_typing_schedules_search() {
        let mut select = immediate_select();

        select.handle_input(key(KeyCode::Char('j')));
        assert!(select.poll_search(Instant::now()).is_none());

        select.handle_input(KeyEvent::new(KeyCode::Char('O'), KeyModifiers::SHIFT));
        assert_eq!(select.query(), "jO");
        let request = select.poll_search(Instant::now()).unwrap();
        assert_eq!(request.query, "jO");
    }

    #[test]
    fn test_backspace_to_empty_unassigns() {
        let mut select = immediate_select();
        select.handle_input(key(KeyCode::Char('j')));

        let action = select.handle_input(key(KeyCode::Backspace));
        assert_eq!(action, Some(AssigneeAction::Unassign));
        assert!(select.query().is_empty());

        // Nothing left to delete
        assert_eq!(select.handle_input(key(KeyCode::Backspace)), None);
    }

    #[test]
    fn test_escape_cancels() {
        let mut select = immediate_select();
        assert_eq!(
            select.handle_input(key(KeyCode::Esc)),
            Some(AssigneeAction::Cancel)
        );
    }

    #[test]
    fn test_zero_min_length_still_unassigns_on_empty() {
        let mut select = AssigneeSelect::with_settings(0, Duration::ZERO);
        assert_eq!(select.handle_search(""), Some(AssigneeAction::Unassign));
        assert!(select.poll_search(Instant::now()).is_none());

        select.handle_search("j");
        assert!(select.poll_search(Instant::now()).is_some());
    }

    #[test]
    fn test_render_shows_suggestions() {
        let mut select = immediate_select();
        search_with(&mut select, "jo", vec![mock_user("jo"), mock_user("joe")]);

        let backend = TestBackend::new(60, 12);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal
            .draw(|frame| select.render(frame, frame.area(), &Theme::default()))
            .unwrap();

        let buffer = terminal.backend().buffer();
        let content: String = buffer.content().iter().map(|c| c.symbol()).collect();
        assert!(content.contains("User jo"));
        assert!(content.contains("User joe"));
    }

    #[test]
    fn test_render_short_query_hint() {
        let select = immediate_select();

        let backend = TestBackend::new(60, 12);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal
            .draw(|frame| select.render(frame, frame.area(), &Theme::default()))
            .unwrap();

        let content: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect();
        assert!(content.contains("Type at least 2 characters"));
    }
}
