use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::backend::{BackendError, Health, HttpBackend, QueryReply};
use crate::chat::{Chat, SubmitError};

pub const SUGGESTIONS: [&str; 6] = [
    "What foods are best for gut health?",
    "How can I improve my digestion naturally?",
    "What are signs of an unhealthy gut?",
    "Should I take probiotics?",
    "How does stress affect gut health?",
    "What is the gut-brain connection?",
];

/// Most input lines shown before the box starts scrolling
pub const MAX_INPUT_LINES: u16 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Input,
    Suggestions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendStatus {
    Online,
    Degraded(String),
    Offline,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub struct App {
    pub should_quit: bool,
    pub focus: FocusPane,
    pub endpoint: String,

    // Conversation
    pub chat: Chat,
    pub exchange_task: Option<JoinHandle<Result<QueryReply, BackendError>>>,

    // Input box
    pub input: String,
    pub input_cursor: usize, // cursor position in input, in chars

    // Transcript viewport, sizes updated during render
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub chat_total_lines: u16,
    pub follow_bottom: bool,
    pub chat_area: Option<Rect>,

    pub suggestion_state: ListState,

    // Header indicator
    pub backend_status: BackendStatus,
    pub health_task: Option<JoinHandle<Result<Health, BackendError>>>,

    // Animation state
    pub animation_frame: u8, // 0-2 for typing dots
}

impl App {
    pub fn new(chat: Chat, endpoint: String) -> Self {
        let mut suggestion_state = ListState::default();
        suggestion_state.select(Some(0));

        Self {
            should_quit: false,
            focus: FocusPane::Input,
            endpoint,

            chat,
            exchange_task: None,

            input: String::new(),
            input_cursor: 0,

            chat_scroll: 0,
            chat_height: 0,
            chat_total_lines: 0,
            follow_bottom: true,
            chat_area: None,

            suggestion_state,

            backend_status: BackendStatus::Online,
            health_task: None,

            animation_frame: 0,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.chat.is_loading()
    }

    /// Whether the input box would accept a submission right now
    pub fn can_submit(&self) -> bool {
        !self.is_loading() && !self.input.trim().is_empty()
    }

    /// Submit the trimmed input box contents
    pub fn submit_input(&mut self) -> bool {
        if !self.can_submit() {
            return false;
        }

        let text = self.input.trim().to_string();
        if self.send(&text) {
            self.input.clear();
            self.input_cursor = 0;
            true
        } else {
            false
        }
    }

    /// Send the highlighted suggested prompt
    pub fn submit_suggestion(&mut self) -> bool {
        if !self.chat.shows_suggestions() {
            return false;
        }

        let Some(question) = self
            .suggestion_state
            .selected()
            .and_then(|i| SUGGESTIONS.get(i))
        else {
            return false;
        };

        let sent = self.send(question);
        if sent {
            self.focus = FocusPane::Input;
        }
        sent
    }

    /// Start an exchange and run the request on a background task
    fn send(&mut self, text: &str) -> bool {
        match self.chat.begin(text) {
            Ok(pending) => {
                info!(session_id = %pending.request().session_id, endpoint = %self.endpoint, "sending query");
                self.exchange_task = Some(tokio::spawn(pending.run()));
                self.follow_bottom = true;
                true
            }
            Err(SubmitError::Busy) => {
                warn!("submission ignored while an exchange is in flight");
                false
            }
        }
    }

    /// Settle the exchange once its task has finished
    pub async fn poll_exchange(&mut self) {
        let finished = self
            .exchange_task
            .as_ref()
            .is_some_and(|task| task.is_finished());
        if !finished {
            return;
        }

        if let Some(task) = self.exchange_task.take() {
            let outcome = task.await.unwrap_or_else(|e| Err(BackendError::Task(e)));
            self.chat.settle(outcome);
            self.follow_bottom = true;
        }
    }

    pub fn spawn_health_check(&mut self, backend: HttpBackend) {
        self.health_task = Some(tokio::spawn(async move { backend.health().await }));
    }

    pub async fn poll_health(&mut self) {
        let finished = self
            .health_task
            .as_ref()
            .is_some_and(|task| task.is_finished());
        if !finished {
            return;
        }

        if let Some(task) = self.health_task.take() {
            let outcome = task.await.unwrap_or_else(|e| Err(BackendError::Task(e)));
            self.backend_status = match outcome {
                Ok(health) if health.is_healthy() => BackendStatus::Online,
                Ok(health) => {
                    warn!(status = %health.status, message = %health.message, "backend reports degraded health");
                    BackendStatus::Degraded(health.message)
                }
                Err(e) => {
                    warn!(error = %e, endpoint = %self.endpoint, "health check failed");
                    BackendStatus::Offline
                }
            };
            info!(status = ?self.backend_status, "backend health checked");
        }
    }

    /// Abort anything still running before the terminal is restored
    pub fn shutdown(&mut self) {
        if let Some(task) = self.exchange_task.take() {
            task.abort();
        }
        if let Some(task) = self.health_task.take() {
            task.abort();
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Input editing
    pub fn insert_char(&mut self, c: char) {
        if self.is_loading() {
            return;
        }
        let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
        self.input.insert(byte_pos, c);
        self.input_cursor += 1;
    }

    pub fn insert_newline(&mut self) {
        self.insert_char('\n');
    }

    pub fn delete_before_cursor(&mut self) {
        if self.is_loading() || self.input_cursor == 0 {
            return;
        }
        self.input_cursor -= 1;
        let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
        self.input.remove(byte_pos);
    }

    pub fn delete_at_cursor(&mut self) {
        if self.is_loading() {
            return;
        }
        if self.input_cursor < self.input.chars().count() {
            let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.input_cursor = self.input_cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        let char_count = self.input.chars().count();
        self.input_cursor = (self.input_cursor + 1).min(char_count);
    }

    pub fn cursor_home(&mut self) {
        self.input_cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.input_cursor = self.input.chars().count();
    }

    /// Cursor as (line, column) within the input text
    pub fn input_cursor_position(&self) -> (usize, usize) {
        let before: String = self.input.chars().take(self.input_cursor).collect();
        let line = before.matches('\n').count();
        let column = before
            .rsplit('\n')
            .next()
            .map(|s| s.chars().count())
            .unwrap_or(0);
        (line, column)
    }

    pub fn input_line_count(&self) -> u16 {
        (self.input.matches('\n').count() + 1).min(u16::MAX as usize) as u16
    }

    // Suggestion list
    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            FocusPane::Input if self.chat.shows_suggestions() => FocusPane::Suggestions,
            _ => FocusPane::Input,
        };
    }

    pub fn suggestion_nav_down(&mut self) {
        let i = self.suggestion_state.selected().unwrap_or(0);
        self.suggestion_state
            .select(Some((i + 1).min(SUGGESTIONS.len() - 1)));
    }

    pub fn suggestion_nav_up(&mut self) {
        let i = self.suggestion_state.selected().unwrap_or(0);
        self.suggestion_state.select(Some(i.saturating_sub(1)));
    }

    // Transcript scrolling
    fn max_scroll(&self) -> u16 {
        self.chat_total_lines.saturating_sub(self.chat_height)
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.follow_bottom = self.chat_scroll >= self.max_scroll();
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(self.max_scroll());
        self.follow_bottom = self.chat_scroll >= self.max_scroll();
    }

    pub fn scroll_half_page_up(&mut self) {
        self.scroll_up((self.chat_height / 2).max(1));
    }

    pub fn scroll_half_page_down(&mut self) {
        self.scroll_down((self.chat_height / 2).max(1));
    }

    /// Record the transcript size from the last render and pin to the bottom if following
    pub fn set_transcript_metrics(&mut self, total_lines: u16, height: u16) {
        self.chat_total_lines = total_lines;
        self.chat_height = height;

        if self.follow_bottom {
            self.chat_scroll = self.max_scroll();
        } else {
            self.chat_scroll = self.chat_scroll.min(self.max_scroll());
        }
    }
}
