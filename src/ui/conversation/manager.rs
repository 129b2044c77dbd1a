use crate::events::{Message, TurnOutcome, CANCELLED_TEXT, ERROR_TEXT};
use crate::llm::{ChatBackend, LlmError};
use crate::ui::conversation::{
    ComposerResult, ComposerView, ConversationComposer, ConversationHistory, HistoryView,
    SlashCommand,
};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use futures::FutureExt;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    widgets::Widget,
};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Actions that can be requested by the conversation manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationAction {
    None,
    Exit,
}

/// Cancellation context for exactly one in-flight request
#[derive(Debug)]
pub struct RequestHandle {
    turn: u64,
    token: CancellationToken,
}

impl RequestHandle {
    fn arm(turn: u64) -> Self {
        Self {
            turn,
            token: CancellationToken::new(),
        }
    }

    pub fn turn(&self) -> u64 {
        self.turn
    }
}

#[derive(Debug, Default)]
enum TurnState {
    #[default]
    Idle,
    Sending(RequestHandle),
}

#[derive(Debug)]
struct TurnReport {
    turn: u64,
    outcome: TurnOutcome,
}

/// Owns the conversation state and drives one request at a time
pub struct ConversationManager {
    history: ConversationHistory,
    composer: ConversationComposer,
    backend: Arc<dyn ChatBackend>,
    state: TurnState,
    next_turn: u64,
    report_tx: mpsc::UnboundedSender<TurnReport>,
    report_rx: mpsc::UnboundedReceiver<TurnReport>,
    info_visible: bool,
    fade_duration: Duration,
}

impl ConversationManager {
    pub fn new(backend: Arc<dyn ChatBackend>, fade_duration: Duration) -> Self {
        let (report_tx, report_rx) = mpsc::unbounded_channel();

        Self {
            history: ConversationHistory::new(),
            composer: ConversationComposer::new("Type a message"),
            backend,
            state: TurnState::Idle,
            next_turn: 0,
            report_tx,
            report_rx,
            info_visible: false,
            fade_duration,
        }
    }

    pub fn messages(&self) -> &[Message] {
        self.history.messages()
    }

    #[cfg(test)]
    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    #[cfg(test)]
    pub fn input(&self) -> &str {
        self.composer.content()
    }

    #[cfg(test)]
    pub fn set_input(&mut self, text: impl Into<String>) {
        self.composer.set_content(text);
    }

    /// True iff a request handle is outstanding
    pub fn is_loading(&self) -> bool {
        matches!(self.state, TurnState::Sending(_))
    }

    pub fn active_turn(&self) -> Option<u64> {
        match &self.state {
            TurnState::Sending(handle) => Some(handle.turn()),
            TurnState::Idle => None,
        }
    }

    pub fn info_visible(&self) -> bool {
        self.info_visible
    }

    /// Send `text` as a new turn. Ignored unless idle and `text` has
    /// something besides whitespace. Returns whether a turn started.
    pub fn submit(&mut self, text: &str) -> bool {
        if self.is_loading() || text.trim().is_empty() {
            return false;
        }

        self.history.push(Message::user(text));
        self.composer.clear();

        self.next_turn += 1;
        let handle = RequestHandle::arm(self.next_turn);
        let turn = handle.turn;
        let token = handle.token.clone();
        self.state = TurnState::Sending(handle);

        info!(turn, "sending message");

        let backend = Arc::clone(&self.backend);
        let report_tx = self.report_tx.clone();
        let prompt = text.to_string();
        tokio::spawn(async move {
            // A panicking backend still has to end the turn.
            let outcome = match AssertUnwindSafe(backend.generate(&prompt, token))
                .catch_unwind()
                .await
            {
                Ok(result) => TurnOutcome::from(result),
                Err(_) => TurnOutcome::Failed(LlmError::Panicked),
            };
            let _ = report_tx.send(TurnReport { turn, outcome });
        });

        true
    }

    /// Send whatever is in the composer
    pub fn submit_input(&mut self) -> bool {
        let text = self.composer.content().to_string();
        self.submit(&text)
    }

    /// Stop the pending request. No effect unless a request is in flight.
    pub fn cancel(&mut self) -> bool {
        let TurnState::Sending(handle) = std::mem::take(&mut self.state) else {
            return false;
        };

        handle.token.cancel();
        info!(turn = handle.turn, "response cancelled");
        self.history.push(Message::ai(CANCELLED_TEXT));
        true
    }

    pub fn toggle_info(&mut self, visible: bool) {
        self.info_visible = visible;
        self.composer.set_focus(!visible);
    }

    /// Apply any finished turns without waiting (called from the main loop)
    pub fn process_outcomes(&mut self) {
        while let Ok(report) = self.report_rx.try_recv() {
            self.resolve(report);
        }
        self.history.clear_finished_fade(Instant::now());
    }

    /// Wait until the current turn, if any, has resolved
    pub async fn wait_for_turn(&mut self) {
        while self.is_loading() {
            match self.report_rx.recv().await {
                Some(report) => self.resolve(report),
                None => break,
            }
        }
    }

    fn resolve(&mut self, report: TurnReport) {
        if self.active_turn() != Some(report.turn) {
            debug!(turn = report.turn, "discarding outcome of a finished turn");
            return;
        }

        // Leaving Sending first means loading is clear whatever the outcome.
        let _handle = std::mem::take(&mut self.state);

        match report.outcome {
            TurnOutcome::Succeeded(text) => {
                info!(turn = report.turn, chars = text.chars().count(), "response received");
                self.history.push(Message::ai(text));
                self.history.fade_in_last(self.fade_duration);
            }
            TurnOutcome::Cancelled => {
                self.history.push(Message::ai(CANCELLED_TEXT));
            }
            TurnOutcome::Failed(err) => {
                error!(turn = report.turn, error = %err, "Error fetching AI response");
                self.history.push(Message::ai(ERROR_TEXT));
            }
        }
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ConversationAction {
        if key.kind != KeyEventKind::Press {
            return ConversationAction::None;
        }

        if self.info_visible {
            if matches!(key.code, KeyCode::Esc | KeyCode::Enter | KeyCode::F(1) | KeyCode::Char('q')) {
                self.toggle_info(false);
            }
            return ConversationAction::None;
        }

        match key.code {
            KeyCode::F(1) => {
                self.toggle_info(true);
                return ConversationAction::None;
            }
            KeyCode::Esc => {
                self.cancel();
                return ConversationAction::None;
            }
            KeyCode::PageUp => {
                self.history.scroll_up(5);
                return ConversationAction::None;
            }
            KeyCode::PageDown => {
                self.history.scroll_down(5);
                return ConversationAction::None;
            }
            _ => {}
        }

        match self.composer.handle_key(key) {
            ComposerResult::Submit => {
                if self.is_loading() {
                    self.cancel();
                } else {
                    self.submit_input();
                }
                ConversationAction::None
            }
            ComposerResult::Command(SlashCommand::About) => {
                self.toggle_info(true);
                ConversationAction::None
            }
            ComposerResult::Command(SlashCommand::Quit) => ConversationAction::Exit,
            ComposerResult::None => ConversationAction::None,
        }
    }

    pub fn handle_paste(&mut self, text: &str) {
        if !self.info_visible {
            self.composer.insert_str(text);
        }
    }

    /// Render history and composer into `area`
    pub fn render(&self, area: Rect, buf: &mut Buffer, tick: usize) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(3),    // History
                Constraint::Length(3), // Composer
            ])
            .split(area);

        HistoryView {
            history: &self.history,
            loading: self.is_loading(),
            tick,
            now: Instant::now(),
        }
        .render(chunks[0], buf);

        ComposerView {
            composer: &self.composer,
            loading: self.is_loading(),
        }
        .render(chunks[1], buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::llm::LlmClient;
    use async_trait::async_trait;
    use crossterm::event::KeyModifiers;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Never answers; resolves only through cancellation
    struct PendingBackend;

    #[async_trait]
    impl ChatBackend for PendingBackend {
        async fn generate(&self, _prompt: &str, cancel: CancellationToken) -> Result<String, LlmError> {
            cancel.cancelled().await;
            Err(LlmError::Cancelled)
        }
    }

    /// Echoes the prompt back, prefixed
    struct EchoBackend;

    #[async_trait]
    impl ChatBackend for EchoBackend {
        async fn generate(&self, prompt: &str, _cancel: CancellationToken) -> Result<String, LlmError> {
            Ok(format!("echo: {prompt}"))
        }
    }

    /// Ignores cancellation and answers anyway
    struct StubbornBackend;

    #[async_trait]
    impl ChatBackend for StubbornBackend {
        async fn generate(&self, _prompt: &str, _cancel: CancellationToken) -> Result<String, LlmError> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok("late reply".to_string())
        }
    }

    /// Blows up instead of answering
    struct PanickingBackend;

    #[async_trait]
    impl ChatBackend for PanickingBackend {
        async fn generate(&self, _prompt: &str, _cancel: CancellationToken) -> Result<String, LlmError> {
            panic!("backend exploded");
        }
    }

    fn manager_with(backend: impl ChatBackend + 'static) -> ConversationManager {
        ConversationManager::new(Arc::new(backend), Duration::from_millis(1000))
    }

    fn gemini_manager(base_url: String) -> ConversationManager {
        let config = Config {
            api_key: Some("test-key".to_string()),
            api_key_env: None,
            base_url,
            request_timeout_secs: 5,
            ..Config::default()
        };
        manager_with(LlmClient::new(config).unwrap())
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[tokio::test]
    async fn submit_appends_user_message_immediately() {
        let mut manager = manager_with(PendingBackend);
        manager.set_input("hello");

        assert!(manager.submit_input());
        assert_eq!(manager.messages(), &[Message::user("hello")]);
        assert!(manager.is_loading());
        assert_eq!(manager.input(), "");
    }

    #[tokio::test]
    async fn blank_input_is_ignored() {
        let mut manager = manager_with(PendingBackend);

        for text in ["", "   ", "\n\t "] {
            assert!(!manager.submit(text));
        }
        assert!(manager.messages().is_empty());
        assert!(!manager.is_loading());
    }

    #[tokio::test]
    async fn submit_is_rejected_while_sending() {
        let mut manager = manager_with(PendingBackend);
        assert!(manager.submit("first"));
        assert!(!manager.submit("second"));

        assert_eq!(manager.messages(), &[Message::user("first")]);
        assert_eq!(manager.active_turn(), Some(1));
    }

    #[tokio::test]
    async fn successful_reply_is_appended() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{ "content": { "parts": [{ "text": "hi" }] } }]
            })))
            .mount(&mock_server)
            .await;

        let mut manager = gemini_manager(mock_server.uri());
        manager.submit("hello");
        manager.wait_for_turn().await;

        assert_eq!(manager.messages(), &[Message::user("hello"), Message::ai("hi")]);
        assert!(!manager.is_loading());
        assert!(manager.history().fade_for(1).is_some());
    }

    #[tokio::test]
    async fn network_failure_becomes_error_message() {
        let mut manager = gemini_manager("http://127.0.0.1:9".to_string());
        manager.submit("x");
        manager.wait_for_turn().await;

        assert_eq!(manager.messages(), &[Message::user("x"), Message::ai(ERROR_TEXT)]);
        assert!(!manager.is_loading());
        assert!(manager.history().fade_for(1).is_none());
    }

    #[tokio::test]
    async fn panicking_backend_still_ends_the_turn() {
        let mut manager = manager_with(PanickingBackend);
        manager.submit("x");

        let finished = tokio::time::timeout(Duration::from_millis(500), manager.wait_for_turn()).await;
        manager.process_outcomes();

        assert!(finished.is_ok());
        assert!(!manager.is_loading());
        assert_eq!(manager.messages(), &[Message::user("x"), Message::ai(ERROR_TEXT)]);
    }

    #[tokio::test]
    async fn malformed_reply_becomes_error_message() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "oops": true })))
            .mount(&mock_server)
            .await;

        let mut manager = gemini_manager(mock_server.uri());
        manager.submit("x");
        manager.wait_for_turn().await;

        assert_eq!(manager.messages()[1], Message::ai(ERROR_TEXT));
    }

    #[tokio::test]
    async fn cancel_during_sending_appends_one_message() {
        let mut manager = manager_with(PendingBackend);
        manager.submit("hello");

        assert!(manager.cancel());
        assert!(!manager.is_loading());
        assert_eq!(manager.messages(), &[Message::user("hello"), Message::ai(CANCELLED_TEXT)]);

        // The spawned call reports Cancelled for a turn that is already over.
        tokio::time::sleep(Duration::from_millis(20)).await;
        manager.process_outcomes();
        assert_eq!(manager.messages().len(), 2);
    }

    #[tokio::test]
    async fn late_reply_after_cancel_is_discarded() {
        let mut manager = manager_with(StubbornBackend);
        manager.submit("hello");
        manager.cancel();

        tokio::time::sleep(Duration::from_millis(60)).await;
        manager.process_outcomes();

        assert_eq!(manager.messages(), &[Message::user("hello"), Message::ai(CANCELLED_TEXT)]);
    }

    #[tokio::test]
    async fn cancel_when_idle_has_no_effect() {
        let mut manager = manager_with(EchoBackend);
        assert!(!manager.cancel());
        assert!(manager.messages().is_empty());

        manager.submit("a");
        manager.wait_for_turn().await;
        assert!(!manager.cancel());
        assert_eq!(manager.messages().len(), 2);
        assert!(!manager.is_loading());
    }

    #[tokio::test]
    async fn each_turn_gets_a_fresh_handle() {
        let mut manager = manager_with(EchoBackend);
        manager.submit("one");
        assert_eq!(manager.active_turn(), Some(1));
        manager.cancel();

        manager.submit("two");
        assert_eq!(manager.active_turn(), Some(2));
        manager.wait_for_turn().await;

        assert_eq!(
            manager.messages(),
            &[
                Message::user("one"),
                Message::ai(CANCELLED_TEXT),
                Message::user("two"),
                Message::ai("echo: two"),
            ]
        );
    }

    #[tokio::test]
    async fn enter_sends_then_stops() {
        let mut manager = manager_with(PendingBackend);
        for c in "hi".chars() {
            manager.handle_key(press(KeyCode::Char(c)));
        }

        manager.handle_key(press(KeyCode::Enter));
        assert!(manager.is_loading());

        manager.handle_key(press(KeyCode::Enter));
        assert!(!manager.is_loading());
        assert_eq!(manager.messages(), &[Message::user("hi"), Message::ai(CANCELLED_TEXT)]);
    }

    #[tokio::test]
    async fn info_dialog_toggles_without_touching_the_turn() {
        let mut manager = manager_with(PendingBackend);
        manager.submit("hello");

        manager.handle_key(press(KeyCode::F(1)));
        assert!(manager.info_visible());
        assert!(manager.is_loading());

        manager.handle_key(press(KeyCode::Esc));
        assert!(!manager.info_visible());
        assert!(manager.is_loading());
    }

    #[tokio::test]
    async fn slash_commands_map_to_actions() {
        let mut manager = manager_with(EchoBackend);
        manager.set_input("/quit");
        assert_eq!(manager.handle_key(press(KeyCode::Enter)), ConversationAction::Exit);
        assert!(manager.messages().is_empty());

        manager.set_input("/about");
        manager.handle_key(press(KeyCode::Enter));
        assert!(manager.info_visible());
    }
}
