use crate::llm::LlmError;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

/// Text shown in place of a reply when the user stops a request.
pub const CANCELLED_TEXT: &str = "Response cancelled";

/// Text shown in place of a reply when the request fails for any other reason.
pub const ERROR_TEXT: &str = "Error fetching AI response";

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

impl Sender {
    pub fn display_name(&self) -> &'static str {
        match self {
            Sender::User => "You",
            Sender::Ai => "Gemini",
        }
    }
}

/// A single entry in the conversation. Position in the list is its only identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub text: String,
    pub sender: Sender,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::User,
        }
    }

    pub fn ai(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::Ai,
        }
    }
}

/// How a turn ended
#[derive(Debug)]
pub enum TurnOutcome {
    Succeeded(String),
    Cancelled,
    Failed(LlmError),
}

impl From<Result<String, LlmError>> for TurnOutcome {
    fn from(result: Result<String, LlmError>) -> Self {
        match result {
            Ok(text) => TurnOutcome::Succeeded(text),
            Err(LlmError::Cancelled) => TurnOutcome::Cancelled,
            Err(error) => TurnOutcome::Failed(error),
        }
    }
}

/// Terminal events delivered to the application loop
#[derive(Debug, Clone)]
pub enum TuiEvent {
    /// Key press event
    Key(crossterm::event::KeyEvent),

    /// Bracketed paste
    Paste(String),

    /// Terminal resize; the next draw picks up the new size
    Resize,

    /// Animation / polling tick
    Tick,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_serializes_lowercase() {
        let json = serde_json::to_string(&Message::ai("hi")).unwrap();
        assert_eq!(json, r#"{"text":"hi","sender":"ai"}"#);
        assert_eq!(Sender::User.to_string(), "user");
    }

    #[test]
    fn outcome_from_result_separates_cancellation() {
        assert!(matches!(
            TurnOutcome::from(Ok("hi".to_string())),
            TurnOutcome::Succeeded(text) if text == "hi"
        ));
        assert!(matches!(
            TurnOutcome::from(Err(LlmError::Cancelled)),
            TurnOutcome::Cancelled
        ));
        assert!(matches!(
            TurnOutcome::from(Err(LlmError::MissingApiKey)),
            TurnOutcome::Failed(LlmError::MissingApiKey)
        ));
    }
}
