//! Conversation UI components for chat interface

pub mod commands;
pub mod composer;
pub mod history;
pub mod manager;
pub mod reveal;

pub use commands::SlashCommand;
pub use composer::{ComposerResult, ComposerView, ConversationComposer};
pub use history::{ConversationHistory, HistoryView};
pub use manager::{ConversationAction, ConversationManager};
