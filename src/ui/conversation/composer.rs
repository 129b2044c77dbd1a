use crate::ui::conversation::commands::{parse_slash_command, SlashCommand};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

/// Result returned when the user interacts with the composer
#[derive(Debug, PartialEq)]
pub enum ComposerResult {
    /// Enter on ordinary text; the caller decides whether to send or stop
    Submit,
    Command(SlashCommand),
    None,
}

/// State for the text area within the composer. `cursor` counts chars.
#[derive(Debug, Clone, Default)]
pub struct TextAreaState {
    pub content: String,
    pub cursor: usize,
}

impl TextAreaState {
    fn byte_index(&self, char_index: usize) -> usize {
        self.content
            .char_indices()
            .nth(char_index)
            .map(|(index, _)| index)
            .unwrap_or(self.content.len())
    }

    fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// Single-line composer for user input
#[derive(Debug, Clone)]
pub struct ConversationComposer {
    state: TextAreaState,
    placeholder: String,
    has_focus: bool,
}

impl ConversationComposer {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            state: TextAreaState::default(),
            placeholder: placeholder.into(),
            has_focus: true,
        }
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ComposerResult {
        if key.kind != KeyEventKind::Press {
            return ComposerResult::None;
        }

        match key.code {
            KeyCode::Enter => {
                if key.modifiers.contains(KeyModifiers::SHIFT) {
                    self.insert_char('\n');
                } else if let Some(command) = parse_slash_command(&self.state.content) {
                    self.clear();
                    return ComposerResult::Command(command);
                } else {
                    return ComposerResult::Submit;
                }
            }
            KeyCode::Char(c) => {
                if key.modifiers.contains(KeyModifiers::CONTROL) {
                    match c {
                        'a' => self.state.cursor = 0,
                        'e' => self.state.cursor = self.state.char_len(),
                        'u' => self.clear(),
                        _ => {}
                    }
                } else {
                    self.insert_char(c);
                }
            }
            KeyCode::Backspace => {
                if self.state.cursor > 0 {
                    self.state.cursor -= 1;
                    let index = self.state.byte_index(self.state.cursor);
                    self.state.content.remove(index);
                }
            }
            KeyCode::Delete => {
                if self.state.cursor < self.state.char_len() {
                    let index = self.state.byte_index(self.state.cursor);
                    self.state.content.remove(index);
                }
            }
            KeyCode::Left => {
                self.state.cursor = self.state.cursor.saturating_sub(1);
            }
            KeyCode::Right => {
                if self.state.cursor < self.state.char_len() {
                    self.state.cursor += 1;
                }
            }
            KeyCode::Home => {
                self.state.cursor = 0;
            }
            KeyCode::End => {
                self.state.cursor = self.state.char_len();
            }
            _ => {}
        }

        ComposerResult::None
    }

    /// Insert pasted text at the cursor
    pub fn insert_str(&mut self, text: &str) {
        for c in text.chars() {
            self.insert_char(c);
        }
    }

    /// Insert a character at the cursor position
    fn insert_char(&mut self, c: char) {
        let index = self.state.byte_index(self.state.cursor);
        self.state.content.insert(index, c);
        self.state.cursor += 1;
    }

    /// Set focus state
    pub fn set_focus(&mut self, has_focus: bool) {
        self.has_focus = has_focus;
    }

    /// Get current content
    pub fn content(&self) -> &str {
        &self.state.content
    }

    /// Replace the content, cursor at the end
    #[cfg(test)]
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.state.content = content.into();
        self.state.cursor = self.state.char_len();
    }

    /// Clear content
    pub fn clear(&mut self) {
        self.state = TextAreaState::default();
    }
}

/// Borrowing widget; `loading` switches the action hint from send to stop
pub struct ComposerView<'a> {
    pub composer: &'a ConversationComposer,
    pub loading: bool,
}

impl Widget for ComposerView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let composer = self.composer;
        let (title, accent) = if self.loading {
            (" ■ Stop · Enter/Esc ", Color::Red)
        } else {
            (" ➤ Send · Enter ", Color::Green)
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(if composer.has_focus {
                Style::default().fg(accent)
            } else {
                Style::default().fg(Color::Gray)
            });

        let inner_area = block.inner(area);
        block.render(area, buf);

        if composer.state.content.is_empty() {
            let placeholder_line = Line::from(Span::styled(
                composer.placeholder.as_str(),
                Style::default().fg(Color::DarkGray),
            ));
            buf.set_line(inner_area.x, inner_area.y, &placeholder_line, inner_area.width);
            return;
        }

        // Render content with cursor indicator
        let mut content = composer.state.content.clone();
        if composer.has_focus {
            content.insert(composer.state.byte_index(composer.state.cursor), '▌');
        }

        for (i, line_text) in content.split('\n').enumerate() {
            if i < inner_area.height as usize {
                let line = Line::from(Span::raw(line_text));
                buf.set_line(inner_area.x, inner_area.y + i as u16, &line, inner_area.width);
            }
        }
    }
}
