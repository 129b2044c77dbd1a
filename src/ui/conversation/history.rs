//! Conversation history display component

use crate::events::{Message, Sender};
use crate::ui::conversation::reveal::FadeIn;
use crate::ui::markdown::render_markdown;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Widget},
};
use std::time::{Duration, Instant};

const SCREEN_BG: (u8, u8, u8) = (0x1f, 0x1f, 0x1f);
const AI_FG: (u8, u8, u8) = (0xec, 0xec, 0xec);
const USER_BG: Color = Color::Rgb(0x33, 0x35, 0x37);

const SPINNER: [&str; 8] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧"];

/// Append-only list of messages plus scroll and fade state
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    messages: Vec<Message>,
    /// Lines scrolled up from the bottom
    scroll_offset: usize,
    fade: Option<(usize, FadeIn)>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new message to the history
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.scroll_to_bottom();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Fade in the most recent message
    pub fn fade_in_last(&mut self, duration: Duration) {
        if let Some(index) = self.messages.len().checked_sub(1) {
            self.fade = Some((index, FadeIn::start(duration)));
        }
    }

    /// Drop the fade once it has fully run
    pub fn clear_finished_fade(&mut self, now: Instant) {
        if self.fade.is_some_and(|(_, fade)| fade.is_finished_at(now)) {
            self.fade = None;
        }
    }

    pub fn fade_for(&self, index: usize) -> Option<FadeIn> {
        self.fade
            .filter(|(fading, _)| *fading == index)
            .map(|(_, fade)| fade)
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_add(lines);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_offset = 0;
    }

    /// Lay out every message for a pane `width` columns wide
    pub fn lines(&self, width: u16, now: Instant) -> Vec<Line<'static>> {
        let body_width = (width as usize).saturating_sub(4).max(10);
        let mut lines = Vec::new();

        for (index, message) in self.messages.iter().enumerate() {
            let (alignment, label_style, body_style) = match message.sender {
                Sender::User => (
                    Alignment::Right,
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    Style::default().fg(Color::White).bg(USER_BG),
                ),
                Sender::Ai => {
                    let fg = match self.fade_for(index) {
                        Some(fade) => fade.color_at(SCREEN_BG, AI_FG, now),
                        None => Color::Rgb(AI_FG.0, AI_FG.1, AI_FG.2),
                    };
                    (
                        Alignment::Left,
                        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                        Style::default().fg(fg),
                    )
                }
            };

            lines.push(
                Line::from(Span::styled(message.sender.display_name(), label_style)).alignment(alignment),
            );
            for line in render_markdown(&message.text, body_width, body_style) {
                lines.push(line.alignment(alignment));
            }
            lines.push(Line::default());
        }

        lines
    }
}

/// Borrowing widget over the history, with an optional spinner row
pub struct HistoryView<'a> {
    pub history: &'a ConversationHistory,
    pub loading: bool,
    pub tick: usize,
    pub now: Instant,
}

impl Widget for HistoryView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(" Conversation ");

        let inner_area = block.inner(area);
        block.render(area, buf);

        if self.history.is_empty() && !self.loading {
            let welcome_lines = vec![
                Line::from(Span::styled("Ask Gemini anything.", Style::default().fg(Color::Green))),
                Line::from(""),
                Line::from(Span::styled(
                    "Enter sends, Enter or Esc stops a pending reply, F1 shows info.",
                    Style::default().fg(Color::DarkGray),
                )),
            ];
            Paragraph::new(Text::from(welcome_lines)).render(inner_area, buf);
            return;
        }

        let mut all_lines = self.history.lines(inner_area.width, self.now);
        if self.loading {
            let frame = SPINNER[self.tick % SPINNER.len()];
            all_lines.push(Line::from(vec![
                Span::styled(frame, Style::default().fg(Color::White)),
                Span::styled(" Gemini is thinking…", Style::default().fg(Color::DarkGray)),
            ]));
        }

        // Bottom-anchored: offset counts lines hidden below the viewport.
        let height = inner_area.height as usize;
        let max_offset = all_lines.len().saturating_sub(height);
        let offset = self.history.scroll_offset.min(max_offset);
        let top = max_offset - offset;

        Paragraph::new(Text::from(all_lines))
            .scroll((top.min(u16::MAX as usize) as u16, 0))
            .render(inner_area, buf);
    }
}
