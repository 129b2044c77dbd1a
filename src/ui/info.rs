use crate::ui::conversation::commands::help_lines;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
};

/// Modal "about" dialog
pub struct InfoDialog<'a> {
    pub title: &'a str,
    pub developer: &'a str,
    pub model: &'a str,
}

impl InfoDialog<'_> {
    fn lines(&self) -> Vec<Line<'static>> {
        let mut lines = vec![
            Line::from(Span::styled(
                self.title.to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(format!("Developer: {}", self.developer)),
            Line::from(format!(
                "This app uses the Gemini API ({}) to generate responses in real-time.",
                self.model
            )),
            Line::from(""),
            Line::from(Span::styled("Keys", Style::default().add_modifier(Modifier::UNDERLINED))),
            Line::from("Enter  send, or stop a pending reply"),
            Line::from("Esc    stop a pending reply"),
            Line::from("PgUp/PgDn  scroll"),
            Line::from("Ctrl-C quit"),
            Line::from(""),
        ];
        lines.extend(help_lines().into_iter().map(Line::from));
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Close: Esc",
            Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
        )));
        lines
    }
}

/// Centered rectangle taking `percent_x` of the width and `height` rows
pub fn centered_rect(percent_x: u16, height: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(height.min(area.height)),
            Constraint::Min(0),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

impl Widget for InfoDialog<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let lines = self.lines();
        let popup = centered_rect(70, lines.len() as u16 + 2, area);

        Clear.render(popup, buf);
        Paragraph::new(Text::from(lines))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" About ")
                    .border_style(Style::default().fg(Color::Blue)),
            )
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .render(popup, buf);
    }
}
