use crate::config::Config;
use crate::events::TuiEvent;
use crate::fonts::{FontReadiness, FontStatus, PRODUCT_SANS_BOLD};
use crate::tui::{EventHandler, Tui};
use crate::ui::conversation::{ConversationAction, ConversationManager};
use crate::ui::InfoDialog;
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
    Frame,
};

/// Top-level screen state
pub struct App {
    config: Config,
    manager: ConversationManager,
    fonts: FontReadiness,
    tick: usize,
    should_quit: bool,
}

impl App {
    pub fn new(config: Config, manager: ConversationManager, fonts: FontReadiness) -> Self {
        Self {
            config,
            manager,
            fonts,
            tick: 0,
            should_quit: false,
        }
    }

    #[cfg(test)]
    pub fn manager(&self) -> &ConversationManager {
        &self.manager
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Main loop: draw, wait for one event, apply it
    pub async fn run(&mut self, terminal: &mut Tui) -> Result<()> {
        let mut events = EventHandler::new(self.config.tick_rate());

        while !self.should_quit() {
            self.manager.process_outcomes();
            terminal.draw(|frame| self.draw(frame))?;

            match events.next().await {
                Some(event) => self.handle_event(event),
                None => break,
            }
        }

        // Leave no request running behind a closed screen.
        self.manager.cancel();
        Ok(())
    }

    pub fn handle_event(&mut self, event: TuiEvent) {
        match event {
            TuiEvent::Key(key) => self.handle_key(key),
            TuiEvent::Paste(text) => self.manager.handle_paste(&text),
            TuiEvent::Resize => {}
            TuiEvent::Tick => {
                self.tick = self.tick.wrapping_add(1);
                self.manager.process_outcomes();
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        if self.manager.handle_key(key) == ConversationAction::Exit {
            self.should_quit = true;
        }
    }

    fn draw(&self, frame: &mut Frame) {
        let area = frame.size();
        self.render(area, frame.buffer_mut());
    }

    /// Draw the whole screen. Nothing but a placeholder until fonts settle.
    pub fn render(&self, area: Rect, buf: &mut Buffer) {
        let title_style = match self.fonts.status() {
            FontStatus::Loading => {
                Paragraph::new(Line::from(Span::styled(
                    "Loading fonts…",
                    Style::default().fg(Color::DarkGray),
                )))
                .alignment(Alignment::Center)
                .render(area, buf);
                return;
            }
            FontStatus::Ready(registry) => registry.style_for(PRODUCT_SANS_BOLD),
            FontStatus::Failed(_) => Style::default(),
        };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Min(4)])
            .split(area);

        let header = Line::from(vec![
            Span::styled(self.config.ui.title.clone(), title_style.fg(Color::White)),
            Span::styled("  ·  F1 info", Style::default().fg(Color::DarkGray)),
        ]);
        Paragraph::new(header).render(chunks[0], buf);

        self.manager.render(chunks[1], buf, self.tick);

        if self.manager.info_visible() {
            InfoDialog {
                title: &self.config.ui.title,
                developer: &self.config.ui.developer,
                model: &self.config.model,
            }
            .render(area, buf);
        }
    }
}
