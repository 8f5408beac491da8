use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::debug;
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};
use std::{io, time::Duration};
use textwrap::wrap;
use tui_input::{backend::crossterm::EventHandler, Input};

use sochat::chat::{format, ChatScreen};

pub use ratatui::backend::CrosstermBackend;
pub use ratatui::Terminal;

/// What the user asked for on this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiAction {
    Send(String),
    SignOut,
    Quit,
}

pub struct ChatUI {
    input: Input,
    notice: Option<String>,
}

impl ChatUI {
    pub fn new() -> Self {
        ChatUI {
            input: Input::default(),
            notice: None,
        }
    }

    pub fn clear_input(&mut self) {
        self.input = Input::default();
    }

    pub fn set_notice(&mut self, notice: Option<String>) {
        self.notice = notice;
    }

    pub fn handle_input(&mut self) -> Result<Option<UiAction>> {
        if !event::poll(Duration::from_millis(50))? {
            return Ok(None);
        }
        let Event::Key(key) = event::read()? else {
            return Ok(None);
        };
        if key.kind != KeyEventKind::Press {
            return Ok(None);
        }

        match key.code {
            KeyCode::Esc => Ok(Some(UiAction::Quit)),
            KeyCode::Char('o') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Ok(Some(UiAction::SignOut))
            }
            KeyCode::Enter => {
                debug!("Submitting compose field");
                Ok(Some(UiAction::Send(self.input.value().to_string())))
            }
            _ => {
                self.input.handle_event(&Event::Key(key));
                self.notice = None;
                Ok(None)
            }
        }
    }

    pub fn draw<B: Backend>(&self, frame: &mut Frame<B>, chat: &ChatScreen) {
        let size = frame.size();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(4), // Peer header
                Constraint::Min(5),    // Messages
                Constraint::Length(3), // Compose
                Constraint::Length(1), // Help / notice line
            ])
            .split(size);

        draw_header(frame, chat, chunks[0]);
        draw_messages(frame, chat, chunks[1]);

        let input_widget = Paragraph::new(self.input.value())
            .block(
                Block::default()
                    .title("Message")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Yellow)),
            );
        frame.render_widget(input_widget, chunks[2]);

        let help = match &self.notice {
            Some(notice) => Line::from(Span::styled(notice.clone(), Style::default().fg(Color::Red))),
            None => Line::from(Span::styled(
                "ENTER send | ESC quit | Ctrl+O sign out",
                Style::default().fg(Color::Gray),
            )),
        };
        frame.render_widget(Paragraph::new(help), chunks[3]);

        frame.set_cursor(
            chunks[2].x + self.input.cursor() as u16 + 1,
            chunks[2].y + 1,
        );
    }
}

fn draw_header<B: Backend>(f: &mut Frame<B>, chat: &ChatScreen, area: Rect) {
    let status = chat.header_status(&chrono::Local::now());
    let lines = vec![
        Line::from(Span::styled(
            chat.header_name(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::raw(status)),
    ];
    let header = Paragraph::new(lines).block(Block::default().borders(Borders::ALL));
    f.render_widget(header, area);
}

fn draw_messages<B: Backend>(f: &mut Frame<B>, chat: &ChatScreen, area: Rect) {
    let wrap_width = area.width.saturating_sub(2).max(1) as usize;
    let now = chrono::Local::now();

    // The view is newest-first; the screen reads top to bottom, newest last
    let items: Vec<ListItem> = chat
        .view()
        .oldest_first()
        .flat_map(|m| {
            let own = chat.is_own(m);
            let who = if own { "You".to_string() } else { format::header_name(&chat.peer().name) };
            let full = format!("[{}] {}: {}", format::message_time(m.timestamp, &now), who, m.text);

            let style = if own {
                Style::default().fg(Color::Blue)
            } else {
                Style::default().fg(Color::Cyan)
            };

            wrap(&full, wrap_width)
                .into_iter()
                .map(|l| l.into_owned())
                .collect::<Vec<String>>()
                .into_iter()
                .map(move |line| ListItem::new(Text::from(line)).style(style))
        })
        .collect();

    let mut list_state = ListState::default();
    if !items.is_empty() {
        list_state.select(Some(items.len() - 1));
    }

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Messages"))
        .highlight_style(Style::default());
    f.render_stateful_widget(list, area, &mut list_state);
}

pub fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

pub fn restore_terminal(mut terminal: Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}
