use crate::task_list::TaskList;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame, Terminal,
};
use std::{io, time::Duration};
use tracing::warn;

const TICK: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Normal,
    Editing,
}

#[derive(Debug, Default)]
pub struct App {
    pub mode: Mode,
    pub selected: usize,
    pub status: Option<String>,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    fn clamp_selection(&mut self, len: usize) {
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
    }
}

pub fn run_app<B: Backend>(terminal: &mut Terminal<B>, list: &mut TaskList) -> io::Result<()> {
    let mut app = App::new();
    loop {
        terminal.draw(|f| draw(f, &app, list))?;

        if event::poll(TICK)? {
            if let Event::Key(key) = event::read()? {
                if !handle_key(&mut app, list, key) {
                    return Ok(());
                }
            }
        }

        // Pick up anything the store pushed since the last tick.
        if list.sync() > 0 {
            app.clamp_selection(list.len());
        }
    }
}

/// Applies one key press. Returns `false` when the user asked to quit.
pub fn handle_key(app: &mut App, list: &mut TaskList, key: KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return true;
    }

    match app.mode {
        Mode::Normal => match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return false,
            KeyCode::Char('a') | KeyCode::Char('i') => {
                app.mode = Mode::Editing;
                app.status = None;
            }
            KeyCode::Up | KeyCode::Char('k') => {
                if app.selected > 0 {
                    app.selected -= 1;
                }
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if app.selected + 1 < list.len() {
                    app.selected += 1;
                }
            }
            KeyCode::Char(' ') | KeyCode::Enter => {
                match list.toggle_done(app.selected) {
                    Ok(_) => app.status = None,
                    Err(err) => report(app, err),
                }
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                match list.delete_todo(app.selected) {
                    Ok(()) => {
                        app.status = None;
                        app.clamp_selection(list.len());
                    }
                    Err(err) => report(app, err),
                }
            }
            _ => {}
        },
        Mode::Editing => match key.code {
            KeyCode::Esc => app.mode = Mode::Normal,
            KeyCode::Enter => match list.add_new_todo() {
                Ok(Some(_)) => {
                    app.status = None;
                    app.selected = list.len().saturating_sub(1);
                }
                Ok(None) => {}
                Err(err) => report(app, err),
            },
            KeyCode::Backspace => {
                list.new_todo_text.pop();
            }
            KeyCode::Char(c) => list.new_todo_text.push(c),
            _ => {}
        },
    }
    true
}

fn report(app: &mut App, err: impl std::fmt::Display) {
    warn!("{err}");
    app.status = Some(err.to_string());
}

pub fn draw(f: &mut Frame, app: &App, list: &TaskList) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![
            Constraint::Min(3),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(f.area());

    let items: Vec<ListItem> = list
        .iter()
        .map(|t| {
            let (check, style) = if t.done {
                (
                    "[x] ",
                    Style::default()
                        .fg(Color::DarkGray)
                        .add_modifier(Modifier::CROSSED_OUT),
                )
            } else {
                ("[ ] ", Style::default().fg(Color::White))
            };
            ListItem::new(Line::from(vec![
                Span::raw(check),
                Span::styled(t.text.as_str(), style),
            ]))
        })
        .collect();

    let mut state = ListState::default();
    if !list.is_empty() {
        state.select(Some(app.selected));
    }
    let tasks = List::new(items)
        .block(Block::default().title("Todos").borders(Borders::ALL))
        .highlight_style(Style::default().add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");
    f.render_stateful_widget(tasks, chunks[0], &mut state);

    let editing = app.mode == Mode::Editing;
    let input = Paragraph::new(list.new_todo_text.as_str()).block(
        Block::default()
            .title("New todo")
            .borders(Borders::ALL)
            .border_style(if editing {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default()
            }),
    );
    f.render_widget(input, chunks[1]);
    if editing {
        let width = u16::try_from(list.new_todo_text.chars().count()).unwrap_or(u16::MAX);
        f.set_cursor_position((
            chunks[1].x.saturating_add(1).saturating_add(width),
            chunks[1].y + 1,
        ));
    }

    let footer = match &app.status {
        Some(message) => Line::from(Span::styled(
            message.as_str(),
            Style::default().fg(Color::Red),
        )),
        None => Line::from(format!(
            "{} of {} remaining",
            list.remaining(),
            list.len()
        )),
    };
    f.render_widget(Paragraph::new(footer), chunks[2]);
}
