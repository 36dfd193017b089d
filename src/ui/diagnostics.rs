//! Connectivity panel: round-trip latency per upstream service.

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode};
use tui::{
    backend::Backend as TuiBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    text::{Span, Spans},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};

use crate::api::Backend;
use crate::services::financial::TIME_ENTRY_LAYOUT;

// Represents the state of the connectivity diagnostics screen
pub struct DiagnosticsState {
    results: Vec<(String, Result<u64, String>)>,
}

impl DiagnosticsState {
    pub fn new(results: Vec<(String, Result<u64, String>)>) -> Self {
        Self { results }
    }
}

pub enum DiagnosticAction {
    Back,
    Rerun,
}

/// Probe each upstream service and collect latency or the failure message.
pub async fn run_checks(backend: &Backend) -> Vec<(String, Result<u64, String>)> {
    vec![
        (
            "FileMaker".to_string(),
            backend.filemaker.health_check(TIME_ENTRY_LAYOUT).await,
        ),
        ("Store".to_string(), backend.supabase.health_check().await),
        ("QuickBooks".to_string(), backend.quickbooks.health_check().await),
    ]
}

pub fn render_diagnostics<B: TuiBackend>(frame: &mut Frame<B>, state: &mut DiagnosticsState) {
    let size = frame.size();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(3),
        ].as_ref())
        .split(size);

    let items: Vec<ListItem> = state
        .results
        .iter()
        .map(|(name, outcome)| {
            let line = match outcome {
                Ok(latency) => Spans::from(vec![
                    Span::raw(format!("{name}: ")),
                    Span::styled(
                        format!("ok ({latency} ms)"),
                        Style::default().fg(Color::Green),
                    ),
                ]),
                Err(message) => Spans::from(vec![
                    Span::raw(format!("{name}: ")),
                    Span::styled(message.clone(), Style::default().fg(Color::Red)),
                ]),
            };
            ListItem::new(line)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().title("Connectivity").borders(Borders::ALL));

    frame.render_widget(list, chunks[0]);

    let buttons = Paragraph::new("<R> Re-run Checks | <Esc> Back")
        .block(Block::default().borders(Borders::TOP))
        .style(Style::default().fg(Color::White));

    frame.render_widget(buttons, chunks[1]);
}

pub fn handle_input() -> Result<Option<DiagnosticAction>> {
    if let Event::Key(key) = event::read()? {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                return Ok(Some(DiagnosticAction::Back));
            }
            KeyCode::Char('r') => {
                return Ok(Some(DiagnosticAction::Rerun));
            }
            _ => {}
        }
    }
    Ok(None)
}
