//! Revenue bar chart bucketed by calendar period.

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode};
use tui::{
    backend::Backend as TuiBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    widgets::{BarChart, Block, Borders, Paragraph},
    Frame,
};

use crate::models::TimeEntry;
use crate::services::financial::{self, Period};

// Represents the state of the revenue chart screen
pub struct ChartsState {
    entries: Vec<TimeEntry>,
    period: Period,
    data: Vec<(String, u64)>,
}

impl ChartsState {
    pub fn new(entries: Vec<TimeEntry>) -> Self {
        let period = Period::Month;
        let data = financial::prepare_chart_data(&entries, period);
        Self {
            entries,
            period,
            data,
        }
    }

    pub fn cycle_period(&mut self) {
        self.period = self.period.next();
        self.data = financial::prepare_chart_data(&self.entries, self.period);
    }
}

pub enum ChartAction {
    Back,
}

pub fn render_charts<B: TuiBackend>(frame: &mut Frame<B>, state: &mut ChartsState) {
    let size = frame.size();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(3),
        ].as_ref())
        .split(size);

    let title = format!("Revenue by {}", state.period.label());

    // The widget borrows its labels, so the series lives for this frame only
    let series: Vec<(&str, u64)> = state
        .data
        .iter()
        .map(|(label, amount)| (label.as_str(), *amount))
        .collect();

    let chart = BarChart::default()
        .block(Block::default().title(title).borders(Borders::ALL))
        .data(&series)
        .bar_width(9)
        .bar_gap(2)
        .bar_style(Style::default().fg(Color::Cyan))
        .value_style(Style::default().fg(Color::Black).bg(Color::Cyan));

    frame.render_widget(chart, chunks[0]);

    let buttons = Paragraph::new("<P> Cycle Period | <Esc> Back")
        .block(Block::default().borders(Borders::TOP))
        .style(Style::default().fg(Color::White));

    frame.render_widget(buttons, chunks[1]);
}

pub fn handle_input(state: &mut ChartsState) -> Result<Option<ChartAction>> {
    if let Event::Key(key) = event::read()? {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                return Ok(Some(ChartAction::Back));
            }
            KeyCode::Char('p') => {
                state.cycle_period();
            }
            _ => {}
        }
    }
    Ok(None)
}
