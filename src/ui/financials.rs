//! Billable-hours table with a grouping toggle.

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode};
use tui::{
    backend::Backend as TuiBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use crate::models::TimeEntry;
use crate::services::financial::{self, GroupTotals};

#[derive(Clone, Copy, PartialEq)]
pub enum GroupMode {
    Entries,
    Customer,
    Project,
}

impl GroupMode {
    fn label(&self) -> &'static str {
        match self {
            GroupMode::Entries => "Entries",
            GroupMode::Customer => "By Customer",
            GroupMode::Project => "By Project",
        }
    }

    fn next(&self) -> GroupMode {
        match self {
            GroupMode::Entries => GroupMode::Customer,
            GroupMode::Customer => GroupMode::Project,
            GroupMode::Project => GroupMode::Entries,
        }
    }
}

// Represents the state of the financial records screen
pub struct FinancialsState {
    entries: Vec<TimeEntry>,
    mode: GroupMode,
    table_state: TableState,
}

impl FinancialsState {
    pub fn new(entries: Vec<TimeEntry>) -> Self {
        let mut table_state = TableState::default();
        if !entries.is_empty() {
            table_state.select(Some(0));
        }

        Self {
            entries,
            mode: GroupMode::Entries,
            table_state,
        }
    }

    pub fn toggle_grouping(&mut self) {
        self.mode = self.mode.next();
        self.table_state.select(Some(0));
    }

    fn row_count(&self) -> usize {
        match self.mode {
            GroupMode::Entries => self.entries.len(),
            GroupMode::Customer => financial::group_by_customer(&self.entries).len(),
            GroupMode::Project => financial::group_by_project(&self.entries).len(),
        }
    }

    pub fn next(&mut self) {
        let count = self.row_count();
        if count == 0 {
            return;
        }

        let i = match self.table_state.selected() {
            Some(i) => {
                if i >= count - 1 {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        self.table_state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let count = self.row_count();
        if count == 0 {
            return;
        }

        let i = match self.table_state.selected() {
            Some(i) => {
                if i == 0 {
                    count - 1
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.table_state.select(Some(i));
    }
}

pub enum FinancialAction {
    Back,
}

pub fn render_financials<B: TuiBackend>(frame: &mut Frame<B>, state: &mut FinancialsState) {
    let size = frame.size();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(3),
        ].as_ref())
        .split(size);

    let total_amount: f64 = state.entries.iter().map(|e| e.amount).sum();
    let total_hours: f64 = state.entries.iter().map(|e| e.hours).sum();
    let title = format!(
        "Financial Records: {} ({:.2} h, ${:.2})",
        state.mode.label(),
        total_hours,
        total_amount
    );

    let table = match state.mode {
        GroupMode::Entries => entries_table(&state.entries, title),
        GroupMode::Customer => {
            groups_table(financial::group_by_customer(&state.entries), "Customer", title)
        }
        GroupMode::Project => {
            groups_table(financial::group_by_project(&state.entries), "Project", title)
        }
    };

    frame.render_stateful_widget(table, chunks[0], &mut state.table_state);

    let buttons = Paragraph::new("<G> Toggle Grouping | <Esc> Back")
        .block(Block::default().borders(Borders::TOP))
        .style(Style::default().fg(Color::White));

    frame.render_widget(buttons, chunks[1]);
}

fn entries_table(entries: &[TimeEntry], title: String) -> Table<'static> {
    let header_cells = ["Date", "Customer", "Project", "Hours", "Rate", "Amount", "Billed"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow)));
    let header = Row::new(header_cells).height(1).bottom_margin(1);

    let rows: Vec<Row> = entries
        .iter()
        .map(|entry| {
            let date = entry
                .date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "-".to_string());
            let billed = if entry.billed { "yes" } else { "no" };
            Row::new(vec![
                Cell::from(date),
                Cell::from(entry.customer_id.clone()),
                Cell::from(entry.project_id.clone()),
                Cell::from(format!("{:.2}", entry.hours)),
                Cell::from(format!("{:.2}", entry.rate)),
                Cell::from(format!("{:.2}", entry.amount)),
                Cell::from(billed),
            ])
            .height(1)
        })
        .collect();

    Table::new(rows)
        .header(header)
        .block(Block::default().title(title).borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .widths(&[
            Constraint::Percentage(14),
            Constraint::Percentage(18),
            Constraint::Percentage(18),
            Constraint::Percentage(12),
            Constraint::Percentage(12),
            Constraint::Percentage(14),
            Constraint::Percentage(12),
        ])
}

fn groups_table(groups: Vec<GroupTotals>, key_header: &'static str, title: String) -> Table<'static> {
    let header_cells = [key_header, "Hours", "Amount", "Entries"]
        .into_iter()
        .map(|h| Cell::from(h).style(Style::default().fg(Color::Yellow)));
    let header = Row::new(header_cells).height(1).bottom_margin(1);

    let rows: Vec<Row> = groups
        .into_iter()
        .map(|group| {
            Row::new(vec![
                Cell::from(group.key),
                Cell::from(format!("{:.2}", group.total_hours)),
                Cell::from(format!("{:.2}", group.total_amount)),
                Cell::from(group.entries.to_string()),
            ])
            .height(1)
        })
        .collect();

    Table::new(rows)
        .header(header)
        .block(Block::default().title(title).borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .widths(&[
            Constraint::Percentage(40),
            Constraint::Percentage(20),
            Constraint::Percentage(20),
            Constraint::Percentage(20),
        ])
}

pub fn handle_input(state: &mut FinancialsState) -> Result<Option<FinancialAction>> {
    if let Event::Key(key) = event::read()? {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                return Ok(Some(FinancialAction::Back));
            }
            KeyCode::Char('g') => {
                state.toggle_grouping();
            }
            KeyCode::Down => {
                state.next();
            }
            KeyCode::Up => {
                state.previous();
            }
            _ => {}
        }
    }
    Ok(None)
}
