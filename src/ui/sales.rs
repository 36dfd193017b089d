//! Per-customer sales table, the screen the billing run starts from.

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode};
use tui::{
    backend::Backend as TuiBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use crate::api::Backend;
use crate::models::{Customer, SaleLine};
use crate::services::sales;
use crate::ui::billing_run::{
    self, BillingRunAction, BillingRunState, render_billing_run,
};

// Represents the state of the sales table screen
pub struct SalesState {
    customer: Customer,
    lines: Vec<SaleLine>,
    table_state: TableState,
    billing_state: Option<BillingRunState>,
}

impl SalesState {
    pub fn new(customer: Customer, lines: Vec<SaleLine>) -> Self {
        let mut table_state = TableState::default();
        if !lines.is_empty() {
            table_state.select(Some(0));
        }

        Self {
            customer,
            lines,
            table_state,
            billing_state: None,
        }
    }

    pub fn next(&mut self) {
        if self.lines.is_empty() {
            return;
        }

        let i = match self.table_state.selected() {
            Some(i) => {
                if i >= self.lines.len() - 1 {
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
        if self.lines.is_empty() {
            return;
        }

        let i = match self.table_state.selected() {
            Some(i) => {
                if i == 0 {
                    self.lines.len() - 1
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.table_state.select(Some(i));
    }

    pub fn customer(&self) -> &Customer {
        &self.customer
    }

    pub fn is_in_billing_run(&self) -> bool {
        self.billing_state.is_some()
    }

    fn unbilled(&self) -> Vec<SaleLine> {
        sales::unbilled(&self.lines)
    }
}

pub enum SalesAction {
    Back,
    /// A billing run created an invoice; the lines need reloading
    Reload,
}

pub fn render_sales<B: TuiBackend>(frame: &mut Frame<B>, state: &mut SalesState) {
    // If a billing run is active, it owns the whole frame
    if let Some(billing_state) = &mut state.billing_state {
        render_billing_run(frame, billing_state);
        return;
    }

    let size = frame.size();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(3),
        ].as_ref())
        .split(size);

    let header_cells = ["Product", "Qty", "Unit Price", "Total", "Currency", "Invoice"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow)));
    let header = Row::new(header_cells)
        .style(Style::default())
        .height(1)
        .bottom_margin(1);

    let rows = state.lines.iter().map(|line| {
        let invoice = line.inv_id.as_deref().unwrap_or("-").to_string();
        let cells = vec![
            Cell::from(line.product_name.clone()),
            Cell::from(format!("{:.2}", line.quantity)),
            Cell::from(format!("{:.2}", line.unit_price)),
            Cell::from(format!("{:.2}", line.total_price)),
            Cell::from(line.currency.clone()),
            Cell::from(invoice),
        ];
        Row::new(cells).height(1)
    });

    let unbilled_total: f64 = state
        .lines
        .iter()
        .filter(|l| l.is_unbilled())
        .map(|l| l.total_price)
        .sum();
    let title = format!(
        "Sales for {} (${:.2} unbilled)",
        state.customer.name, unbilled_total
    );
    let table = Table::new(rows)
        .header(header)
        .block(Block::default().title(title).borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .widths(&[
            Constraint::Percentage(30),
            Constraint::Percentage(12),
            Constraint::Percentage(14),
            Constraint::Percentage(14),
            Constraint::Percentage(12),
            Constraint::Percentage(18),
        ]);

    frame.render_stateful_widget(table, chunks[0], &mut state.table_state);

    let buttons = Paragraph::new("<I> Invoice Unbilled | <Esc> Back")
        .block(Block::default().borders(Borders::TOP))
        .style(Style::default().fg(Color::White));

    frame.render_widget(buttons, chunks[1]);
}

pub async fn handle_input(backend: &Backend, state: &mut SalesState) -> Result<Option<SalesAction>> {
    // If a billing run is active, route input to it and drive its phases
    if state.is_in_billing_run() {
        if let Some(billing_state) = &mut state.billing_state {
            match billing_run::handle_input(billing_state)? {
                Some(BillingRunAction::Cancel) => {
                    let completed = billing_state.completed();
                    state.billing_state = None;
                    if completed {
                        return Ok(Some(SalesAction::Reload));
                    }
                }
                Some(BillingRunAction::Start) => {
                    billing_run::start_run(backend, billing_state).await?;
                }
                Some(BillingRunAction::UseCandidate(index)) => {
                    billing_run::continue_with_candidate(backend, billing_state, index).await?;
                }
                Some(BillingRunAction::CreateCustomer) => {
                    billing_run::create_customer_and_continue(backend, billing_state).await?;
                }
                None => {}
            }
        }
        return Ok(None);
    }

    if let Event::Key(key) = event::read()? {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                return Ok(Some(SalesAction::Back));
            }
            KeyCode::Char('i') => {
                let unbilled = state.unbilled();
                // The wizard itself reports the empty case as a failure
                state.billing_state = Some(BillingRunState::new(
                    state.customer.clone(),
                    unbilled,
                ));
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
