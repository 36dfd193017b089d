//! Top-level customer list with unbilled totals.

use std::collections::HashMap;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode};
use tui::{
    backend::Backend as TuiBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Span, Spans},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

use crate::models::Customer;

// Represents the state of the customer selection screen
pub struct CustomersState {
    customers: Vec<Customer>,
    unbilled_totals: HashMap<String, f64>,
    list_state: ListState,
    diagnostics_enabled: bool,
}

impl CustomersState {
    pub fn new(
        customers: Vec<Customer>,
        unbilled_totals: HashMap<String, f64>,
        diagnostics_enabled: bool,
    ) -> Self {
        let mut list_state = ListState::default();
        if !customers.is_empty() {
            list_state.select(Some(0));
        }

        Self {
            customers,
            unbilled_totals,
            list_state,
            diagnostics_enabled,
        }
    }

    pub fn next(&mut self) {
        if self.customers.is_empty() {
            return;
        }

        let i = match self.list_state.selected() {
            Some(i) => {
                if i >= self.customers.len() - 1 {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn previous(&mut self) {
        if self.customers.is_empty() {
            return;
        }

        let i = match self.list_state.selected() {
            Some(i) => {
                if i == 0 {
                    self.customers.len() - 1
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn selected_customer(&self) -> Option<&Customer> {
        self.list_state.selected().and_then(|i| self.customers.get(i))
    }
}

pub enum CustomerAction {
    Exit,
    SelectCustomer(Customer),
    OpenFinancials,
    OpenCharts,
    OpenDiagnostics,
}

pub fn render_customers<B: TuiBackend>(frame: &mut Frame<B>, state: &mut CustomersState) {
    let size = frame.size();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(3),
        ].as_ref())
        .split(size);

    let items: Vec<ListItem> = state
        .customers
        .iter()
        .map(|customer| {
            let unbilled = state
                .unbilled_totals
                .get(&customer.id)
                .copied()
                .unwrap_or(0.0);
            let line = if unbilled > 0.0 {
                Spans::from(vec![
                    Span::raw(customer.name.clone()),
                    Span::styled(
                        format!("  ${unbilled:.2} unbilled"),
                        Style::default().fg(Color::Yellow),
                    ),
                ])
            } else {
                Spans::from(vec![Span::raw(customer.name.clone())])
            };
            ListItem::new(line)
        })
        .collect();

    let customers_list = List::new(items)
        .block(Block::default().title("Customers").borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        );

    frame.render_stateful_widget(customers_list, chunks[0], &mut state.list_state);

    let mut buttons_text =
        "<Enter> View Sales | <F> Financials | <C> Charts".to_string();
    if state.diagnostics_enabled {
        buttons_text.push_str(" | <D> Diagnostics");
    }
    buttons_text.push_str(" | <Q> Quit");

    let buttons = Paragraph::new(buttons_text)
        .block(Block::default().borders(Borders::TOP))
        .style(Style::default().fg(Color::White));

    frame.render_widget(buttons, chunks[1]);
}

pub fn handle_input(state: &mut CustomersState) -> Result<Option<CustomerAction>> {
    if let Event::Key(key) = event::read()? {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                return Ok(Some(CustomerAction::Exit));
            }
            KeyCode::Char('f') => {
                return Ok(Some(CustomerAction::OpenFinancials));
            }
            KeyCode::Char('c') => {
                return Ok(Some(CustomerAction::OpenCharts));
            }
            KeyCode::Char('d') => {
                if state.diagnostics_enabled {
                    return Ok(Some(CustomerAction::OpenDiagnostics));
                }
            }
            KeyCode::Down => {
                state.next();
            }
            KeyCode::Up => {
                state.previous();
            }
            KeyCode::Enter => {
                if let Some(customer) = state.selected_customer() {
                    return Ok(Some(CustomerAction::SelectCustomer(customer.clone())));
                }
            }
            _ => {}
        }
    }
    Ok(None)
}
