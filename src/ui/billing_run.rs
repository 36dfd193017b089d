//! The billing-run wizard, embedded in the sales screen.
//!
//! Replaces the blocking confirm/prompt dialogs of old with explicit phases:
//! ambiguity and create-customer decisions are pending states the user
//! answers through normal key handling, and Esc aborts cleanly before the
//! invoice call.

use anyhow::Result;
use chrono::Local;
use crossterm::event::{self, Event, KeyCode};
use tui::{
    backend::Backend as TuiBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::Spans,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};
use tracing::info;

use crate::api::Backend;
use crate::models::{Customer, QboCustomer, QboInvoiceLine, SaleLine};
use crate::services::billing::{
    self, CustomerResolution, EmailRoute,
};
use crate::ui::centered_rect;

// Represents the state of the billing-run wizard
pub struct BillingRunState {
    customer: Customer,
    unbilled: Vec<SaleLine>,
    invoice_lines: Vec<QboInvoiceLine>,
    phase: BillingPhase,
    completed: bool,
}

pub enum BillingPhase {
    /// Show what is about to be invoiced; Enter starts the run
    Confirm,
    /// Multiple QBO customers share the name; the user picks one
    ChooseCustomer {
        candidates: Vec<QboCustomer>,
        list_state: ListState,
    },
    /// No QBO customer found; offer to create one
    ConfirmCreate,
    Done(String),
    Failed(String),
}

// Possible actions from the wizard's input handling
pub enum BillingRunAction {
    Cancel,
    Start,
    UseCandidate(usize),
    CreateCustomer,
}

impl BillingRunState {
    pub fn new(customer: Customer, unbilled: Vec<SaleLine>) -> Self {
        Self {
            customer,
            unbilled,
            invoice_lines: Vec::new(),
            phase: BillingPhase::Confirm,
            completed: false,
        }
    }

    /// True once the run created an invoice, so the host screen knows to
    /// reload its sale lines when the wizard closes.
    pub fn completed(&self) -> bool {
        self.completed
    }

    fn fail(&mut self, message: String) {
        self.phase = BillingPhase::Failed(message);
    }
}

pub fn render_billing_run<B: TuiBackend>(frame: &mut Frame<B>, state: &mut BillingRunState) {
    let size = frame.size();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(3),
        ].as_ref())
        .split(size);

    let title = Paragraph::new(format!("Invoice {}", state.customer.name))
        .style(Style::default().fg(Color::White).add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(title, chunks[0]);

    match &mut state.phase {
        BillingPhase::Confirm => {
            let mut body = vec![
                Spans::from(format!(
                    "{} unbilled line(s), ${:.2} total",
                    state.unbilled.len(),
                    state.unbilled.iter().map(|l| l.total_price).sum::<f64>(),
                )),
                Spans::from(""),
            ];
            for line in &state.unbilled {
                body.push(Spans::from(format!(
                    "  {}  qty {:.2}  ${:.2}",
                    line.product_name, line.quantity, line.total_price
                )));
            }
            let summary = Paragraph::new(body)
                .block(Block::default().title("Unbilled Sales").borders(Borders::ALL));
            frame.render_widget(summary, chunks[1]);

            let buttons = Paragraph::new("<Enter> Create Invoice | <Esc> Cancel")
                .block(Block::default().borders(Borders::TOP));
            frame.render_widget(buttons, chunks[2]);
        }
        BillingPhase::ChooseCustomer { candidates, list_state } => {
            let items: Vec<ListItem> = candidates
                .iter()
                .map(|c| {
                    let currency = c
                        .currency_ref
                        .as_ref()
                        .map(|r| r.value.as_str())
                        .unwrap_or("?");
                    ListItem::new(Spans::from(format!(
                        "{} (#{}, {currency})",
                        c.display_name, c.id
                    )))
                })
                .collect();

            let list = List::new(items)
                .block(
                    Block::default()
                        .title("Multiple QuickBooks customers match, pick one")
                        .borders(Borders::ALL),
                )
                .highlight_style(
                    Style::default()
                        .bg(Color::Blue)
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD),
                );
            frame.render_stateful_widget(list, chunks[1], list_state);

            let buttons = Paragraph::new("<Enter> Use Selected | <Esc> Abort")
                .block(Block::default().borders(Borders::TOP));
            frame.render_widget(buttons, chunks[2]);
        }
        BillingPhase::ConfirmCreate => {
            let popup_area = centered_rect(60, 30, size);
            let popup = Paragraph::new(vec![
                Spans::from(""),
                Spans::from(format!(
                    "No QuickBooks customer named \"{}\".",
                    state.customer.name
                )),
                Spans::from(""),
                Spans::from("Create one and continue?"),
                Spans::from(""),
                Spans::from("<Y> Yes  <N> No"),
            ])
            .block(Block::default().title("Create Customer").borders(Borders::ALL))
            .style(Style::default().fg(Color::White).bg(Color::Black));
            frame.render_widget(popup, popup_area);
        }
        BillingPhase::Done(message) => {
            let popup_area = centered_rect(70, 30, size);
            let popup = Paragraph::new(vec![
                Spans::from(""),
                Spans::from(message.as_str()),
                Spans::from(""),
                Spans::from("Press any key to continue"),
            ])
            .block(Block::default().title("Invoice Created").borders(Borders::ALL))
            .style(Style::default().fg(Color::Green));
            frame.render_widget(popup, popup_area);
        }
        BillingPhase::Failed(message) => {
            let popup_area = centered_rect(70, 30, size);
            let popup = Paragraph::new(vec![
                Spans::from(""),
                Spans::from(message.as_str()),
                Spans::from(""),
                Spans::from("Press any key to continue"),
            ])
            .block(Block::default().title("Billing Failed").borders(Borders::ALL))
            .style(Style::default().fg(Color::Red));
            frame.render_widget(popup, popup_area);
        }
    }
}

pub fn handle_input(state: &mut BillingRunState) -> Result<Option<BillingRunAction>> {
    if let Event::Key(key) = event::read()? {
        match &mut state.phase {
            BillingPhase::Confirm => match key.code {
                KeyCode::Enter => return Ok(Some(BillingRunAction::Start)),
                KeyCode::Esc | KeyCode::Char('q') => return Ok(Some(BillingRunAction::Cancel)),
                _ => {}
            },
            BillingPhase::ChooseCustomer { candidates, list_state } => match key.code {
                KeyCode::Down => {
                    let i = match list_state.selected() {
                        Some(i) if i + 1 < candidates.len() => i + 1,
                        Some(_) => 0,
                        None => 0,
                    };
                    list_state.select(Some(i));
                }
                KeyCode::Up => {
                    let i = match list_state.selected() {
                        Some(0) | None => candidates.len().saturating_sub(1),
                        Some(i) => i - 1,
                    };
                    list_state.select(Some(i));
                }
                KeyCode::Enter => {
                    if let Some(i) = list_state.selected() {
                        return Ok(Some(BillingRunAction::UseCandidate(i)));
                    }
                }
                // Aborting the pick ends the whole run; no invoice call is made
                KeyCode::Esc => return Ok(Some(BillingRunAction::Cancel)),
                _ => {}
            },
            BillingPhase::ConfirmCreate => match key.code {
                KeyCode::Char('y') => return Ok(Some(BillingRunAction::CreateCustomer)),
                KeyCode::Char('n') | KeyCode::Esc => {
                    return Ok(Some(BillingRunAction::Cancel));
                }
                _ => {}
            },
            BillingPhase::Done(_) | BillingPhase::Failed(_) => {
                return Ok(Some(BillingRunAction::Cancel));
            }
        }
    }
    Ok(None)
}

/// Start the run: build the invoice lines (pure pre-flight), then resolve
/// the QBO customer. An unmapped currency fails here with zero requests
/// issued.
pub async fn start_run(backend: &Backend, state: &mut BillingRunState) -> Result<()> {
    state.invoice_lines = match billing::build_invoice_lines(&state.unbilled) {
        Ok(lines) => lines,
        Err(e) => {
            state.fail(e.to_string());
            return Ok(());
        }
    };

    match billing::resolve_customer(&backend.quickbooks, &state.customer.name).await {
        Ok(CustomerResolution::Matched(customer)) => finish_run(backend, state, customer).await,
        Ok(CustomerResolution::NotFound) => {
            state.phase = BillingPhase::ConfirmCreate;
            Ok(())
        }
        Ok(CustomerResolution::Ambiguous(candidates)) => {
            let mut list_state = ListState::default();
            list_state.select(Some(0));
            state.phase = BillingPhase::ChooseCustomer {
                candidates,
                list_state,
            };
            Ok(())
        }
        Err(e) => {
            state.fail(format!("Customer lookup failed: {e}"));
            Ok(())
        }
    }
}

/// Continue the run with the candidate the user picked.
pub async fn continue_with_candidate(
    backend: &Backend,
    state: &mut BillingRunState,
    index: usize,
) -> Result<()> {
    let picked = match &state.phase {
        BillingPhase::ChooseCustomer { candidates, .. } => candidates.get(index).cloned(),
        _ => None,
    };
    match picked {
        Some(customer) => finish_run(backend, state, customer).await,
        None => {
            state.fail("Invalid customer selection".to_string());
            Ok(())
        }
    }
}

/// Create the missing QBO customer, then continue the run with it.
pub async fn create_customer_and_continue(
    backend: &Backend,
    state: &mut BillingRunState,
) -> Result<()> {
    // Currency for the new customer comes from the lines being invoiced
    let currency = state
        .unbilled
        .first()
        .map(|l| l.currency.clone())
        .unwrap_or_else(|| "USD".to_string());

    let created = backend
        .quickbooks
        .create_customer(
            &state.customer.name,
            state.customer.email.as_deref(),
            &currency,
        )
        .await;

    match created {
        Ok(customer) => {
            info!(qbo_id = %customer.id, "created QBO customer");
            finish_run(backend, state, customer).await
        }
        Err(e) => {
            state.fail(format!("Customer creation failed: {e}"));
            Ok(())
        }
    }
}

/// Create the invoice, run the write-backs, and send the email. Invoice
/// failure stops everything; write-back and email failures are reported but
/// never undone.
async fn finish_run(
    backend: &Backend,
    state: &mut BillingRunState,
    qbo_customer: QboCustomer,
) -> Result<()> {
    let payload = billing::build_invoice_payload(
        &qbo_customer.id,
        state.invoice_lines.clone(),
        Local::now().date_naive(),
    );

    let invoice = match backend.quickbooks.create_invoice(&payload).await {
        Ok(invoice) => invoice,
        Err(e) => {
            // No write-back happens after a failed create
            state.fail(format!("Invoice creation failed: {e}"));
            return Ok(());
        }
    };
    state.completed = true;

    let summary = billing::write_back(backend, &state.unbilled, &invoice.id).await;
    let doc = invoice.doc_number.clone().unwrap_or_else(|| invoice.id.clone());
    let total = invoice
        .total_amt
        .unwrap_or_else(|| state.unbilled.iter().map(|l| l.total_price).sum());

    let mut message = format!(
        "Invoice #{doc} for ${total:.2} created; {} line(s) marked billed",
        summary.updated
    );
    if summary.failed > 0 {
        message.push_str(&format!(", {} write-back(s) FAILED", summary.failed));
    }

    let email = state
        .customer
        .email
        .clone()
        .or_else(|| qbo_customer.email().map(str::to_string));
    match email {
        Some(email) => match billing::dispatch_email(backend, &invoice, &email).await {
            Ok(EmailRoute::QboSend(to)) => message.push_str(&format!("; emailed to {to}")),
            Ok(EmailRoute::FileMakerScript) => {
                message.push_str("; notice sent via FileMaker script")
            }
            Err(e) => message.push_str(&format!("; email failed: {e}")),
        },
        None => message.push_str("; no email address on file"),
    }

    state.phase = BillingPhase::Done(message);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer() -> Customer {
        Customer {
            id: "C-1".to_string(),
            name: "NAEMT".to_string(),
            email: None,
        }
    }

    fn line(total: f64) -> SaleLine {
        SaleLine {
            id: 1,
            customer_id: "C-1".to_string(),
            product_id: None,
            product_name: "AL3:NAEMT".to_string(),
            quantity: 1.0,
            unit_price: total,
            total_price: total,
            currency: "USD".to_string(),
            financial_id: None,
            inv_id: None,
        }
    }

    #[test]
    fn new_wizard_starts_in_confirm_phase() {
        let state = BillingRunState::new(customer(), vec![line(100.0), line(25.0)]);
        assert!(matches!(state.phase, BillingPhase::Confirm));
        assert!(!state.completed());
        let total: f64 = state.unbilled.iter().map(|l| l.total_price).sum();
        assert!((total - 125.0).abs() < 1e-9);
    }

    #[test]
    fn failing_marks_the_phase_without_completion() {
        let mut state = BillingRunState::new(customer(), vec![line(100.0)]);
        state.fail("boom".to_string());
        assert!(matches!(&state.phase, BillingPhase::Failed(m) if m == "boom"));
        assert!(!state.completed());
    }
}
