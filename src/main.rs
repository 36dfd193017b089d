mod api;
mod config;
mod models;
mod services;
mod ui;

use std::io;

use anyhow::Result;
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use tracing::info;
use tui::{
    backend::{Backend as TuiBackend, CrosstermBackend},
    Terminal,
};

use crate::api::Backend;
use crate::services::{financial, sales};
use crate::ui::{
    charts::{ChartAction, ChartsState, handle_input as handle_charts_input, render_charts},
    customers::{
        CustomerAction, CustomersState, handle_input as handle_customers_input, render_customers,
    },
    diagnostics::{
        self, DiagnosticAction, DiagnosticsState, handle_input as handle_diagnostics_input,
        render_diagnostics,
    },
    financials::{
        FinancialAction, FinancialsState, handle_input as handle_financials_input,
        render_financials,
    },
    sales::{SalesAction, SalesState, handle_input as handle_sales_input, render_sales},
};

#[derive(Parser)]
#[command(name = "billing-console", about = "Customer billing console")]
struct Cli {
    /// Load environment variables from this file instead of .env
    #[arg(long)]
    env_file: Option<String>,

    /// Override the log directory from configuration
    #[arg(long)]
    log_dir: Option<String>,
}

// Represents the current screen in the app
enum AppScreen {
    Customers,
    Sales,
    Financials,
    Charts,
    Diagnostics,
}

// Main application state
struct AppState {
    backend: Backend,
    diagnostics_enabled: bool,
    screen: AppScreen,
    customers_state: Option<CustomersState>,
    sales_state: Option<SalesState>,
    financials_state: Option<FinancialsState>,
    charts_state: Option<ChartsState>,
    diagnostics_state: Option<DiagnosticsState>,
}

impl AppState {
    fn new(backend: Backend, diagnostics_enabled: bool) -> Self {
        Self {
            backend,
            diagnostics_enabled,
            screen: AppScreen::Customers,
            customers_state: None,
            sales_state: None,
            financials_state: None,
            charts_state: None,
            diagnostics_state: None,
        }
    }
}

// The TUI owns stdout, so logs go to rolling files only
fn init_tracing(log_dir: &str) {
    let file_appender = tracing_appender::rolling::daily(log_dir, "billing-console.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,billing_console=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();

    // Keep the writer guard alive for the process lifetime
    std::mem::forget(guard);
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = config::init(cli.env_file.as_deref())?;

    let log_dir = cli.log_dir.as_deref().unwrap_or(&config.log_dir);
    init_tracing(log_dir);
    info!("starting billing console");

    // Build the API clients
    let backend = api::init(&config)?;

    // Setup terminal
    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let tui_backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(tui_backend)?;

    // Create app state
    let mut app_state = AppState::new(backend, config.qbo_panel_enabled);

    // Initialize the customers state
    let load_result = load_customers_screen(&mut app_state).await;

    // Run the main app loop only if the initial load succeeded
    let result = match load_result {
        Ok(()) => run_app(&mut terminal, &mut app_state).await,
        Err(err) => Err(err),
    };

    // Restore terminal
    terminal::disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    // Show any error message
    if let Err(err) = result {
        println!("Error: {}", err);
    }

    Ok(())
}

async fn run_app<B: TuiBackend>(terminal: &mut Terminal<B>, app_state: &mut AppState) -> Result<()> {
    loop {
        // Render current screen
        terminal.draw(|f| {
            match app_state.screen {
                AppScreen::Customers => {
                    if let Some(state) = &mut app_state.customers_state {
                        render_customers(f, state);
                    }
                }
                AppScreen::Sales => {
                    if let Some(state) = &mut app_state.sales_state {
                        render_sales(f, state);
                    }
                }
                AppScreen::Financials => {
                    if let Some(state) = &mut app_state.financials_state {
                        render_financials(f, state);
                    }
                }
                AppScreen::Charts => {
                    if let Some(state) = &mut app_state.charts_state {
                        render_charts(f, state);
                    }
                }
                AppScreen::Diagnostics => {
                    if let Some(state) = &mut app_state.diagnostics_state {
                        render_diagnostics(f, state);
                    }
                }
            }
        })?;

        // Handle input for current screen
        let should_quit = match app_state.screen {
            AppScreen::Customers => handle_customers_screen(app_state).await?,
            AppScreen::Sales => handle_sales_screen(app_state).await?,
            AppScreen::Financials => handle_financials_screen(app_state)?,
            AppScreen::Charts => handle_charts_screen(app_state)?,
            AppScreen::Diagnostics => handle_diagnostics_screen(app_state).await?,
        };

        if should_quit {
            break;
        }
    }

    Ok(())
}

async fn load_customers_screen(app_state: &mut AppState) -> Result<()> {
    // Load customers and their unbilled totals from the store
    let customers = sales::load_customers(&app_state.backend).await?;
    let lines = sales::load_all_sale_lines(&app_state.backend).await?;
    let unbilled_totals = sales::unbilled_totals_by_customer(&lines);

    app_state.customers_state = Some(CustomersState::new(
        customers,
        unbilled_totals,
        app_state.diagnostics_enabled,
    ));
    app_state.screen = AppScreen::Customers;

    Ok(())
}

async fn handle_customers_screen(app_state: &mut AppState) -> Result<bool> {
    if let Some(state) = &mut app_state.customers_state {
        match handle_customers_input(state)? {
            Some(CustomerAction::Exit) => {
                return Ok(true);
            }
            Some(CustomerAction::SelectCustomer(customer)) => {
                // Load sale lines for the selected customer
                let lines = sales::load_sale_lines(&app_state.backend, &customer.id).await?;

                app_state.sales_state = Some(SalesState::new(customer, lines));
                app_state.screen = AppScreen::Sales;
            }
            Some(CustomerAction::OpenFinancials) => {
                let entries = financial::load_time_entries(&app_state.backend).await?;

                app_state.financials_state = Some(FinancialsState::new(entries));
                app_state.screen = AppScreen::Financials;
            }
            Some(CustomerAction::OpenCharts) => {
                let entries = financial::load_time_entries(&app_state.backend).await?;

                app_state.charts_state = Some(ChartsState::new(entries));
                app_state.screen = AppScreen::Charts;
            }
            Some(CustomerAction::OpenDiagnostics) => {
                let results = diagnostics::run_checks(&app_state.backend).await;

                app_state.diagnostics_state = Some(DiagnosticsState::new(results));
                app_state.screen = AppScreen::Diagnostics;
            }
            None => {}
        }
    }

    Ok(false)
}

async fn handle_sales_screen(app_state: &mut AppState) -> Result<bool> {
    if let Some(state) = &mut app_state.sales_state {
        match handle_sales_input(&app_state.backend, state).await? {
            Some(SalesAction::Back) => {
                // Go back to the customer list; unbilled totals may have changed
                load_customers_screen(app_state).await?;
            }
            Some(SalesAction::Reload) => {
                // A billing run finished; reload the lines for this customer
                let customer = state.customer().clone();
                let lines = sales::load_sale_lines(&app_state.backend, &customer.id).await?;

                app_state.sales_state = Some(SalesState::new(customer, lines));
            }
            None => {}
        }
    }

    Ok(false)
}

fn handle_financials_screen(app_state: &mut AppState) -> Result<bool> {
    if let Some(state) = &mut app_state.financials_state {
        match handle_financials_input(state)? {
            Some(FinancialAction::Back) => {
                app_state.screen = AppScreen::Customers;
            }
            None => {}
        }
    }

    Ok(false)
}

fn handle_charts_screen(app_state: &mut AppState) -> Result<bool> {
    if let Some(state) = &mut app_state.charts_state {
        match handle_charts_input(state)? {
            Some(ChartAction::Back) => {
                app_state.screen = AppScreen::Customers;
            }
            None => {}
        }
    }

    Ok(false)
}

async fn handle_diagnostics_screen(app_state: &mut AppState) -> Result<bool> {
    if app_state.diagnostics_state.is_some() {
        match handle_diagnostics_input()? {
            Some(DiagnosticAction::Back) => {
                app_state.screen = AppScreen::Customers;
            }
            Some(DiagnosticAction::Rerun) => {
                let results = diagnostics::run_checks(&app_state.backend).await;
                app_state.diagnostics_state = Some(DiagnosticsState::new(results));
            }
            None => {}
        }
    }

    Ok(false)
}
