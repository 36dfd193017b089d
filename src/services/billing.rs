//! The billing reconciliation workflow.
//!
//! Turns a customer's unbilled sale lines into one QuickBooks invoice and
//! marks the lines billed across both stores. The sequence is strictly
//! linear: pre-flight line building (no network), customer resolution,
//! invoice creation, then the concurrent write-back and the email dispatch.
//! Write-backs are independent and never rolled back; a partial failure is
//! reported as an aggregate count.

use chrono::{Datelike, NaiveDate};
use serde_json::{Value, json};
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::api::{ApiError, Backend, QuickBooksClient};
use crate::models::{
    QboCustomer, QboInvoice, QboInvoiceLine, QboInvoicePayload, Ref, SaleLine, SalesItemLineDetail,
};

use super::financial::TIME_ENTRY_LAYOUT;
use super::sales::SALES_TABLE;

/// Invoices for this address are announced through a FileMaker script
/// instead of QuickBooks' send endpoint.
pub const EMAIL_SCRIPT_OVERRIDE: &str = "billing@naemt.example";

/// The FileMaker script that sends the invoice notice for the special case.
pub const INVOICE_NOTICE_SCRIPT: &str = "send invoice notice";

/// UUID field that links a sale line back to its FileMaker time entry.
const TIME_ENTRY_UUID_FIELD: &str = "f_uuid";

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("no unbilled sale lines for this customer")]
    NoUnbilledLines,

    #[error("unrecognized currency \"{0}\": no QuickBooks item mapping")]
    UnknownCurrency(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// QuickBooks item and tax-code ids per invoice currency.
const CURRENCY_ITEM_REFS: &[(&str, &str, &str)] = &[
    ("CAD", "3", "4"),
    ("USD", "7", "3"),
    ("EUR", "8", "3"),
];

/// Item and tax-code refs for a currency, or None when unmapped.
pub fn currency_refs(currency: &str) -> Option<(&'static str, &'static str)> {
    CURRENCY_ITEM_REFS
        .iter()
        .find(|(code, _, _)| *code == currency)
        .map(|(_, item, tax)| (*item, *tax))
}

/// The product code half of a sale line's product name.
///
/// Names look like `AL3:NAEMT` where the part before the colon is a
/// customer-code prefix; only the part after it identifies the product.
pub fn product_code(product_name: &str) -> &str {
    match product_name.split_once(':') {
        Some((_, code)) => code,
        None => product_name,
    }
}

/// Round to two decimal places.
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Build invoice lines from unbilled sale lines: one line per product code,
/// quantities and totals summed per group and rounded to cents.
///
/// Pure pre-flight: an unmapped currency fails here, before any network
/// call is issued.
pub fn build_invoice_lines(lines: &[SaleLine]) -> Result<Vec<QboInvoiceLine>, BillingError> {
    if lines.is_empty() {
        return Err(BillingError::NoUnbilledLines);
    }

    struct Group {
        code: String,
        quantity: f64,
        total: f64,
        unit_price: f64,
        item_ref: &'static str,
        tax_ref: &'static str,
    }

    // First-seen order, matching the order the lines arrive in
    let mut groups: Vec<Group> = Vec::new();
    for line in lines {
        let (item_ref, tax_ref) = currency_refs(&line.currency)
            .ok_or_else(|| BillingError::UnknownCurrency(line.currency.clone()))?;
        let code = product_code(&line.product_name).to_string();

        match groups.iter_mut().find(|g| g.code == code) {
            Some(group) => {
                group.quantity += line.quantity;
                group.total += line.total_price;
            }
            None => groups.push(Group {
                code,
                quantity: line.quantity,
                total: line.total_price,
                unit_price: line.unit_price,
                item_ref,
                tax_ref,
            }),
        }
    }

    Ok(groups
        .into_iter()
        .map(|group| QboInvoiceLine {
            amount: round_cents(group.total),
            description: group.code,
            detail_type: "SalesItemLineDetail",
            detail: SalesItemLineDetail {
                item_ref: Ref::new(group.item_ref),
                qty: round_cents(group.quantity),
                unit_price: group.unit_price,
                tax_code_ref: Ref::new(group.tax_ref),
            },
        })
        .collect())
}

/// Due date: the last day of the month following creation.
pub fn due_date_after(created: NaiveDate) -> NaiveDate {
    // First day of the month two months ahead, minus one day
    let (year, month) = match created.month() {
        11 => (created.year() + 1, 1),
        12 => (created.year() + 1, 2),
        m => (created.year(), m + 2),
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .unwrap_or(created)
        .pred_opt()
        .unwrap_or(created)
}

/// Assemble the invoice-create payload for a resolved QBO customer.
pub fn build_invoice_payload(
    qbo_customer_id: &str,
    lines: Vec<QboInvoiceLine>,
    created: NaiveDate,
) -> QboInvoicePayload {
    QboInvoicePayload {
        customer_ref: Ref::new(qbo_customer_id),
        due_date: due_date_after(created).format("%Y-%m-%d").to_string(),
        lines,
    }
}

/// Outcome of the QBO display-name search.
pub enum CustomerResolution {
    NotFound,
    Matched(QboCustomer),
    /// More than one customer shares the name; the user must pick one.
    Ambiguous(Vec<QboCustomer>),
}

/// Search QuickBooks for a customer matching the local customer name.
pub async fn resolve_customer(
    qbo: &QuickBooksClient,
    name: &str,
) -> Result<CustomerResolution, BillingError> {
    let mut matches = qbo.find_customers_by_name(name).await?;
    info!(name, matches = matches.len(), "resolved QBO customer");
    Ok(match matches.len() {
        0 => CustomerResolution::NotFound,
        1 => CustomerResolution::Matched(matches.remove(0)),
        _ => CustomerResolution::Ambiguous(matches),
    })
}

/// The column values written to a sale line once invoiced. Absolute values,
/// so repeating the write leaves the same stored state.
pub fn sale_line_write_back(invoice_id: &str) -> Value {
    json!({ "inv_id": invoice_id })
}

/// The field values that mark a FileMaker time entry billed.
pub fn time_entry_write_back() -> Value {
    json!({ "f_billed": "1" })
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WriteBackSummary {
    pub updated: usize,
    pub failed: usize,
}

/// Write the invoice id onto every sale line and flip the linked FileMaker
/// entries to billed. The per-line writes run concurrently and are
/// independent; failures are tallied, never rolled back.
pub async fn write_back(
    backend: &Backend,
    lines: &[SaleLine],
    invoice_id: &str,
) -> WriteBackSummary {
    let mut tasks = JoinSet::new();

    for line in lines.iter().cloned() {
        let supabase = backend.supabase.clone();
        let filemaker = backend.filemaker.clone();
        let invoice_id = invoice_id.to_string();

        tasks.spawn(async move {
            let updated = supabase
                .update(
                    SALES_TABLE,
                    &[("id", json!(line.id))],
                    sale_line_write_back(&invoice_id),
                )
                .await;
            if let Err(e) = updated {
                warn!(line_id = line.id, error = %e, "sale line write-back failed");
                return false;
            }

            if let Some(financial_id) = &line.financial_id {
                let record_id = match filemaker
                    .find_record_id(TIME_ENTRY_LAYOUT, TIME_ENTRY_UUID_FIELD, financial_id)
                    .await
                {
                    Ok(Some(record_id)) => record_id,
                    Ok(None) => {
                        warn!(financial_id, "no FileMaker record for sale line");
                        return false;
                    }
                    Err(e) => {
                        warn!(financial_id, error = %e, "FileMaker lookup failed");
                        return false;
                    }
                };
                if let Err(e) = filemaker
                    .update_record(TIME_ENTRY_LAYOUT, &record_id, time_entry_write_back())
                    .await
                {
                    warn!(financial_id, error = %e, "FileMaker write-back failed");
                    return false;
                }
            }

            true
        });
    }

    let mut summary = WriteBackSummary::default();
    while let Some(result) = tasks.join_next().await {
        match result {
            Ok(true) => summary.updated += 1,
            Ok(false) => summary.failed += 1,
            Err(e) => {
                warn!(error = %e, "write-back task panicked");
                summary.failed += 1;
            }
        }
    }

    info!(
        invoice_id,
        updated = summary.updated,
        failed = summary.failed,
        "write-back finished"
    );
    summary
}

/// How the invoice email went out.
pub enum EmailRoute {
    QboSend(String),
    FileMakerScript,
}

/// Email the invoice: QBO's native send endpoint, except for the hardcoded
/// customer address that is announced through a FileMaker script instead.
pub async fn dispatch_email(
    backend: &Backend,
    invoice: &QboInvoice,
    email: &str,
) -> Result<EmailRoute, BillingError> {
    if email.eq_ignore_ascii_case(EMAIL_SCRIPT_OVERRIDE) {
        backend
            .filemaker
            .run_script(TIME_ENTRY_LAYOUT, INVOICE_NOTICE_SCRIPT, &invoice.id)
            .await?;
        info!(invoice_id = %invoice.id, "invoice notice sent via FileMaker script");
        Ok(EmailRoute::FileMakerScript)
    } else {
        backend.quickbooks.send_invoice(&invoice.id, email).await?;
        info!(invoice_id = %invoice.id, to = email, "invoice emailed via QuickBooks");
        Ok(EmailRoute::QboSend(email.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sale_line(product: &str, quantity: f64, unit_price: f64, currency: &str) -> SaleLine {
        SaleLine {
            id: 1,
            customer_id: "C-1".to_string(),
            product_id: None,
            product_name: product.to_string(),
            quantity,
            unit_price,
            total_price: quantity * unit_price,
            currency: currency.to_string(),
            financial_id: None,
            inv_id: None,
        }
    }

    #[test]
    fn currency_map_matches_fixture() {
        assert_eq!(currency_refs("CAD"), Some(("3", "4")));
        assert_eq!(currency_refs("USD"), Some(("7", "3")));
        assert_eq!(currency_refs("EUR"), Some(("8", "3")));
        assert_eq!(currency_refs("GBP"), None);
    }

    #[test]
    fn product_code_takes_segment_after_colon() {
        assert_eq!(product_code("AL3:NAEMT"), "NAEMT");
        assert_eq!(product_code("NAEMT"), "NAEMT");
        assert_eq!(product_code("A:B:C"), "B:C");
    }

    #[test]
    fn lines_group_by_product_code() {
        // The literal scenario: two AL3:NAEMT lines become one invoice line
        // with Qty 7.31 and Amount 731.00.
        let lines = vec![
            sale_line("AL3:NAEMT", 6.97, 100.0, "USD"),
            sale_line("AL3:NAEMT", 0.34, 100.0, "USD"),
        ];
        let built = build_invoice_lines(&lines).unwrap();
        assert_eq!(built.len(), 1);
        assert_eq!(built[0].description, "NAEMT");
        assert_eq!(built[0].detail.qty, 7.31);
        assert_eq!(built[0].amount, 731.00);
        assert_eq!(built[0].detail.item_ref.value, "7");
        assert_eq!(built[0].detail.tax_code_ref.value, "3");
    }

    #[test]
    fn distinct_product_codes_stay_separate() {
        let lines = vec![
            sale_line("AL3:NAEMT", 1.0, 100.0, "CAD"),
            sale_line("AL3:EMS", 2.0, 50.0, "CAD"),
        ];
        let built = build_invoice_lines(&lines).unwrap();
        assert_eq!(built.len(), 2);
        assert_eq!(built[0].description, "NAEMT");
        assert_eq!(built[1].description, "EMS");
        assert_eq!(built[0].detail.item_ref.value, "3");
        assert_eq!(built[0].detail.tax_code_ref.value, "4");
    }

    #[test]
    fn unknown_currency_aborts_before_any_network_call() {
        let lines = vec![sale_line("AL3:NAEMT", 1.0, 100.0, "GBP")];
        let err = build_invoice_lines(&lines).unwrap_err();
        match err {
            BillingError::UnknownCurrency(code) => assert_eq!(code, "GBP"),
            other => panic!("expected UnknownCurrency, got {other}"),
        }
    }

    #[test]
    fn empty_line_set_is_rejected() {
        assert!(matches!(
            build_invoice_lines(&[]),
            Err(BillingError::NoUnbilledLines)
        ));
    }

    #[test]
    fn due_date_is_last_day_of_following_month() {
        let cases = [
            ((2026, 1, 15), (2026, 2, 28)),
            ((2026, 3, 1), (2026, 4, 30)),
            ((2026, 11, 30), (2026, 12, 31)),
            ((2026, 12, 5), (2027, 1, 31)),
            ((2024, 1, 10), (2024, 2, 29)), // leap year
        ];
        for ((y, m, d), (ey, em, ed)) in cases {
            let created = NaiveDate::from_ymd_opt(y, m, d).unwrap();
            let expected = NaiveDate::from_ymd_opt(ey, em, ed).unwrap();
            assert_eq!(due_date_after(created), expected, "from {created}");
        }
    }

    #[test]
    fn payload_carries_customer_and_due_date() {
        let lines = build_invoice_lines(&[sale_line("AL3:NAEMT", 1.0, 100.0, "USD")]).unwrap();
        let created = NaiveDate::from_ymd_opt(2026, 8, 29).unwrap();
        let payload = build_invoice_payload("42", lines, created);
        assert_eq!(payload.customer_ref.value, "42");
        assert_eq!(payload.due_date, "2026-09-30");
        assert_eq!(payload.lines.len(), 1);

        let body = serde_json::to_value(&payload).unwrap();
        assert_eq!(body["CustomerRef"]["value"], "42");
        assert_eq!(body["Line"][0]["DetailType"], "SalesItemLineDetail");
        assert_eq!(body["Line"][0]["SalesItemLineDetail"]["ItemRef"]["value"], "7");
    }

    #[test]
    fn write_back_values_are_idempotent() {
        // The update sets absolute values: issuing it twice with the same
        // invoice id yields the identical payload, hence the same stored row.
        let first = sale_line_write_back("145");
        let second = sale_line_write_back("145");
        assert_eq!(first, second);
        assert_eq!(first["inv_id"], "145");

        assert_eq!(time_entry_write_back(), time_entry_write_back());
        assert_eq!(time_entry_write_back()["f_billed"], "1");
    }
}
