//! Customers and sale lines from the backend table proxy.

use std::collections::HashMap;

use serde_json::{Value, json};
use tracing::debug;

use crate::api::{ApiError, ApiResult, Backend};
use crate::models::{Customer, SaleLine};

pub const CUSTOMERS_TABLE: &str = "customers";
pub const SALES_TABLE: &str = "customer_sales";

/// Load all customers, sorted by name.
pub async fn load_customers(backend: &Backend) -> ApiResult<Vec<Customer>> {
    let rows = backend.supabase.select(CUSTOMERS_TABLE, &[]).await?;
    let mut customers = decode_rows::<Customer>(rows)?;
    customers.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(customers)
}

/// Load every sale line for one customer.
pub async fn load_sale_lines(backend: &Backend, customer_id: &str) -> ApiResult<Vec<SaleLine>> {
    let rows = backend
        .supabase
        .select(SALES_TABLE, &[("customer_id", json!(customer_id))])
        .await?;
    let lines = decode_rows::<SaleLine>(rows)?;
    debug!(customer_id, count = lines.len(), "loaded sale lines");
    Ok(lines)
}

/// Load all sale lines across customers (for the dashboard totals).
pub async fn load_all_sale_lines(backend: &Backend) -> ApiResult<Vec<SaleLine>> {
    let rows = backend.supabase.select(SALES_TABLE, &[]).await?;
    decode_rows::<SaleLine>(rows)
}

/// The lines still waiting for an invoice.
pub fn unbilled(lines: &[SaleLine]) -> Vec<SaleLine> {
    lines.iter().filter(|l| l.is_unbilled()).cloned().collect()
}

/// Unbilled amount per customer id.
pub fn unbilled_totals_by_customer(lines: &[SaleLine]) -> HashMap<String, f64> {
    let mut totals: HashMap<String, f64> = HashMap::new();
    for line in lines.iter().filter(|l| l.is_unbilled()) {
        *totals.entry(line.customer_id.clone()).or_default() += line.total_price;
    }
    totals
}

fn decode_rows<T: serde::de::DeserializeOwned>(rows: Vec<Value>) -> ApiResult<Vec<T>> {
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(row).map_err(|e| ApiError::Shape(format!("bad row: {e}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: i64, customer: &str, total: f64, inv_id: Option<&str>) -> SaleLine {
        SaleLine {
            id,
            customer_id: customer.to_string(),
            product_id: None,
            product_name: "AL3:NAEMT".to_string(),
            quantity: 1.0,
            unit_price: total,
            total_price: total,
            currency: "USD".to_string(),
            financial_id: None,
            inv_id: inv_id.map(str::to_string),
        }
    }

    #[test]
    fn unbilled_keeps_only_lines_without_invoice() {
        let lines = vec![
            line(1, "C-1", 100.0, None),
            line(2, "C-1", 50.0, Some("145")),
        ];
        let open = unbilled(&lines);
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, 1);
    }

    #[test]
    fn totals_sum_unbilled_per_customer() {
        let lines = vec![
            line(1, "C-1", 100.0, None),
            line(2, "C-1", 25.0, None),
            line(3, "C-2", 40.0, None),
            line(4, "C-2", 99.0, Some("145")),
        ];
        let totals = unbilled_totals_by_customer(&lines);
        assert!((totals["C-1"] - 125.0).abs() < 1e-9);
        assert!((totals["C-2"] - 40.0).abs() < 1e-9);
    }

    #[test]
    fn rows_decode_into_sale_lines() {
        let rows = vec![serde_json::json!({
            "id": 7, "customer_id": "C-1", "product_name": "AL3:NAEMT",
            "quantity": 6.97, "unit_price": 100.0, "total_price": 697.0,
            "currency": "USD", "financial_id": "a-b-c", "inv_id": null,
        })];
        let lines = decode_rows::<SaleLine>(rows).unwrap();
        assert_eq!(lines[0].id, 7);
        assert!(lines[0].is_unbilled());
        assert_eq!(lines[0].financial_id.as_deref(), Some("a-b-c"));
    }

    #[test]
    fn malformed_row_is_a_shape_error() {
        let rows = vec![serde_json::json!({"id": "not-a-number"})];
        assert!(decode_rows::<SaleLine>(rows).is_err());
    }
}
