use serde::Deserialize;

/// One `customer_sales` row: a billable product/time-entry unit pending
/// invoicing. `inv_id` is set by the billing run once an invoice line exists.
#[derive(Debug, Clone, Deserialize)]
pub struct SaleLine {
    pub id: i64,
    pub customer_id: String,
    #[serde(default)]
    pub product_id: Option<String>,
    pub product_name: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub total_price: f64,
    pub currency: String,
    /// Back-reference to the FileMaker time entry, when one exists
    #[serde(default)]
    pub financial_id: Option<String>,
    #[serde(default)]
    pub inv_id: Option<String>,
}

impl SaleLine {
    pub fn is_unbilled(&self) -> bool {
        self.inv_id.is_none()
    }
}
