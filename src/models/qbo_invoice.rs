use serde::{Deserialize, Serialize};

/// A `{ "value": ... }` reference, QBO's pointer-to-entity shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ref {
    pub value: String,
}

impl Ref {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

/// An invoice as QBO returns it.
#[derive(Debug, Clone, Deserialize)]
pub struct QboInvoice {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "DocNumber", default)]
    pub doc_number: Option<String>,
    #[serde(rename = "TotalAmt", default)]
    pub total_amt: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SalesItemLineDetail {
    #[serde(rename = "ItemRef")]
    pub item_ref: Ref,
    #[serde(rename = "Qty")]
    pub qty: f64,
    #[serde(rename = "UnitPrice")]
    pub unit_price: f64,
    #[serde(rename = "TaxCodeRef")]
    pub tax_code_ref: Ref,
}

/// One invoice line: a per-product-code group of sale lines.
#[derive(Debug, Clone, Serialize)]
pub struct QboInvoiceLine {
    #[serde(rename = "Amount")]
    pub amount: f64,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "DetailType")]
    pub detail_type: &'static str,
    #[serde(rename = "SalesItemLineDetail")]
    pub detail: SalesItemLineDetail,
}

/// The invoice-create request body.
#[derive(Debug, Clone, Serialize)]
pub struct QboInvoicePayload {
    #[serde(rename = "CustomerRef")]
    pub customer_ref: Ref,
    #[serde(rename = "DueDate")]
    pub due_date: String,
    #[serde(rename = "Line")]
    pub lines: Vec<QboInvoiceLine>,
}
