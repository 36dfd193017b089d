//! QuickBooks Online client.
//!
//! Rides the backend proxy's `/qbo` routes with the same HMAC signing as the
//! table proxy. QBO's habit of capitalizing (or not) its envelope keys is
//! absorbed here with serde aliases; callers only ever see the typed shapes.

use std::time::Instant;

use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::models::{QboCustomer, QboInvoice, QboInvoicePayload};

use super::signing;
use super::{
    ApiError, ApiResult, extract_error_message, friendly_error, normalize_base_url, status_error,
    urlencode,
};

#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    #[serde(rename = "Customer", alias = "customer", default)]
    customers: Vec<QboCustomer>,
    #[serde(rename = "Invoice", alias = "invoice", default)]
    invoices: Vec<QboInvoice>,
}

#[derive(Debug, Deserialize)]
struct QueryEnvelope {
    #[serde(rename = "QueryResponse", alias = "queryResponse", default)]
    query_response: QueryResponse,
}

#[derive(Debug, Deserialize)]
struct CustomerEnvelope {
    #[serde(rename = "Customer", alias = "customer")]
    customer: Option<QboCustomer>,
}

#[derive(Debug, Deserialize)]
struct InvoiceEnvelope {
    #[serde(rename = "Invoice", alias = "invoice")]
    invoice: Option<QboInvoice>,
}

#[derive(Clone)]
pub struct QuickBooksClient {
    http: Client,
    base_url: String,
    hmac_secret: String,
}

impl QuickBooksClient {
    pub fn new(http: Client, base_url: &str, hmac_secret: &str) -> Self {
        Self {
            http,
            base_url: normalize_base_url(base_url),
            hmac_secret: hmac_secret.to_string(),
        }
    }

    /// Search customers by exact display name.
    pub async fn find_customers_by_name(&self, name: &str) -> ApiResult<Vec<QboCustomer>> {
        let escaped = name.replace('\'', "\\'");
        let query = format!("select * from Customer where DisplayName = '{escaped}'");
        let path = format!("/qbo/query?query={}", urlencode(&query));
        let value = self.execute(Method::GET, &path, None).await?;
        let envelope: QueryEnvelope = decode(value)?;
        Ok(envelope.query_response.customers)
    }

    /// Create a customer.
    pub async fn create_customer(
        &self,
        display_name: &str,
        email: Option<&str>,
        currency: &str,
    ) -> ApiResult<QboCustomer> {
        let mut body = json!({
            "DisplayName": display_name,
            "CurrencyRef": { "value": currency },
        });
        if let Some(email) = email {
            body["PrimaryEmailAddr"] = json!({ "Address": email });
        }

        let value = self.execute(Method::POST, "/qbo/customers", Some(body)).await?;
        let envelope: CustomerEnvelope = decode(value.clone())?;
        envelope
            .customer
            .ok_or_else(|| ApiError::Vendor(extract_error_message(&value)))
    }

    /// Create an invoice. A response without a recognized invoice shape is a
    /// failure; the vendor's message is surfaced as the error.
    pub async fn create_invoice(&self, payload: &QboInvoicePayload) -> ApiResult<QboInvoice> {
        let body = serde_json::to_value(payload)
            .map_err(|e| ApiError::Shape(format!("unserializable invoice payload: {e}")))?;
        let value = self.execute(Method::POST, "/qbo/invoices", Some(body)).await?;
        let envelope: InvoiceEnvelope = decode(value.clone())?;
        envelope
            .invoice
            .ok_or_else(|| ApiError::Vendor(extract_error_message(&value)))
    }

    /// Look up an invoice by its document number.
    pub async fn find_invoice_by_doc_number(&self, doc_number: &str) -> ApiResult<Option<QboInvoice>> {
        let escaped = doc_number.replace('\'', "\\'");
        let query = format!("select * from Invoice where DocNumber = '{escaped}'");
        let path = format!("/qbo/query?query={}", urlencode(&query));
        let value = self.execute(Method::GET, &path, None).await?;
        let envelope: QueryEnvelope = decode(value)?;
        Ok(envelope.query_response.invoices.into_iter().next())
    }

    /// Email an invoice through QBO's native send endpoint.
    pub async fn send_invoice(&self, invoice_id: &str, send_to: &str) -> ApiResult<()> {
        let path = format!("/qbo/invoices/{invoice_id}/send?sendTo={}", urlencode(send_to));
        self.execute(Method::POST, &path, None).await?;
        Ok(())
    }

    /// Lightweight connectivity check; returns latency in milliseconds.
    pub async fn health_check(&self) -> Result<u64, String> {
        let start = Instant::now();
        match self.execute(Method::GET, "/qbo/companyinfo", None).await {
            Ok(_) => Ok(start.elapsed().as_millis() as u64),
            Err(e) => Err(e.to_string()),
        }
    }

    async fn execute(&self, method: Method, path: &str, body: Option<Value>) -> ApiResult<Value> {
        let url = format!("{}{path}", self.base_url);
        let payload = match &body {
            Some(body) => serde_json::to_vec(body)
                .map_err(|e| ApiError::Shape(format!("unserializable request body: {e}")))?,
            None => Vec::new(),
        };

        let timestamp = signing::unix_timestamp();
        let signature = signing::compute_signature(&self.hmac_secret, &timestamp, &payload);
        debug!(%method, %url, "quickbooks request");

        let mut request = self
            .http
            .request(method, &url)
            .header("X-Timestamp", &timestamp)
            .header("X-Signature", &signature);
        if body.is_some() {
            request = request
                .header("Content-Type", "application/json")
                .body(payload);
        }

        let resp = request.send().await.map_err(|e| friendly_error(&url, &e))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.json::<Value>().await.ok();
            return Err(status_error(status, body.as_ref()));
        }

        resp.json::<Value>()
            .await
            .map_err(|e| ApiError::Shape(format!("invalid QuickBooks response: {e}")))
    }
}

fn decode<T: serde::de::DeserializeOwned>(value: Value) -> ApiResult<T> {
    serde_json::from_value(value).map_err(|e| ApiError::Shape(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_envelope_accepts_both_casings() {
        let upper = json!({"QueryResponse": {"Customer": [
            {"Id": "42", "DisplayName": "NAEMT", "CurrencyRef": {"value": "USD"}}
        ]}});
        let lower = json!({"queryResponse": {"customer": [
            {"Id": "42", "DisplayName": "NAEMT", "CurrencyRef": {"value": "USD"}}
        ]}});

        let a: QueryEnvelope = decode(upper).unwrap();
        let b: QueryEnvelope = decode(lower).unwrap();
        assert_eq!(a.query_response.customers.len(), 1);
        assert_eq!(b.query_response.customers.len(), 1);
        assert_eq!(a.query_response.customers[0].id, "42");
    }

    #[test]
    fn empty_query_response_is_no_customers() {
        let envelope: QueryEnvelope = decode(json!({"QueryResponse": {}})).unwrap();
        assert!(envelope.query_response.customers.is_empty());
    }

    #[test]
    fn invoice_envelope_accepts_both_casings() {
        let upper = json!({"Invoice": {"Id": "99", "DocNumber": "1042"}});
        let lower = json!({"invoice": {"Id": "99", "DocNumber": "1042"}});

        let a: InvoiceEnvelope = decode(upper).unwrap();
        let b: InvoiceEnvelope = decode(lower).unwrap();
        assert_eq!(a.invoice.unwrap().id, "99");
        assert_eq!(b.invoice.unwrap().id, "99");
    }

    #[test]
    fn fault_body_yields_no_invoice() {
        let body = json!({"Fault": {"Error": [{"Detail": "Duplicate Name"}]}});
        let envelope: InvoiceEnvelope = decode(body.clone()).unwrap();
        assert!(envelope.invoice.is_none());
        assert_eq!(extract_error_message(&body), "Duplicate Name");
    }

    #[test]
    fn query_strings_are_percent_encoded() {
        let encoded = urlencode("select * from Customer where DisplayName = 'A B'");
        assert!(!encoded.contains(' '));
        assert!(encoded.contains("%20"));
        assert!(encoded.contains("%27"));
    }
}
