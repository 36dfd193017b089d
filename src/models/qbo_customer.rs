use serde::Deserialize;

use super::Ref;

#[derive(Debug, Clone, Deserialize)]
pub struct EmailAddr {
    #[serde(rename = "Address")]
    pub address: String,
}

/// A QuickBooks customer. Looked up by display name; there is no stable
/// foreign key held locally.
#[derive(Debug, Clone, Deserialize)]
pub struct QboCustomer {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "DisplayName")]
    pub display_name: String,
    #[serde(rename = "CurrencyRef", default)]
    pub currency_ref: Option<Ref>,
    #[serde(rename = "PrimaryEmailAddr", default)]
    pub primary_email: Option<EmailAddr>,
}

impl QboCustomer {
    pub fn email(&self) -> Option<&str> {
        self.primary_email.as_ref().map(|e| e.address.as_str())
    }
}
