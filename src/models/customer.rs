use serde::Deserialize;

/// A customer row from the `customers` table.
#[derive(Debug, Clone, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}
