//! Backend proxy client for the Postgres tables.
//!
//! Table access goes through the backend rather than a direct database
//! connection. Every request body is HMAC-SHA256 signed over
//! `{timestamp}.{body}` with the shared secret; the backend rejects stale or
//! tampered requests. Admin variants add a service-role marker so the backend
//! uses its row-level-security-bypassing client.

use std::time::Instant;

use reqwest::Client;
use serde_json::{Map, Value, json};
use tracing::debug;

use super::signing;
use super::{ApiError, ApiResult, friendly_error, normalize_base_url, status_error};

#[derive(Clone)]
pub struct SupabaseClient {
    http: Client,
    base_url: String,
    hmac_secret: String,
    service_role: bool,
}

impl SupabaseClient {
    pub fn new(http: Client, base_url: &str, hmac_secret: &str) -> Self {
        Self {
            http,
            base_url: normalize_base_url(base_url),
            hmac_secret: hmac_secret.to_string(),
            service_role: false,
        }
    }

    /// A copy of this client whose requests run with the service-role client
    /// on the backend, bypassing row-level security.
    pub fn admin(&self) -> Self {
        Self {
            service_role: true,
            ..self.clone()
        }
    }

    /// Select rows from a table, optionally filtered by column equality.
    pub async fn select(&self, table: &str, filters: &[(&str, Value)]) -> ApiResult<Vec<Value>> {
        let body = json!({ "filters": filter_map(filters) });
        let result = self.execute(table, "select", body).await?;
        rows_from(result)
    }

    /// Insert rows; returns the stored rows.
    pub async fn insert(&self, table: &str, rows: Value) -> ApiResult<Vec<Value>> {
        let body = json!({ "rows": rows });
        let result = self.execute(table, "insert", body).await?;
        rows_from(result)
    }

    /// Update rows matching the filters with the given column values.
    ///
    /// The update sets absolute values, so repeating the same call leaves the
    /// same stored state.
    pub async fn update(
        &self,
        table: &str,
        filters: &[(&str, Value)],
        values: Value,
    ) -> ApiResult<Vec<Value>> {
        let body = json!({ "filters": filter_map(filters), "values": values });
        let result = self.execute(table, "update", body).await?;
        rows_from(result)
    }

    /// Delete rows matching the filters; returns the number removed.
    pub async fn delete(&self, table: &str, filters: &[(&str, Value)]) -> ApiResult<u64> {
        let body = json!({ "filters": filter_map(filters) });
        let result = self.execute(table, "delete", body).await?;
        Ok(result
            .get("count")
            .and_then(Value::as_u64)
            .unwrap_or_default())
    }

    /// Lightweight connectivity check; returns latency in milliseconds.
    pub async fn health_check(&self) -> Result<u64, String> {
        let start = Instant::now();
        match self.select("customers", &[]).await {
            Ok(_) => Ok(start.elapsed().as_millis() as u64),
            Err(e) => Err(e.to_string()),
        }
    }

    async fn execute(&self, table: &str, op: &str, body: Value) -> ApiResult<Value> {
        let url = format!("{}/db/{table}/{op}", self.base_url);
        let payload = serde_json::to_vec(&body)
            .map_err(|e| ApiError::Shape(format!("unserializable request body: {e}")))?;

        let timestamp = signing::unix_timestamp();
        let signature = signing::compute_signature(&self.hmac_secret, &timestamp, &payload);
        debug!(%url, %op, "supabase proxy request");

        let mut request = self
            .http
            .post(&url)
            .header("Content-Type", "application/json")
            .header("X-Timestamp", &timestamp)
            .header("X-Signature", &signature)
            .body(payload);
        if self.service_role {
            request = request.header("X-Service-Role", "1");
        }

        let resp = request.send().await.map_err(|e| friendly_error(&url, &e))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.json::<Value>().await.ok();
            return Err(status_error(status, body.as_ref()));
        }

        resp.json::<Value>()
            .await
            .map_err(|e| ApiError::Shape(format!("invalid proxy response: {e}")))
    }
}

fn filter_map(filters: &[(&str, Value)]) -> Value {
    let mut map = Map::new();
    for (column, value) in filters {
        map.insert((*column).to_string(), value.clone());
    }
    Value::Object(map)
}

fn rows_from(result: Value) -> ApiResult<Vec<Value>> {
    match result.get("rows") {
        Some(Value::Array(rows)) => Ok(rows.clone()),
        Some(other) => Err(ApiError::Shape(format!(
            "expected a row array, got {other}"
        ))),
        None => Err(ApiError::Shape("response missing rows".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_become_an_object() {
        let filters = filter_map(&[("customer_id", json!("C-1")), ("inv_id", Value::Null)]);
        assert_eq!(filters["customer_id"], "C-1");
        assert!(filters["inv_id"].is_null());
    }

    #[test]
    fn rows_are_extracted() {
        let rows = rows_from(json!({"rows": [{"id": 1}, {"id": 2}]})).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn missing_rows_is_a_shape_error() {
        let err = rows_from(json!({"ok": true})).unwrap_err();
        assert!(matches!(err, ApiError::Shape(_)));
    }
}
