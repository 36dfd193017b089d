//! FileMaker Data API edge client.
//!
//! Wraps the edge function in front of the FileMaker Data API with bearer
//! authentication. Records are addressed by layout name; each record carries
//! the layout's `fieldData` plus FileMaker's internal record id, which is the
//! handle every update and delete needs.

use std::time::Instant;

use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::{ApiError, ApiResult, friendly_error, normalize_base_url, status_error, urlencode};

/// One record as returned by the Data API.
#[derive(Debug, Clone, Deserialize)]
pub struct FmRecord {
    #[serde(rename = "recordId")]
    pub record_id: String,
    #[serde(rename = "fieldData", default)]
    pub field_data: Value,
}

#[derive(Debug, Deserialize)]
struct FmEnvelope {
    #[serde(default)]
    response: FmResponse,
}

#[derive(Debug, Default, Deserialize)]
struct FmResponse {
    #[serde(default)]
    data: Vec<FmRecord>,
    #[serde(rename = "recordId", default)]
    record_id: Option<String>,
    #[serde(rename = "scriptResult", default)]
    script_result: Option<String>,
}

#[derive(Clone)]
pub struct FileMakerClient {
    http: Client,
    base_url: String,
    token: String,
}

impl FileMakerClient {
    pub fn new(http: Client, base_url: &str, token: &str) -> Self {
        Self {
            http,
            base_url: normalize_base_url(base_url),
            token: token.to_string(),
        }
    }

    /// List records from a layout.
    pub async fn list_records(&self, layout: &str, limit: Option<u32>) -> ApiResult<Vec<FmRecord>> {
        let mut path = format!("/records/{layout}");
        if let Some(limit) = limit {
            path.push_str(&format!("?_limit={limit}"));
        }
        let envelope = self.execute(Method::GET, &path, None).await?;
        Ok(envelope.response.data)
    }

    /// Fetch a single record by its internal record id.
    pub async fn get_record(&self, layout: &str, record_id: &str) -> ApiResult<FmRecord> {
        let path = format!("/records/{layout}/{record_id}");
        let envelope = self.execute(Method::GET, &path, None).await?;
        envelope
            .response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Shape(format!("record {record_id} came back empty")))
    }

    /// Run a find request against a layout.
    ///
    /// `query` is a list of field/value criteria, matching the Data API's
    /// find-request body.
    pub async fn find_records(&self, layout: &str, query: Value) -> ApiResult<Vec<FmRecord>> {
        let path = format!("/records/{layout}?_find=true");
        let body = json!({ "query": query });
        match self.execute(Method::POST, &path, Some(body)).await {
            Ok(envelope) => Ok(envelope.response.data),
            // FileMaker reports an empty find as 404; callers just see no rows
            Err(ApiError::Status { status: 404, .. }) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Find the internal record id for a record keyed by a UUID field.
    pub async fn find_record_id(
        &self,
        layout: &str,
        uuid_field: &str,
        uuid: &str,
    ) -> ApiResult<Option<String>> {
        let records = self
            .find_records(layout, json!([{ uuid_field: uuid }]))
            .await?;
        Ok(records.into_iter().next().map(|r| r.record_id))
    }

    /// Create a record; returns the new internal record id.
    pub async fn create_record(&self, layout: &str, field_data: Value) -> ApiResult<String> {
        let path = format!("/records/{layout}");
        let body = json!({ "fieldData": field_data });
        let envelope = self.execute(Method::POST, &path, Some(body)).await?;
        envelope
            .response
            .record_id
            .ok_or_else(|| ApiError::Shape("create response missing recordId".to_string()))
    }

    /// Update fields on a record addressed by its internal record id.
    pub async fn update_record(
        &self,
        layout: &str,
        record_id: &str,
        field_data: Value,
    ) -> ApiResult<()> {
        let path = format!("/records/{layout}/{record_id}");
        let body = json!({ "fieldData": field_data });
        self.execute(Method::PATCH, &path, Some(body)).await?;
        Ok(())
    }

    /// Delete a record by its internal record id.
    pub async fn delete_record(&self, layout: &str, record_id: &str) -> ApiResult<()> {
        let path = format!("/records/{layout}/{record_id}");
        self.execute(Method::DELETE, &path, None).await?;
        Ok(())
    }

    /// Execute a FileMaker script; returns the script result if any.
    pub async fn run_script(
        &self,
        layout: &str,
        script: &str,
        param: &str,
    ) -> ApiResult<Option<String>> {
        let path = format!(
            "/scripts/{layout}/{script}?script.param={}",
            urlencode(param)
        );
        let envelope = self.execute(Method::GET, &path, None).await?;
        Ok(envelope.response.script_result)
    }

    /// Download a container field's contents.
    pub async fn download_container(
        &self,
        layout: &str,
        record_id: &str,
        field: &str,
        repetition: u32,
    ) -> ApiResult<Vec<u8>> {
        let url = format!(
            "{}/containers/{layout}/{record_id}/{field}/{repetition}",
            self.base_url
        );
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| friendly_error(&url, &e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.json::<Value>().await.ok();
            return Err(status_error(status, body.as_ref()));
        }
        let bytes = resp.bytes().await.map_err(|e| friendly_error(&url, &e))?;
        Ok(bytes.to_vec())
    }

    /// Upload a file into a container field (multipart).
    pub async fn upload_container(
        &self,
        layout: &str,
        record_id: &str,
        field: &str,
        repetition: u32,
        file_name: &str,
        contents: Vec<u8>,
    ) -> ApiResult<()> {
        let url = format!(
            "{}/containers/{layout}/{record_id}/{field}/{repetition}",
            self.base_url
        );
        let part = reqwest::multipart::Part::bytes(contents).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("upload", part);

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| friendly_error(&url, &e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.json::<Value>().await.ok();
            return Err(status_error(status, body.as_ref()));
        }
        Ok(())
    }

    /// Lightweight connectivity check; returns latency in milliseconds.
    pub async fn health_check(&self, layout: &str) -> Result<u64, String> {
        let client = Client::builder()
            .timeout(super::CONNECTIVITY_TIMEOUT)
            .build()
            .map_err(|e| format!("failed to create HTTP client: {e}"))?;
        let url = format!("{}/records/{layout}?_limit=1", self.base_url);

        let start = Instant::now();
        let resp = client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| friendly_error(&url, &e).to_string())?;
        let latency = start.elapsed().as_millis() as u64;

        if resp.status().is_success() {
            Ok(latency)
        } else {
            Err(status_error(resp.status(), None).to_string())
        }
    }

    async fn execute(&self, method: Method, path: &str, body: Option<Value>) -> ApiResult<FmEnvelope> {
        let url = format!("{}{path}", self.base_url);
        debug!(%method, %url, "filemaker request");

        let mut request = self
            .http
            .request(method, &url)
            .bearer_auth(&self.token);
        if let Some(body) = &body {
            request = request.json(body);
        }

        let resp = request.send().await.map_err(|e| friendly_error(&url, &e))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.json::<Value>().await.ok();
            return Err(status_error(status, body.as_ref()));
        }

        // DELETE and PATCH responses carry an empty response object, which
        // still deserializes into the envelope.
        resp.json::<FmEnvelope>()
            .await
            .map_err(|e| ApiError::Shape(format!("invalid FileMaker response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_envelope_deserializes() {
        let raw = serde_json::json!({
            "response": {
                "data": [
                    {"recordId": "118", "modId": "3", "fieldData": {"f_hours": 2.5}}
                ]
            }
        });
        let envelope: FmEnvelope = serde_json::from_value(raw).unwrap();
        assert_eq!(envelope.response.data.len(), 1);
        assert_eq!(envelope.response.data[0].record_id, "118");
        assert_eq!(envelope.response.data[0].field_data["f_hours"], 2.5);
    }

    #[test]
    fn create_envelope_deserializes() {
        let raw = serde_json::json!({"response": {"recordId": "7"}});
        let envelope: FmEnvelope = serde_json::from_value(raw).unwrap();
        assert_eq!(envelope.response.record_id.as_deref(), Some("7"));
        assert!(envelope.response.data.is_empty());
    }

    #[test]
    fn empty_envelope_deserializes() {
        let raw = serde_json::json!({"response": {}});
        let envelope: FmEnvelope = serde_json::from_value(raw).unwrap();
        assert!(envelope.response.data.is_empty());
        assert!(envelope.response.record_id.is_none());
    }
}
