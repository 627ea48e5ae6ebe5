//! HTTP client for the controller's database-performance API.
//!
//! One authenticated `POST` per monitored database per tick, asking for the
//! top statements of the trailing 60-second window. The response row shape is
//! not fixed across controller versions, so rows stay as raw JSON objects and
//! the store applies the documented field-name fallbacks.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use serde_json::{Value, json};
use tracing::warn;

use crate::config::{AuthConfig, ControllerConfig};
use crate::error::{Error, Result};

use super::{DatabaseTarget, QuerySource};

/// Trailing window covered by one fetch, in milliseconds.
const WINDOW_MS: i64 = 60 * 1000;

/// Maximum statements requested per window.
const TOP_STATEMENTS: u32 = 100;

/// Request path below the controller base URL.
const QUERY_LIST_PATH: &str = "/controller/databasesui/databases/queryListData";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Blocking client for the controller API.
pub struct ControllerClient {
    http: Client,
    base_url: String,
    auth: AuthConfig,
}

impl ControllerClient {
    pub fn new(config: &ControllerConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(config.insecure)
            .build()
            .map_err(|e| Error::Http(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth: config.auth.clone(),
        })
    }

    fn apply_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            AuthConfig::Session {
                jsessionid,
                csrf_token,
            } => request
                .header("Cookie", format!("JSESSIONID={}", jsessionid))
                .header("X-CSRF-TOKEN", csrf_token.as_str()),
            AuthConfig::Basic {
                username,
                account,
                password,
            } => request.header(
                "Authorization",
                format!("Basic {}", basic_credential(username, account, password)),
            ),
        }
    }
}

impl QuerySource for ControllerClient {
    fn fetch(&self, target: &DatabaseTarget) -> Result<Vec<Value>> {
        let end_ms = Utc::now().timestamp_millis();
        let payload = query_list_payload(target.server_id, end_ms - WINDOW_MS, end_ms);
        let url = format!("{}{}", self.base_url, QUERY_LIST_PATH);

        let request = self.apply_auth(self.http.post(&url).json(&payload));

        let response = match request.send() {
            Ok(r) => r,
            Err(e) => {
                warn!("fetch failed for {}: {}", target.name, e);
                return Ok(Vec::new());
            }
        };

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::AuthRejected(status.as_u16()));
        }
        if !status.is_success() {
            warn!("fetch for {} returned HTTP {}", target.name, status.as_u16());
            return Ok(Vec::new());
        }

        match response.json::<Value>() {
            Ok(body) => Ok(extract_rows(body)),
            Err(e) => {
                warn!("fetch for {} returned malformed JSON: {}", target.name, e);
                Ok(Vec::new())
            }
        }
    }
}

/// Builds the fixed-shape request body for one window.
fn query_list_payload(server_id: i64, start_ms: i64, end_ms: i64) -> Value {
    json!({
        "dbConfigId": -1,
        "dbServerId": server_id,
        "field": "query-id",
        "size": TOP_STATEMENTS,
        "filterBy": "time",
        "startTime": start_ms,
        "endTime": end_ms,
        "useTimeBasedCorrelation": false,
        "waitStateIds": [],
    })
}

/// Pulls the record array out of either response shape: `{data: {data: [...]}}`
/// or a bare array. Anything else counts as "no data this tick".
fn extract_rows(body: Value) -> Vec<Value> {
    match body {
        Value::Array(rows) => rows,
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Object(mut inner)) => match inner.remove("data") {
                Some(Value::Array(rows)) => rows,
                _ => Vec::new(),
            },
            Some(Value::Array(rows)) => rows,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// HTTP Basic credential in the controller's `username@account:password` form.
fn basic_credential(username: &str, account: &str, password: &str) -> String {
    BASE64.encode(format!("{}@{}:{}", username, account, password))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_has_fixed_request_shape() {
        let payload = query_list_payload(21, 1000, 61000);
        assert_eq!(payload["dbConfigId"], -1);
        assert_eq!(payload["dbServerId"], 21);
        assert_eq!(payload["field"], "query-id");
        assert_eq!(payload["size"], 100);
        assert_eq!(payload["filterBy"], "time");
        assert_eq!(payload["startTime"], 1000);
        assert_eq!(payload["endTime"], 61000);
        assert_eq!(payload["useTimeBasedCorrelation"], false);
        assert_eq!(payload["waitStateIds"], json!([]));
    }

    #[test]
    fn extract_rows_handles_nested_shape() {
        let body = json!({"data": {"data": [{"queryText": "SELECT 1"}]}});
        let rows = extract_rows(body);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["queryText"], "SELECT 1");
    }

    #[test]
    fn extract_rows_handles_bare_array() {
        let rows = extract_rows(json!([{"a": 1}, {"b": 2}]));
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn extract_rows_rejects_garbage() {
        assert!(extract_rows(json!("nope")).is_empty());
        assert!(extract_rows(json!({"data": 42})).is_empty());
        assert!(extract_rows(json!({"data": {"data": "x"}})).is_empty());
        assert!(extract_rows(json!(null)).is_empty());
    }

    #[test]
    fn basic_credential_uses_account_convention() {
        assert_eq!(basic_credential("api", "acme", "pw"), "YXBpQGFjbWU6cHc=");
    }
}
