//! Browser-Use task gateway.
//!
//! Typed client for the Browser-Use cloud API v1. The trait seam exists so
//! the task lifecycle controller (and tests) can run against a substitute
//! upstream.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::BrowserUseConfig;
use crate::error::GatewayError;

pub const PROVIDER: &str = "browser-use";

/// Model used for automation runs when the caller does not pick one.
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o";

/// Domains every automation run may touch. Caller-supplied domains extend
/// this set; they can never narrow it.
pub const DEFAULT_ALLOWED_DOMAINS: &[&str] = &[
    "solana.com",
    "solscan.io",
    "solflare.com",
    "phantom.app",
    "bonkbutton.com",
    "letsbonk.fun",
    "birdeye.so",
    "dexscreener.com",
];

/// Union of the default domains and caller extras, duplicate-free, defaults
/// first, first-occurrence order preserved.
pub fn merge_allowed_domains(extra: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = DEFAULT_ALLOWED_DOMAINS
        .iter()
        .map(|d| d.to_string())
        .collect();
    for domain in extra {
        if !merged.iter().any(|existing| existing == domain) {
            merged.push(domain.clone());
        }
    }
    merged
}

/// A task submission as the dashboard describes it.
#[derive(Debug, Clone)]
pub struct TaskRequest {
    pub task: String,
    /// Forwarded to the provider as the `wallet_address` secret; never logged.
    pub wallet_address: Option<SecretString>,
    pub allowed_domains: Vec<String>,
    /// JSON schema the provider should shape the final output to.
    pub structured_output: Option<String>,
    pub llm_model: Option<String>,
}

impl TaskRequest {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            wallet_address: None,
            allowed_domains: Vec::new(),
            structured_output: None,
            llm_model: None,
        }
    }
}

/// Wire body for `POST /run-task`. Assembled right before the request so the
/// wallet secret is exposed only at the serialization boundary.
pub(crate) fn build_submission(request: &TaskRequest) -> Value {
    let mut secrets = serde_json::Map::new();
    if let Some(wallet) = &request.wallet_address {
        secrets.insert(
            "wallet_address".to_string(),
            Value::String(wallet.expose_secret().to_string()),
        );
    }

    let mut body = serde_json::json!({
        "task": request.task,
        "allowed_domains": merge_allowed_domains(&request.allowed_domains),
        "secrets": Value::Object(secrets),
        "llm_model": request
            .llm_model
            .clone()
            .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
        "use_adblock": true,
        "use_proxy": true,
        "highlight_elements": true,
        "save_browser_data": true,
    });
    if let Some(schema) = &request.structured_output {
        body["structured_output_json"] = Value::String(schema.clone());
    }
    body
}

/// One step as reported by the provider. Unknown fields ride along in
/// `extra` so pass-through routes do not drop provider data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteTaskStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation_previous_goal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_goal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Task detail as reported by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteTaskDetail {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub steps: Vec<RemoteTaskStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_url: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ScreenshotsResponse {
    #[serde(default)]
    pub screenshots: Vec<String>,
}

/// Remote task operations the controller depends on.
#[async_trait]
pub trait TaskGateway: Send + Sync {
    async fn create(&self, request: &TaskRequest) -> Result<RemoteTaskDetail, GatewayError>;
    async fn fetch(&self, task_id: &str) -> Result<RemoteTaskDetail, GatewayError>;
    async fn fetch_status(&self, task_id: &str) -> Result<String, GatewayError>;
    async fn fetch_screenshots(&self, task_id: &str) -> Result<Vec<String>, GatewayError>;
    async fn pause(&self, task_id: &str) -> Result<Value, GatewayError>;
    async fn resume(&self, task_id: &str) -> Result<Value, GatewayError>;
    async fn stop(&self, task_id: &str) -> Result<Value, GatewayError>;
}

/// HTTP client for the Browser-Use cloud API.
pub struct BrowserUseClient {
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl BrowserUseClient {
    pub fn new(config: &BrowserUseConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut req = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key.expose_secret());
        }
        req
    }

    async fn execute<T: serde::de::DeserializeOwned>(
        &self,
        req: RequestBuilder,
    ) -> Result<T, GatewayError> {
        let response = req
            .send()
            .await
            .map_err(|e| GatewayError::transport(PROVIDER, e))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(GatewayError::upstream(PROVIDER, status.as_u16(), detail));
        }
        response
            .json()
            .await
            .map_err(|e| GatewayError::invalid_response(PROVIDER, e))
    }

    fn control_path(action: &str, task_id: &str) -> String {
        format!("/{action}?task_id={}", urlencoding::encode(task_id))
    }

    /// Credential probe used by `doctor`.
    pub async fn auth_info(&self) -> Result<Value, GatewayError> {
        self.execute(self.request(Method::GET, "/auth/me")).await
    }
}

#[async_trait]
impl TaskGateway for BrowserUseClient {
    async fn create(&self, request: &TaskRequest) -> Result<RemoteTaskDetail, GatewayError> {
        let body = build_submission(request);
        self.execute(self.request(Method::POST, "/run-task").json(&body))
            .await
    }

    async fn fetch(&self, task_id: &str) -> Result<RemoteTaskDetail, GatewayError> {
        self.execute(self.request(Method::GET, &format!("/task/{task_id}")))
            .await
    }

    async fn fetch_status(&self, task_id: &str) -> Result<String, GatewayError> {
        self.execute(self.request(Method::GET, &format!("/task/{task_id}/status")))
            .await
    }

    async fn fetch_screenshots(&self, task_id: &str) -> Result<Vec<String>, GatewayError> {
        let response: ScreenshotsResponse = self
            .execute(self.request(Method::GET, &format!("/task/{task_id}/screenshots")))
            .await?;
        Ok(response.screenshots)
    }

    async fn pause(&self, task_id: &str) -> Result<Value, GatewayError> {
        self.execute(self.request(Method::PUT, &Self::control_path("pause-task", task_id)))
            .await
    }

    async fn resume(&self, task_id: &str) -> Result<Value, GatewayError> {
        self.execute(self.request(Method::PUT, &Self::control_path("resume-task", task_id)))
            .await
    }

    async fn stop(&self, task_id: &str) -> Result<Value, GatewayError> {
        self.execute(self.request(Method::PUT, &Self::control_path("stop-task", task_id)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn merges_domains_without_duplicates() {
        let extra = vec![
            "solscan.io".to_string(),
            "jup.ag".to_string(),
            "jup.ag".to_string(),
        ];
        let merged = merge_allowed_domains(&extra);

        assert_eq!(merged.len(), DEFAULT_ALLOWED_DOMAINS.len() + 1);
        assert_eq!(merged[0], "solana.com");
        assert_eq!(merged.last().map(String::as_str), Some("jup.ag"));
        assert_eq!(
            merged.iter().filter(|d| d.as_str() == "solscan.io").count(),
            1
        );
    }

    #[test]
    fn callers_cannot_narrow_default_domains() {
        let merged = merge_allowed_domains(&[]);
        for domain in DEFAULT_ALLOWED_DOMAINS {
            assert!(merged.iter().any(|d| d == domain));
        }
    }

    #[test]
    fn submission_carries_fixed_run_flags() {
        let request = TaskRequest::new("close empty accounts");
        let body = build_submission(&request);

        assert_eq!(body["task"], "close empty accounts");
        assert_eq!(body["llm_model"], DEFAULT_LLM_MODEL);
        assert_eq!(body["use_adblock"], true);
        assert_eq!(body["use_proxy"], true);
        assert_eq!(body["highlight_elements"], true);
        assert_eq!(body["save_browser_data"], true);
        assert!(body.get("structured_output_json").is_none());
    }

    #[test]
    fn submission_includes_wallet_secret_only_when_present() {
        let body = build_submission(&TaskRequest::new("check balance"));
        assert_eq!(body["secrets"], serde_json::json!({}));

        let mut request = TaskRequest::new("check balance");
        request.wallet_address = Some(SecretString::from("9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin"));
        let body = build_submission(&request);
        assert_eq!(
            body["secrets"]["wallet_address"],
            "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin"
        );
    }

    #[test]
    fn submission_forwards_structured_output_schema() {
        let mut request = TaskRequest::new("scrape prices");
        request.structured_output = Some(r#"{"type":"object"}"#.to_string());
        request.llm_model = Some("gpt-4.1".to_string());
        let body = build_submission(&request);

        assert_eq!(body["structured_output_json"], r#"{"type":"object"}"#);
        assert_eq!(body["llm_model"], "gpt-4.1");
    }

    #[test]
    fn task_request_debug_redacts_wallet() {
        let mut request = TaskRequest::new("buy the dip");
        request.wallet_address = Some(SecretString::from("super-secret-address"));
        let rendered = format!("{request:?}");
        assert!(!rendered.contains("super-secret-address"));
    }

    #[test]
    fn detail_keeps_unknown_provider_fields() {
        let raw = serde_json::json!({
            "id": "task-1",
            "status": "running",
            "steps": [{"next_goal": "open solscan", "memory": "visited home"}],
            "browser_data": {"cookies": []}
        });
        let detail: RemoteTaskDetail = serde_json::from_value(raw).expect("detail parses");

        assert_eq!(detail.id, "task-1");
        assert_eq!(detail.steps.len(), 1);
        assert_eq!(detail.steps[0].extra["memory"], "visited home");
        assert!(detail.extra.contains_key("browser_data"));

        let round = serde_json::to_value(&detail).expect("detail serializes");
        assert_eq!(round["browser_data"]["cookies"], serde_json::json!([]));
    }

    #[test]
    fn control_paths_encode_task_ids() {
        assert_eq!(
            BrowserUseClient::control_path("pause-task", "abc 123"),
            "/pause-task?task_id=abc%20123"
        );
    }
}
