//! Request and response DTOs for the dashboard API.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Config;
use crate::error::{Error, GatewayError, ValidationError, redact_sensitive_detail};
use crate::tasks::TaskRequest;
use crate::wallet::TokenAccount;

// --- Error envelope ---

/// JSON error body: `{error, details?}`. Validation problems answer 400 with
/// their own message; upstream and internal failures answer 500 under a
/// per-route label with the upstream payload as `details`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: String,
    details: Option<Value>,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: message.into(),
            details: None,
        }
    }

    pub fn validation(err: ValidationError) -> Self {
        Self::bad_request(err.to_string())
    }

    /// File a failure under a route label. Validation errors keep their own
    /// message and status; everything else becomes `{error: label, details}`.
    pub fn failed(label: &str, err: impl Into<Error>) -> Self {
        match err.into() {
            Error::Validation(e) => Self::validation(e),
            Error::Gateway(e) => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                error: label.to_string(),
                details: Some(gateway_details(&e)),
            },
            other => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                error: label.to_string(),
                details: Some(Value::String(redact_sensitive_detail(&other.to_string()))),
            },
        }
    }

    /// Label-only variant for routes whose error body carries no details.
    pub fn labeled(label: &str, err: impl Into<Error>) -> Self {
        match err.into() {
            Error::Validation(e) => Self::validation(e),
            _ => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                error: label.to_string(),
                details: None,
            },
        }
    }

    #[cfg(test)]
    pub fn parts(&self) -> (StatusCode, &str, Option<&Value>) {
        (self.status, &self.error, self.details.as_ref())
    }
}

fn gateway_details(err: &GatewayError) -> Value {
    match err {
        GatewayError::Upstream { .. } => err.detail_value(),
        other => Value::String(redact_sensitive_detail(&other.to_string())),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = serde_json::Map::new();
        body.insert("error".to_string(), Value::String(self.error));
        if let Some(details) = self.details {
            body.insert("details".to_string(), details);
        }
        (self.status, Json(Value::Object(body))).into_response()
    }
}

// --- Health and auth ---

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
}

/// Which upstream credentials are present. Booleans only, never key material.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyInventory {
    pub browser_use: bool,
    pub steel: bool,
    pub openai: bool,
    pub fal: bool,
    pub xai: bool,
    /// Requires both the API key and a project id.
    pub browserbase: bool,
    pub anthropic: bool,
}

impl KeyInventory {
    pub fn from_config(config: &Config) -> Self {
        Self {
            browser_use: config.browser_use.api_key.is_some(),
            steel: config.steel.api_key.is_some(),
            openai: config.providers.openai.is_some(),
            fal: config.providers.fal.is_some(),
            xai: config.providers.xai.is_some(),
            browserbase: config.browserbase.api_key.is_some()
                && config.browserbase.project_id.is_some(),
            anthropic: config.providers.anthropic.is_some(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatusResponse {
    pub keys_configured: KeyInventory,
}

// --- Tasks ---

/// Body for `POST /api/tasks` and `POST /api/agent/start`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StartTaskRequest {
    pub task: Option<String>,
    pub wallet_address: Option<String>,
    pub allowed_domains: Vec<String>,
    pub structured_output_json: Option<String>,
    pub llm_model: Option<String>,
}

impl StartTaskRequest {
    /// Validate and convert; a missing or blank task is rejected before
    /// anything reaches the network.
    pub fn into_task_request(self) -> Result<TaskRequest, ValidationError> {
        let task = match self.task {
            Some(t) if !t.trim().is_empty() => t,
            _ => return Err(ValidationError::MissingTaskDescription),
        };
        let mut request = TaskRequest::new(task);
        request.wallet_address = self
            .wallet_address
            .filter(|w| !w.trim().is_empty())
            .map(SecretString::from);
        request.allowed_domains = self.allowed_domains;
        request.structured_output = self.structured_output_json;
        request.llm_model = self.llm_model;
        Ok(request)
    }
}

#[derive(Debug, Serialize)]
pub struct ScreenshotsEnvelope {
    pub screenshots: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

// --- Wallet ---

#[derive(Debug, Serialize)]
pub struct WalletBalanceResponse {
    pub address: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
}

#[derive(Debug, Serialize)]
pub struct WalletTokensResponse {
    pub address: String,
    pub tokens: Vec<TokenAccount>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmptyAccountsResponse {
    pub address: String,
    pub empty_accounts: Vec<TokenAccount>,
    pub count: usize,
    #[serde(with = "rust_decimal::serde::float")]
    pub reclaimable_sol: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BonkBalanceResponse {
    pub address: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub bonk_balance: Decimal,
}
