//! Steel session client.
//!
//! Steel sessions are plain REST objects; the one piece of local assembly is
//! the CDP connection URL, which Steel does not return and clients need to
//! attach a browser. It is synthesized from the configured connect endpoint.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::SteelConfig;
use crate::error::GatewayError;

const PROVIDER: &str = "steel";

/// Caller-facing knobs for a new session. Both default on.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SteelSessionOptions {
    pub use_proxy: bool,
    pub solve_captcha: bool,
}

impl Default for SteelSessionOptions {
    fn default() -> Self {
        Self {
            use_proxy: true,
            solve_captcha: true,
        }
    }
}

/// Session payload as Steel returns it, plus the synthesized `cdp_url`.
/// Unknown provider fields ride along untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SteelSession {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cdp_url: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

pub struct SteelClient {
    client: Client,
    base_url: String,
    connect_url: String,
    api_key: Option<SecretString>,
}

impl SteelClient {
    pub fn new(config: &SteelConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: config.api_url.clone(),
            connect_url: config.connect_url.clone(),
            api_key: config.api_key.clone(),
        }
    }

    /// Create a session and stamp its CDP connection URL.
    pub async fn create_session(
        &self,
        options: SteelSessionOptions,
    ) -> Result<SteelSession, GatewayError> {
        let body = serde_json::json!({
            "use_proxy": options.use_proxy,
            "solve_captcha": options.solve_captcha,
        });
        let mut session: SteelSession = self
            .execute(self.request(Method::POST, "/sessions").json(&body))
            .await?;
        session.cdp_url = Some(self.connect_endpoint(&session.id));
        Ok(session)
    }

    /// All active sessions, as reported by Steel.
    pub async fn list_sessions(&self) -> Result<Value, GatewayError> {
        self.execute(self.request(Method::GET, "/sessions")).await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Value, GatewayError> {
        self.execute(self.request(Method::GET, &session_path(session_id)))
            .await
    }

    pub async fn release_session(&self, session_id: &str) -> Result<(), GatewayError> {
        self.execute_unit(self.request(Method::DELETE, &session_path(session_id)))
            .await
    }

    fn connect_endpoint(&self, session_id: &str) -> String {
        let key = self
            .api_key
            .as_ref()
            .map(|key| key.expose_secret().to_string())
            .unwrap_or_default();
        format!(
            "{}?apiKey={}&sessionId={}",
            self.connect_url,
            urlencoding::encode(&key),
            urlencoding::encode(session_id)
        )
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(key) = &self.api_key {
            builder = builder.header("X-API-Key", key.expose_secret());
        }
        builder
    }

    async fn execute<T: serde::de::DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, GatewayError> {
        let response = builder
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

    async fn execute_unit(&self, builder: RequestBuilder) -> Result<(), GatewayError> {
        let response = builder
            .send()
            .await
            .map_err(|e| GatewayError::transport(PROVIDER, e))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(GatewayError::upstream(PROVIDER, status.as_u16(), detail));
        }
        Ok(())
    }
}

fn session_path(session_id: &str) -> String {
    format!("/sessions/{}", urlencoding::encode(session_id))
}
