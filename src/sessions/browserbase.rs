//! Browserbase session client.
//!
//! Talks to the Browserbase REST v1 API. Session creation pins a fixed
//! desktop fingerprint so agent traffic looks like an ordinary Windows
//! browser; callers can override the viewport and lifecycle knobs per
//! request, with configured values as the fallback.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::BrowserbaseConfig;
use crate::error::GatewayError;

const PROVIDER: &str = "browserbase";

const DEFAULT_VIEWPORT: Viewport = Viewport {
    width: 1920,
    height: 1080,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Caller-facing session options. Everything is optional; unset fields fall
/// back to the configured defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrowserbaseSessionOptions {
    pub viewport: Option<Viewport>,
    pub devices: Option<Vec<String>>,
    pub locales: Option<Vec<String>>,
    pub operating_systems: Option<Vec<String>>,
    pub keep_alive: Option<bool>,
    pub recording: Option<bool>,
    pub region: Option<String>,
    pub task: Option<String>,
    pub metadata: Option<serde_json::Map<String, Value>>,
}

pub struct BrowserbaseClient {
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
    project_id: Option<String>,
    keep_alive: bool,
    recording: bool,
    region: Option<String>,
}

impl BrowserbaseClient {
    pub fn new(config: &BrowserbaseConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            project_id: config.project_id.clone(),
            keep_alive: config.keep_alive,
            recording: config.recording,
            region: config.region.clone(),
        }
    }

    pub async fn create_session(
        &self,
        options: &BrowserbaseSessionOptions,
    ) -> Result<Value, GatewayError> {
        let body = self.create_body(options);
        self.execute(self.request(Method::POST, "/v1/sessions").json(&body))
            .await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Value, GatewayError> {
        self.execute(self.request(Method::GET, &session_path(session_id)))
            .await
    }

    /// Live debugger links for an open session.
    pub async fn debug_links(&self, session_id: &str) -> Result<Value, GatewayError> {
        self.execute(self.request(Method::GET, &format!("{}/debug", session_path(session_id))))
            .await
    }

    pub async fn recording(&self, session_id: &str) -> Result<Value, GatewayError> {
        self.execute(self.request(
            Method::GET,
            &format!("{}/recording", session_path(session_id)),
        ))
        .await
    }

    pub async fn logs(&self, session_id: &str) -> Result<Value, GatewayError> {
        self.execute(self.request(Method::GET, &format!("{}/logs", session_path(session_id))))
            .await
    }

    /// Browserbase has no DELETE; release is an update to REQUEST_RELEASE.
    pub async fn release_session(&self, session_id: &str) -> Result<(), GatewayError> {
        let body = self.release_body();
        self.execute_unit(
            self.request(Method::POST, &session_path(session_id))
                .json(&body),
        )
        .await
    }

    fn create_body(&self, options: &BrowserbaseSessionOptions) -> Value {
        let viewport = options.viewport.unwrap_or(DEFAULT_VIEWPORT);
        let devices = options
            .devices
            .clone()
            .unwrap_or_else(|| vec!["desktop".to_string()]);
        let locales = options
            .locales
            .clone()
            .unwrap_or_else(|| vec!["en-US".to_string()]);
        let operating_systems = options
            .operating_systems
            .clone()
            .unwrap_or_else(|| vec!["windows".to_string()]);

        let mut user_metadata = serde_json::Map::new();
        user_metadata.insert("project".to_string(), "BONK Browser Agent".into());
        user_metadata.insert(
            "task".to_string(),
            options
                .task
                .clone()
                .unwrap_or_else(|| "Generic task".to_string())
                .into(),
        );
        if let Some(extra) = &options.metadata {
            for (key, value) in extra {
                user_metadata.insert(key.clone(), value.clone());
            }
        }

        let mut body = serde_json::json!({
            "browserSettings": {
                "viewport": viewport,
                "fingerprint": {
                    "devices": devices,
                    "locales": locales,
                    "operatingSystems": operating_systems,
                    "screen": {
                        "maxWidth": 1920,
                        "maxHeight": 1080,
                        "minWidth": 1024,
                        "minHeight": 768,
                    },
                },
            },
            "keepAlive": options.keep_alive.unwrap_or(self.keep_alive),
            "recording": options.recording.unwrap_or(self.recording),
            "userMetadata": Value::Object(user_metadata),
        });
        if let Some(project_id) = &self.project_id {
            body["projectId"] = project_id.clone().into();
        }
        if let Some(region) = options.region.clone().or_else(|| self.region.clone()) {
            body["region"] = region.into();
        }
        body
    }

    fn release_body(&self) -> Value {
        let mut body = serde_json::json!({ "status": "REQUEST_RELEASE" });
        if let Some(project_id) = &self.project_id {
            body["projectId"] = project_id.clone().into();
        }
        body
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(key) = &self.api_key {
            builder = builder.header("X-BB-API-Key", key.expose_secret());
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
    format!("/v1/sessions/{}", urlencoding::encode(session_id))
}
