//! Configuration for the bonkagent gateway.
//!
//! Everything resolves from environment variables (after `.env` layering in
//! [`crate::bootstrap`]). Provider API keys are optional: the gateway starts
//! without them and the affected routes surface upstream auth failures
//! instead.

use std::env;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Read an environment variable, treating empty values as unset.
pub(crate) fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match env::var(key) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                Ok(None)
            } else {
                Ok(Some(trimmed.to_string()))
            }
        }
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "value is not valid UTF-8".to_string(),
        }),
    }
}

/// Read a base-URL variable, validating it and stripping any trailing slash.
fn url_env(key: &str, default: &str) -> Result<String, ConfigError> {
    let raw = optional_env(key)?.unwrap_or_else(|| default.to_string());
    let parsed = url::Url::parse(&raw).map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("must be a valid URL: {e}"),
    })?;
    Ok(parsed.to_string().trim_end_matches('/').to_string())
}

fn bool_env(key: &str, default: bool) -> Result<bool, ConfigError> {
    Ok(optional_env(key)?
        .map(|s| s.to_lowercase() == "true" || s == "1")
        .unwrap_or(default))
}

/// Full gateway configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub agent: AgentConfig,
    pub browser_use: BrowserUseConfig,
    pub steel: SteelConfig,
    pub browserbase: BrowserbaseConfig,
    pub solana: SolanaConfig,
    pub providers: ProviderKeys,
}

/// HTTP listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Task lifecycle controller configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Poll cadence in milliseconds for live tasks.
    pub poll_interval_ms: u64,
}

impl AgentConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Browser-Use cloud API configuration.
#[derive(Debug, Clone)]
pub struct BrowserUseConfig {
    pub api_url: String,
    pub api_key: Option<SecretString>,
}

/// Steel browser-session provider configuration.
#[derive(Debug, Clone)]
pub struct SteelConfig {
    pub api_url: String,
    /// Websocket base the CDP connect URL is assembled from.
    pub connect_url: String,
    pub api_key: Option<SecretString>,
}

/// Browserbase browser-session provider configuration.
#[derive(Debug, Clone)]
pub struct BrowserbaseConfig {
    pub api_url: String,
    pub api_key: Option<SecretString>,
    pub project_id: Option<String>,
    pub keep_alive: bool,
    pub recording: bool,
    pub region: Option<String>,
}

/// Solana JSON-RPC configuration.
#[derive(Debug, Clone)]
pub struct SolanaConfig {
    pub rpc_url: String,
}

/// Presence-only keys reported by `/api/auth/status` and `doctor`.
#[derive(Debug, Clone)]
pub struct ProviderKeys {
    pub openai: Option<SecretString>,
    pub anthropic: Option<SecretString>,
    pub xai: Option<SecretString>,
    pub fal: Option<SecretString>,
}

impl Config {
    /// Resolve the full configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            server: ServerConfig::resolve()?,
            agent: AgentConfig::resolve()?,
            browser_use: BrowserUseConfig::resolve()?,
            steel: SteelConfig::resolve()?,
            browserbase: BrowserbaseConfig::resolve()?,
            solana: SolanaConfig::resolve()?,
            providers: ProviderKeys::resolve()?,
        })
    }
}

impl ServerConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        Ok(Self {
            host: optional_env("HOST")?.unwrap_or_else(|| "0.0.0.0".to_string()),
            port: optional_env("PORT")?
                .map(|s| s.parse())
                .transpose()
                .map_err(|e| ConfigError::InvalidValue {
                    key: "PORT".to_string(),
                    message: format!("must be a valid port number: {e}"),
                })?
                .unwrap_or(4000),
        })
    }
}

impl AgentConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        let poll_interval_ms = optional_env("AGENT_POLL_INTERVAL_MS")?
            .map(|s| s.parse())
            .transpose()
            .map_err(|e| ConfigError::InvalidValue {
                key: "AGENT_POLL_INTERVAL_MS".to_string(),
                message: format!("must be milliseconds: {e}"),
            })?
            .unwrap_or(3000);

        if poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "AGENT_POLL_INTERVAL_MS".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        Ok(Self { poll_interval_ms })
    }
}

impl BrowserUseConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: url_env("BROWSER_USE_API_URL", "https://api.browser-use.com/api/v1")?,
            api_key: optional_env("BROWSER_USE_API_KEY")?.map(SecretString::from),
        })
    }
}

impl SteelConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: url_env("STEEL_API_URL", "https://api.steel.dev")?,
            connect_url: url_env("STEEL_CONNECT_URL", "wss://connect.steel.dev")?,
            api_key: optional_env("STEEL_API_KEY")?.map(SecretString::from),
        })
    }
}

impl BrowserbaseConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: url_env("BROWSERBASE_API_URL", "https://api.browserbase.com")?,
            api_key: optional_env("BROWSERBASE_API_KEY")?.map(SecretString::from),
            project_id: optional_env("BROWSERBASE_PROJECT_ID")?,
            keep_alive: bool_env("BROWSERBASE_KEEP_ALIVE", false)?,
            recording: bool_env("BROWSERBASE_RECORDING", false)?,
            region: optional_env("BROWSERBASE_REGION")?,
        })
    }
}

impl SolanaConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        Ok(Self {
            rpc_url: url_env("SOLANA_RPC_URL", "https://api.mainnet-beta.solana.com")?,
        })
    }
}

impl ProviderKeys {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        Ok(Self {
            openai: optional_env("OPENAI_API_KEY")?.map(SecretString::from),
            anthropic: optional_env("ANTHROPIC_API_KEY")?.map(SecretString::from),
            xai: optional_env("XAI_API_KEY")?.map(SecretString::from),
            fal: optional_env("FAL_API_KEY")?.map(SecretString::from),
        })
    }
}
