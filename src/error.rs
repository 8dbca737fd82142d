//! Error types for the bonkagent gateway.

/// Top-level error type for the gateway.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    #[error("{0}")]
    Disconnect(#[from] DisconnectSignal),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Request rejections raised before any upstream call is made.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Task description is required")]
    MissingTaskDescription,

    #[error("Invalid wallet address")]
    InvalidWalletAddress,

    #[error("Cannot {command} a task that is {phase}")]
    InvalidCommand { command: String, phase: String },

    #[error("No active task")]
    NoActiveTask,

    #[error("Unknown session provider: {0}")]
    UnknownProvider(String),

    #[error("{capability} is not available for {provider} sessions")]
    UnsupportedCapability {
        provider: String,
        capability: String,
    },
}

/// Failures talking to an upstream provider.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Request to {provider} failed: {source}")]
    Transport {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} returned HTTP {status}: {detail}")]
    Upstream {
        provider: String,
        status: u16,
        detail: String,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

impl GatewayError {
    pub fn transport(provider: &str, source: reqwest::Error) -> Self {
        Self::Transport {
            provider: provider.to_string(),
            source,
        }
    }

    pub fn upstream(provider: &str, status: u16, detail: impl Into<String>) -> Self {
        Self::Upstream {
            provider: provider.to_string(),
            status,
            detail: detail.into(),
        }
    }

    pub fn invalid_response(provider: &str, reason: impl std::fmt::Display) -> Self {
        Self::InvalidResponse {
            provider: provider.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Upstream response body when the provider sent one, otherwise the
    /// transport-level message. Used to fill the `details` field of API
    /// error envelopes.
    pub fn detail_value(&self) -> serde_json::Value {
        match self {
            Self::Upstream { detail, .. } => serde_json::from_str(detail)
                .unwrap_or_else(|_| serde_json::Value::String(detail.clone())),
            other => serde_json::Value::String(other.to_string()),
        }
    }
}

/// HTTP server startup errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {reason}")]
    BindFailed { addr: String, reason: String },

    #[error("Failed to resolve local address: {0}")]
    LocalAddr(String),
}

/// Marker raised when a live browser view reports a lost connection.
///
/// Not a transport failure: the remote task may still be running, so the
/// controller records the message and keeps polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Browser session disconnected. The session may have ended.")]
pub struct DisconnectSignal;

/// Mask bearer tokens, `key=value` credentials, and `sk-` style keys in a
/// message before it reaches logs or API error envelopes.
pub fn redact_sensitive_detail(raw: &str) -> String {
    let mut value = raw.to_string();
    let patterns = [
        (r"(?i)\b(bearer)\s+[a-z0-9._\-~+/]+=*", "$1 [REDACTED]"),
        (
            r"(?i)\b(token|api[_\-]?key|secret|password)\b(\s*[:=]\s*)([^,\s]+)",
            "$1$2[REDACTED]",
        ),
        (r"(?i)\bsk-[a-z0-9\-]{10,}\b", "sk-[REDACTED]"),
    ];

    for (pattern, replacement) in patterns {
        if let Ok(re) = regex::Regex::new(pattern) {
            value = re.replace_all(&value, replacement).to_string();
        }
    }

    value
}

/// Result type alias for the gateway.
pub type Result<T> = std::result::Result<T, Error>;
