//! Browser session providers.
//!
//! Two independent pools can host agent browsers: Steel and Browserbase.
//! Each gets its own thin REST client; routes pick one via [`SessionProvider`].

mod browserbase;
mod steel;

pub use browserbase::{BrowserbaseClient, BrowserbaseSessionOptions, Viewport};
pub use steel::{SteelClient, SteelSession, SteelSessionOptions};

use std::fmt;

use crate::error::ValidationError;

/// Which remote browser pool a request addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionProvider {
    Steel,
    Browserbase,
}

impl SessionProvider {
    /// Parse a path segment. Unknown names are rejected at the boundary.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "steel" => Ok(Self::Steel),
            "browserbase" => Ok(Self::Browserbase),
            _ => Err(ValidationError::UnknownProvider(raw.trim().to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Steel => "steel",
            Self::Browserbase => "browserbase",
        }
    }

    /// Human-facing name used in error labels.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Steel => "Steel",
            Self::Browserbase => "Browserbase",
        }
    }
}

impl fmt::Display for SessionProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
