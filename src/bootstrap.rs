//! Bootstrap helpers for bonkagent.
//!
//! Env layering only: the gateway keeps no state on disk besides an optional
//! per-user `.env` with provider API keys.
//!
//! File: `~/.bonkagent/.env` (standard dotenvy format)

use std::path::{Path, PathBuf};

/// Path to the bonkagent-specific `.env` file: `~/.bonkagent/.env`.
pub fn bonkagent_env_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".bonkagent")
        .join(".env")
}

/// Load env vars from every known `.env` location.
///
/// dotenvy never overwrites existing env vars, so load order determines
/// priority. The effective priority is:
///
///   explicit env vars > `--env-file` > `./.env` > `~/.bonkagent/.env`
pub fn load_env(explicit: Option<&Path>) {
    if let Some(path) = explicit {
        let _ = dotenvy::from_path(path);
    }

    let _ = dotenvy::dotenv();

    let home = bonkagent_env_path();
    if home.exists() {
        let _ = dotenvy::from_path(&home);
    }
}
