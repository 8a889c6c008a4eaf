//! Database URL resolution.
//!
//! Config holds the env var NAME only. The URL is read from the process
//! environment once at start-up and handed to constructors. `Debug` redacts
//! it and errors name the variable, never the value.

use anyhow::{bail, Result};

use crate::EngineConfig;

#[derive(Clone)]
pub struct ResolvedDatabaseUrl {
    pub env_var: String,
    /// `None` if the named env var was absent or blank.
    pub url: Option<String>,
}

impl std::fmt::Debug for ResolvedDatabaseUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedDatabaseUrl")
            .field("env_var", &self.env_var)
            .field("url", &self.url.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

impl ResolvedDatabaseUrl {
    pub fn is_set(&self) -> bool {
        self.url.is_some()
    }

    pub fn require(&self) -> Result<&str> {
        match self.url.as_deref() {
            Some(u) => Ok(u),
            None => bail!(
                "SECRETS_MISSING: required env var '{}' (database url) is not set or empty",
                self.env_var
            ),
        }
    }
}

pub fn resolve_database_url(cfg: &EngineConfig) -> ResolvedDatabaseUrl {
    ResolvedDatabaseUrl {
        env_var: cfg.database_url_env.clone(),
        url: resolve_env(&cfg.database_url_env),
    }
}

fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}
