//! Backend connection settings read from the environment.
//!
//! A missing or malformed value is not an error: [`BackendConfig::notice`]
//! returns a permanent message the UI shows inline. There is no automatic
//! recovery; the deployment has to be fixed.

use secrecy::{ExposeSecret, SecretString};
use url::Url;

pub const ENV_BACKEND_URL: &str = "PETSHOP_BACKEND_URL";
pub const ENV_BACKEND_ANON_KEY: &str = "PETSHOP_BACKEND_ANON_KEY";

#[derive(Clone, Debug)]
pub struct BackendConfig {
    pub url: Option<Url>,
    /// Public anon key of the managed backend. Kept out of logs anyway.
    pub anon_key: Option<SecretString>,
    invalid_url: Option<String>,
}

impl BackendConfig {
    /// Reads both values from the environment. Never fails.
    #[must_use]
    pub fn load() -> Self {
        Self::from_values(
            std::env::var(ENV_BACKEND_URL).ok().as_deref(),
            std::env::var(ENV_BACKEND_ANON_KEY).ok().as_deref(),
        )
    }

    #[must_use]
    pub fn from_values(url: Option<&str>, anon_key: Option<&str>) -> Self {
        let url = url.and_then(normalize_value);
        let (url, invalid_url) = match url {
            Some(raw) => match Url::parse(&raw) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => (Some(parsed), None),
                _ => (None, Some(raw)),
            },
            None => (None, None),
        };

        Self {
            url,
            anon_key: anon_key
                .and_then(normalize_value)
                .map(SecretString::from),
            invalid_url,
        }
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.url.is_some()
            && self
                .anon_key
                .as_ref()
                .is_some_and(|key| !key.expose_secret().is_empty())
    }

    /// Inline notice for the UI when the backend cannot be reached as configured.
    #[must_use]
    pub fn notice(&self) -> Option<String> {
        let mut problems = Vec::new();
        if let Some(raw) = &self.invalid_url {
            problems.push(format!("{ENV_BACKEND_URL} is not a valid http(s) URL ({raw})"));
        } else if self.url.is_none() {
            problems.push(format!("{ENV_BACKEND_URL} is not set"));
        }
        if self.anon_key.is_none() {
            problems.push(format!("{ENV_BACKEND_ANON_KEY} is not set"));
        }

        if problems.is_empty() {
            None
        } else {
            Some(format!(
                "Backend is not configured: {}. Set the missing values and redeploy.",
                problems.join("; ")
            ))
        }
    }
}

fn normalize_value(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
