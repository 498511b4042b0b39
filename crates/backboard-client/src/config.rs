//! Backboard API client configuration.

use std::fmt;

use backboard_common::ApiError;

const DEFAULT_BASE_URL: &str = "https://app.backboard.io/api";

/// Connection settings for the hosted Backboard API.
#[derive(Clone)]
pub struct BackboardConfig {
    pub api_key: String,
    pub base_url: String,
}

impl fmt::Debug for BackboardConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackboardConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl BackboardConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: sanitize_api_key(&api_key.into()),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Create config from the `BACKBOARD_API_KEY` environment variable,
    /// with `BACKBOARD_API_URL` optionally overriding the base URL.
    pub fn from_env() -> Result<Self, ApiError> {
        let key = std::env::var("BACKBOARD_API_KEY").map_err(|_| ApiError::MissingApiKey)?;
        let mut config = Self::new(key);
        if let Ok(url) = std::env::var("BACKBOARD_API_URL") {
            config.base_url = url;
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Strip non-printable and non-ASCII characters (zero-width spaces and the
/// like) that pasted keys sometimes carry; they corrupt the auth header.
fn sanitize_api_key(key: &str) -> String {
    key.chars()
        .filter(|c| (' '..='~').contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}
