use crate::constants::{api, env};
use crate::errors::ToolError;
use std::time::Duration;
use url::Url;

/// Connection settings for the upstream API, loaded once at startup.
#[derive(Debug, Clone)]
pub struct BexioConfig {
    pub base_url: String,
    pub access_token: String,
    pub timeout: Duration,
}

impl BexioConfig {
    pub fn new(
        access_token: &str,
        base_url: &str,
        timeout_secs: u64,
    ) -> Result<Self, ToolError> {
        let access_token = access_token.trim();
        if access_token.is_empty() {
            return Err(ToolError::config(format!(
                "{} is not set",
                env::ACCESS_TOKEN
            ))
            .with_hint("Set it in the MCP client env or in a .env file."));
        }
        if timeout_secs == 0 {
            return Err(ToolError::config(format!(
                "{} must be a positive number of seconds",
                env::TIMEOUT
            )));
        }
        Ok(Self {
            base_url: normalize_base_url(base_url)?,
            access_token: access_token.to_string(),
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    pub fn from_env() -> Result<Self, ToolError> {
        let token = std::env::var(env::ACCESS_TOKEN).unwrap_or_default();
        let base_url = std::env::var(env::API_URL)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| api::DEFAULT_BASE_URL.to_string());
        let timeout_secs = match std::env::var(env::TIMEOUT) {
            Err(_) => api::DEFAULT_TIMEOUT_SECS,
            Ok(raw) if raw.trim().is_empty() => api::DEFAULT_TIMEOUT_SECS,
            Ok(raw) => raw.trim().parse::<u64>().map_err(|_| {
                ToolError::config(format!(
                    "{} must be an integer number of seconds, got '{}'",
                    env::TIMEOUT,
                    raw.trim()
                ))
            })?,
        };
        Self::new(&token, &base_url, timeout_secs)
    }
}

/// Keep scheme, host and path (the path carries the API version prefix),
/// drop query and fragment, trim the trailing slash.
fn normalize_base_url(raw: &str) -> Result<String, ToolError> {
    let raw = raw.trim();
    let mut url = Url::parse(raw).map_err(|_| {
        ToolError::config(format!("Invalid {} value", env::API_URL))
            .with_details(serde_json::json!({ "url": raw }))
    })?;
    url.set_query(None);
    url.set_fragment(None);
    let normalized = format!("{}{}", url.origin().ascii_serialization(), url.path());
    Ok(normalized.trim_end_matches('/').to_string())
}
