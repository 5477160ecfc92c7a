//! Runtime configuration for the proxy server and the chat client.

use std::time::Duration;

use crate::errors::AppError;

const DEFAULT_RUNTIME_URL: &str = "https://general-runtime.voiceflow.com";

/// Settings for the `quitcoach` proxy server, read from the environment.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub port: u16,
    /// Base URL of the hosted backend (auth lives under `/auth/v1`).
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub runtime_url: String,
    pub runtime_api_key: String,
    pub runtime_version: String,
    pub upstream_timeout: Duration,
    /// When set, `launch` turns without a user context fall back to the
    /// caller's `profiles` row.
    pub database_url: Option<String>,
}

impl ProxyConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| AppError::MissingConfig { key: key.to_string() })
        };

        Ok(Self {
            port: lookup("PORT").and_then(|p| p.parse().ok()).unwrap_or(8080),
            supabase_url: required("SUPABASE_URL")?.trim_end_matches('/').to_string(),
            supabase_anon_key: required("SUPABASE_ANON_KEY")?,
            runtime_url: lookup("VOICEFLOW_RUNTIME_URL")
                .unwrap_or_else(|| DEFAULT_RUNTIME_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            runtime_api_key: required("VOICEFLOW_API_KEY")?,
            runtime_version: lookup("VOICEFLOW_VERSION_ID")
                .unwrap_or_else(|| "production".to_string()),
            upstream_timeout: Duration::from_secs(
                lookup("UPSTREAM_TIMEOUT_SECS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            database_url: lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()),
        })
    }
}

/// Settings for [`HttpCoachProxy`](crate::client::proxy_client::HttpCoachProxy).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Full URL of the proxy endpoint, e.g. `https://host/api/coach`.
    pub endpoint: String,
    pub timeout: Duration,
    /// Extra attempts after the first one. Capped at one.
    pub max_retries: u32,
    /// Base delay before a retry; up to the same amount of jitter is added.
    pub retry_base_delay: Duration,
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout: Duration::from_secs(30),
            max_retries: 1,
            retry_base_delay: Duration::from_millis(250),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries.min(1);
        self.retry_base_delay = base_delay;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn applies_defaults() {
        let cfg = ProxyConfig::from_lookup(lookup_from(&[
            ("SUPABASE_URL", "https://proj.supabase.co/"),
            ("SUPABASE_ANON_KEY", "anon"),
            ("VOICEFLOW_API_KEY", "VF.DM.key"),
        ]))
        .unwrap();

        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.supabase_url, "https://proj.supabase.co");
        assert_eq!(cfg.runtime_url, DEFAULT_RUNTIME_URL);
        assert_eq!(cfg.runtime_version, "production");
        assert_eq!(cfg.upstream_timeout, Duration::from_secs(30));
        assert!(cfg.database_url.is_none());
    }

    #[test]
    fn reports_first_missing_key() {
        let err = ProxyConfig::from_lookup(lookup_from(&[("SUPABASE_URL", "https://x")])).unwrap_err();
        assert!(matches!(err, AppError::MissingConfig { key } if key == "SUPABASE_ANON_KEY"));
    }

    #[test]
    fn client_retries_are_capped_at_one() {
        let cfg = ClientConfig::new("http://localhost/api/coach")
            .with_retries(5, Duration::from_millis(10));
        assert_eq!(cfg.max_retries, 1);
    }
}
