use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::errors::AppError;
use crate::models::{ProxyErrorBody, ProxyRequest, ProxyResponse};

/// The coach proxy as seen by the chat client.
#[async_trait]
pub trait CoachProxy: Send + Sync {
    async fn send(&self, request: &ProxyRequest) -> Result<ProxyResponse, AppError>;
}

/// Calls the proxy over HTTP with a bounded timeout and at most one
/// jittered retry for transport failures and 5xx answers.
#[derive(Clone)]
pub struct HttpCoachProxy {
    http: reqwest::Client,
    config: ClientConfig,
    access_token: String,
}

impl HttpCoachProxy {
    pub fn new(config: ClientConfig, access_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            access_token: access_token.into(),
        }
    }

    async fn send_once(&self, request: &ProxyRequest) -> Result<ProxyResponse, AppError> {
        let resp = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(&self.access_token)
            .timeout(self.config.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::upstream_unavailable(&self.config.endpoint, &e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = match resp.json::<ProxyErrorBody>().await {
                Ok(err) => match err.details {
                    Some(details) => format!("{}: {details}", err.error),
                    None => err.error,
                },
                Err(_) => String::new(),
            };
            return Err(AppError::UpstreamStatus { status: status.as_u16(), body });
        }

        let reply: ProxyResponse = resp
            .json()
            .await
            .map_err(|e| AppError::UpstreamParse { message: e.to_string() })?;
        if !reply.success {
            return Err(AppError::UpstreamParse {
                message: "proxy reply is missing success=true".to_string(),
            });
        }
        Ok(reply)
    }
}

#[async_trait]
impl CoachProxy for HttpCoachProxy {
    async fn send(&self, request: &ProxyRequest) -> Result<ProxyResponse, AppError> {
        let attempts = self.config.max_retries.min(1) + 1;
        let mut attempt = 1;
        loop {
            match self.send_once(request).await {
                Ok(reply) => return Ok(reply),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    let delay = jittered(self.config.retry_base_delay);
                    warn!("Coach proxy attempt {attempt} failed ({e}), retrying in {delay:?}");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    debug!("Coach proxy gave up after {attempt} attempt(s): {e}");
                    return Err(e);
                }
            }
        }
    }
}

/// `base` plus a uniformly random extra of up to `base`.
fn jittered(base: std::time::Duration) -> std::time::Duration {
    let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
    let extra = if base_ms == 0 { 0 } else { rand::thread_rng().gen_range(0..=base_ms) };
    std::time::Duration::from_millis(base_ms.saturating_add(extra))
}
