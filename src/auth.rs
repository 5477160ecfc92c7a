use async_trait::async_trait;
use axum::http::HeaderMap;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{error, warn};

use crate::errors::AppError;

/// Resolves a bearer token to the id of the user it was issued to.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<String, AppError>;
}

/// Extracts the token from an `Authorization: Bearer <token>` header. The
/// scheme name is matched case-insensitively.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim_start().split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim())
        .filter(|t| !t.is_empty())
        .ok_or(AppError::MissingCredentials)
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
}

/// Verifies tokens against the hosted backend's `GET /auth/v1/user`.
#[derive(Clone)]
pub struct SupabaseTokenVerifier {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseTokenVerifier {
    pub fn new(http: reqwest::Client, base_url: &str, anon_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        }
    }
}

#[async_trait]
impl TokenVerifier for SupabaseTokenVerifier {
    async fn verify(&self, token: &str) -> Result<String, AppError> {
        let url = format!("{}/auth/v1/user", self.base_url);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(token)
            .header("apikey", &self.anon_key)
            .send()
            .await
            .map_err(|e| {
                error!("Auth backend unreachable at {url}: {e}");
                AppError::AuthBackend { message: e.to_string() }
            })?;

        match resp.status() {
            s if s.is_success() => {
                let user: AuthUser = resp.json().await.map_err(|e| {
                    error!("Auth backend returned an unreadable user: {e}");
                    AppError::AuthBackend { message: e.to_string() }
                })?;
                Ok(user.id)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                warn!("Rejected access token");
                Err(AppError::InvalidCredentials)
            }
            s => {
                error!("Auth backend answered {s}");
                Err(AppError::AuthBackend { message: format!("status {s}") })
            }
        }
    }
}
