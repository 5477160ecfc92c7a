use thiserror::Error;

/// Top-level error for both the proxy server and the chat client.
/// All variants carry a human-readable message for display/logging.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Auth errors ──────────────────────────────────────────────────────────
    #[error("Missing or malformed authorization header")]
    MissingCredentials,

    #[error("Invalid or expired access token")]
    InvalidCredentials,

    #[error("Token does not belong to user '{user_id}'")]
    UserMismatch { user_id: String },

    // ── Upstream errors ──────────────────────────────────────────────────────
    #[error("Auth backend request failed: {message}")]
    AuthBackend { message: String },

    #[error("Upstream service unavailable at {host}: {message}")]
    UpstreamUnavailable { host: String, message: String },

    #[error("Upstream returned status {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("Failed to parse upstream response: {message}")]
    UpstreamParse { message: String },

    #[error("Database query failed: {message}")]
    DatabaseQueryFailed {
        message: String,
        #[source]
        source: sqlx::Error,
    },

    // ── Validation errors ────────────────────────────────────────────────────
    #[error("Missing required field '{field_name}'")]
    MissingField { field_name: String },

    #[error("Invalid request body: {message}")]
    InvalidBody { message: String },

    // ── System errors ────────────────────────────────────────────────────────
    #[error("Missing required configuration '{key}'")]
    MissingConfig { key: String },

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn db_query(message: impl Into<String>, source: sqlx::Error) -> Self {
        AppError::DatabaseQueryFailed { message: message.into(), source }
    }

    pub fn upstream_unavailable(host: impl Into<String>, err: &reqwest::Error) -> Self {
        AppError::UpstreamUnavailable { host: host.into(), message: err.to_string() }
    }

    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            AppError::MissingCredentials | AppError::InvalidCredentials | AppError::UserMismatch { .. }
        )
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AppError::MissingField { .. } | AppError::InvalidBody { .. }
        )
    }

    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            AppError::AuthBackend { .. }
                | AppError::UpstreamUnavailable { .. }
                | AppError::UpstreamStatus { .. }
                | AppError::UpstreamParse { .. }
                | AppError::DatabaseQueryFailed { .. }
        )
    }

    /// Transport failures and 5xx answers may succeed on a second attempt;
    /// everything the caller got wrong will not.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::UpstreamUnavailable { .. } => true,
            AppError::UpstreamStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
