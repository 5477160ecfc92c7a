use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::auth::TokenVerifier;
use crate::db::profile_repository::ProfileSource;
use crate::errors::AppError;
use crate::models::{ActionType, ProxyAction, ProxyResponse, ReplyItem, UserContext};
use crate::runtime::DialogRuntime;

/// Request body as received. Required fields are optional here so their
/// absence is reported as a validation error instead of a parse failure.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRequestBody {
    pub action: Option<ProxyAction>,
    pub user_id: Option<String>,
    pub user_context: Option<UserContext>,
}

#[derive(Clone)]
pub struct ProxyService {
    verifier: Arc<dyn TokenVerifier>,
    runtime: Arc<dyn DialogRuntime>,
    profiles: Option<Arc<dyn ProfileSource>>,
}

impl ProxyService {
    pub fn new(verifier: Arc<dyn TokenVerifier>, runtime: Arc<dyn DialogRuntime>) -> Self {
        Self { verifier, runtime, profiles: None }
    }

    pub fn with_profiles(mut self, profiles: Arc<dyn ProfileSource>) -> Self {
        self.profiles = Some(profiles);
        self
    }

    /// Authenticates the caller, validates and enriches the action, then
    /// relays it to the dialog runtime.
    pub async fn relay(&self, token: &str, body: ProxyRequestBody) -> Result<ProxyResponse, AppError> {
        let caller_id = self.verifier.verify(token).await?;

        // ── Validation ────────────────────────────────────────────────────────
        let mut action = body
            .action
            .ok_or_else(|| AppError::MissingField { field_name: "action".to_string() })?;
        let user_id = body
            .user_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| AppError::MissingField { field_name: "userId".to_string() })?;

        if caller_id != user_id {
            warn!("Token for user {caller_id} used on behalf of {user_id}");
            return Err(AppError::UserMismatch { user_id });
        }

        // ── Personalise launch turns ──────────────────────────────────────────
        if action.action_type == ActionType::Launch {
            let context = match body.user_context {
                Some(ctx) => Some(ctx),
                None => self.stored_context(&user_id).await,
            };
            if let Some(ctx) = context {
                enrich_launch(&mut action, &ctx)?;
            }
        }

        // ── Forward ───────────────────────────────────────────────────────────
        let turn = self.runtime.interact(&user_id, &action).await?;
        info!(
            "Relayed {:?} action for user {user_id}: {} replies, ending={}",
            action.action_type,
            turn.messages.len(),
            turn.is_ending
        );

        Ok(ProxyResponse {
            success: true,
            messages: turn.messages.into_iter().map(ReplyItem::Rich).collect(),
            is_ending: turn.is_ending,
        })
    }

    async fn stored_context(&self, user_id: &str) -> Option<UserContext> {
        let profiles = self.profiles.as_ref()?;
        match profiles.find_by_user_id(user_id).await {
            Ok(profile) => {
                let profile = profile?;
                UserContext::assemble(Some(&profile), None, Utc::now())
            }
            Err(e) => {
                warn!("Launching without stored profile for {user_id}: {e}");
                None
            }
        }
    }
}

/// Merges the journey fields into a `launch` payload, keeping any keys the
/// caller already set that the context does not override.
pub fn enrich_launch(action: &mut ProxyAction, ctx: &UserContext) -> Result<(), AppError> {
    if action.action_type != ActionType::Launch {
        return Ok(());
    }
    let mut payload = match action.payload.take() {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    match serde_json::to_value(ctx) {
        Ok(Value::Object(fields)) => payload.extend(fields),
        Ok(_) => {}
        Err(e) => return Err(AppError::Unexpected(format!("Failed to encode user context: {e}"))),
    }
    action.payload = Some(Value::Object(payload));
    Ok(())
}
