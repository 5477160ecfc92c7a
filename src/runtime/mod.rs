use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::errors::AppError;
use crate::models::{MessageMetadata, ProxyAction, QuickReply, QuickReplyCategory, RichReply};

/// One conversational turn as returned by the dialog runtime, already
/// reduced to what the chat client renders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeTurn {
    pub messages: Vec<RichReply>,
    pub is_ending: bool,
}

/// The third-party dialog runtime the proxy forwards to.
#[async_trait]
pub trait DialogRuntime: Send + Sync {
    async fn interact(&self, user_id: &str, action: &ProxyAction) -> Result<RuntimeTurn, AppError>;
}

#[derive(Debug, Deserialize)]
struct Trace {
    #[serde(rename = "type")]
    trace_type: String,
    #[serde(default)]
    payload: Value,
}

/// Reduces a runtime trace list to reply items.
///
/// - `text`/`speak` become replies, passing through `payload.metadata`
/// - `choice` buttons become AI-suggested quick replies on the latest reply
/// - `end` marks the dialog as finished
/// - a custom `crisis` trace tags every reply of the turn as crisis
fn translate_traces(traces: Vec<Trace>) -> RuntimeTurn {
    let mut turn = RuntimeTurn::default();
    let mut orphan_choices: Vec<QuickReply> = Vec::new();
    let mut crisis = false;

    for trace in traces {
        match trace.trace_type.as_str() {
            "text" | "speak" => {
                let Some(text) = trace.payload.get("message").and_then(Value::as_str) else {
                    continue;
                };
                if text.trim().is_empty() {
                    continue;
                }
                let metadata = trace
                    .payload
                    .get("metadata")
                    .and_then(|m| serde_json::from_value::<MessageMetadata>(m.clone()).ok());
                turn.messages.push(RichReply {
                    text: text.to_string(),
                    metadata,
                    quick_replies: std::mem::take(&mut orphan_choices),
                });
            }
            "choice" => {
                let buttons = trace
                    .payload
                    .get("buttons")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                let replies = buttons.iter().filter_map(choice_reply);
                match turn.messages.last_mut() {
                    Some(last) => last.quick_replies.extend(replies),
                    None => orphan_choices.extend(replies),
                }
            }
            "end" => turn.is_ending = true,
            "crisis" => crisis = true,
            other => debug!("Ignoring runtime trace of type '{other}'"),
        }
    }

    if !orphan_choices.is_empty() {
        debug!("Dropping {} choices with no reply to attach to", orphan_choices.len());
    }

    if crisis {
        for message in &mut turn.messages {
            message.metadata.get_or_insert_with(MessageMetadata::crisis);
        }
    }
    turn
}

fn choice_reply(button: &Value) -> Option<QuickReply> {
    let name = button.get("name").and_then(Value::as_str)?;
    Some(QuickReply {
        id: uuid::Uuid::new_v4().to_string(),
        text: name.to_string(),
        action: None,
        category: QuickReplyCategory::AiGenerated,
        payload: button.get("request").cloned(),
    })
}

/// Client for the Voiceflow-style `state/user/{id}/interact` endpoint.
#[derive(Clone)]
pub struct VoiceflowRuntime {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    version_id: String,
    timeout: Duration,
}

impl VoiceflowRuntime {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        api_key: &str,
        version_id: &str,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            version_id: version_id.to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl DialogRuntime for VoiceflowRuntime {
    async fn interact(&self, user_id: &str, action: &ProxyAction) -> Result<RuntimeTurn, AppError> {
        let url = format!("{}/state/user/{user_id}/interact", self.base_url);
        let body = json!({
            "action": action,
            "config": { "tts": false, "stripSSML": true },
        });

        let resp = self
            .http
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, &self.api_key)
            .header("versionID", &self.version_id)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Dialog runtime request failed for user {user_id}: {e}");
                AppError::upstream_unavailable(&self.base_url, &e)
            })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| {
            error!("Failed to read dialog runtime response: {e}");
            AppError::upstream_unavailable(&self.base_url, &e)
        })?;

        if !status.is_success() {
            error!("Dialog runtime answered {status} for user {user_id}");
            return Err(AppError::UpstreamStatus { status: status.as_u16(), body: text });
        }

        let traces: Vec<Trace> = serde_json::from_str(&text).map_err(|e| {
            error!("Unparseable dialog runtime response: {e}");
            AppError::UpstreamParse { message: e.to_string() }
        })?;

        debug!("Dialog runtime returned {} traces for user {user_id}", traces.len());
        Ok(translate_traces(traces))
    }
}
