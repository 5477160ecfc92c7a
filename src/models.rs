use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Chat domain ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Crisis,
    Encouragement,
    Question,
    General,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrgencyLevel {
    Low,
    Medium,
    High,
    Crisis,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<MessageType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency_level: Option<UrgencyLevel>,
}

impl MessageMetadata {
    pub fn crisis() -> Self {
        Self {
            message_type: Some(MessageType::Crisis),
            sentiment: None,
            urgency_level: Some(UrgencyLevel::Crisis),
        }
    }

    pub fn signals_crisis(&self) -> bool {
        self.message_type == Some(MessageType::Crisis)
            || self.urgency_level == Some(UrgencyLevel::Crisis)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub content: String,
    pub role: MessageRole,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
    /// Replies suggested by the dialog runtime alongside this message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quick_replies: Vec<QuickReply>,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.into(),
            role,
            created_at: Utc::now(),
            metadata: None,
            quick_replies: Vec::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn with_metadata(mut self, metadata: Option<MessageMetadata>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_quick_replies(mut self, quick_replies: Vec<QuickReply>) -> Self {
        self.quick_replies = quick_replies;
        self
    }

    /// Crisis messages are rendered with the urgent style.
    pub fn is_crisis(&self) -> bool {
        self.metadata.as_ref().is_some_and(MessageMetadata::signals_crisis)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    Coaching,
    Crisis,
    Checkin,
    General,
}

/// Point-in-time view of the user's journey, sent along with every turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    pub days_since_quit: Option<i64>,
    pub current_mood: Option<String>,
    pub last_urge_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub recent_triggers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,
    pub user_id: String,
    pub messages: Vec<ChatMessage>,
    pub started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub session_type: SessionType,
    pub context: Option<SessionContext>,
    /// Set once the dialog runtime reports the conversation is over.
    #[serde(default)]
    pub is_ended: bool,
}

impl ChatSession {
    pub fn new(user_id: impl Into<String>, session_type: SessionType) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            messages: Vec::new(),
            started_at: now,
            last_activity_at: now,
            session_type,
            context: None,
            is_ended: false,
        }
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.last_activity_at = message.created_at;
        self.messages.push(message);
    }
}

// ── Quick replies ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuickReplyAction {
    CrisisMode,
    UrgeTimer,
    BreathingExercise,
    Community,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuickReplyCategory {
    Crisis,
    Support,
    Tools,
    General,
    AiGenerated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickReply {
    pub id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<QuickReplyAction>,
    pub category: QuickReplyCategory,
    /// Runtime request to replay when an AI-suggested reply is chosen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

// ── User profile ──────────────────────────────────────────────────────────────

/// The quit-plan fields of a `profiles` row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserProfile {
    pub quit_date: Option<DateTime<Utc>>,
    pub motivation: Option<String>,
    pub substance_type: Option<String>,
    pub daily_usage: Option<i32>,
    #[sqlx(default)]
    #[serde(default)]
    pub triggers: Vec<String>,
}

impl UserProfile {
    pub fn days_since_quit(&self, now: DateTime<Utc>) -> Option<i64> {
        self.quit_date.map(|d| (now - d).num_days().max(0))
    }
}

// ── Proxy wire types ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Launch,
    Text,
    Choice,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyAction {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl ProxyAction {
    pub fn launch() -> Self {
        Self { action_type: ActionType::Launch, payload: None }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self { action_type: ActionType::Text, payload: Some(Value::String(text.into())) }
    }

    pub fn choice(payload: Value) -> Self {
        Self { action_type: ActionType::Choice, payload: Some(payload) }
    }
}

/// Journey fields the runtime uses to personalise a `launch` turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quit_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motivation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substance_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_usage: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_since_quit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_mood: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_urge_at: Option<DateTime<Utc>>,
}

impl UserContext {
    /// Merges the stored profile with the live session snapshot. Session
    /// values win where both carry the same fact.
    pub fn assemble(
        profile: Option<&UserProfile>,
        session: Option<&SessionContext>,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        if profile.is_none() && session.is_none() {
            return None;
        }
        let mut ctx = UserContext::default();
        if let Some(p) = profile {
            ctx.quit_date = p.quit_date;
            ctx.motivation = p.motivation.clone();
            ctx.substance_type = p.substance_type.clone();
            ctx.daily_usage = p.daily_usage;
            ctx.triggers = p.triggers.clone();
            ctx.days_since_quit = p.days_since_quit(now);
        }
        if let Some(s) = session {
            if s.days_since_quit.is_some() {
                ctx.days_since_quit = s.days_since_quit;
            }
            ctx.current_mood = s.current_mood.clone();
            ctx.last_urge_at = s.last_urge_at;
            if !s.recent_triggers.is_empty() {
                ctx.triggers = s.recent_triggers.clone();
            }
        }
        Some(ctx)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRequest {
    pub action: ProxyAction,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_context: Option<UserContext>,
}

/// A reply as relayed by the proxy: either bare text or text with extras.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplyItem {
    Text(String),
    Rich(RichReply),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RichReply {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quick_replies: Vec<QuickReply>,
}

impl ReplyItem {
    pub fn into_message(self) -> ChatMessage {
        match self {
            ReplyItem::Text(text) => ChatMessage::assistant(text),
            ReplyItem::Rich(rich) => ChatMessage::assistant(rich.text)
                .with_metadata(rich.metadata)
                .with_quick_replies(rich.quick_replies),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub messages: Vec<ReplyItem>,
    #[serde(default)]
    pub is_ending: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}
