use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::client::crisis::{CrisisExitPolicy, CrisisState};
use crate::client::proxy_client::CoachProxy;
use crate::client::quick_replies;
use crate::models::{
    ChatMessage, ChatSession, MessageRole, ProxyAction, ProxyRequest, QuickReply, QuickReplyAction,
    ReplyItem, SessionContext, SessionType, UserContext, UserProfile,
};

/// Shown in place of the coach's answer when the proxy cannot be reached.
pub const FALLBACK_REPLY: &str = "I'm having trouble connecting right now. Please try again in a \
                                  moment. The breathing exercise and urge timer still work offline.";

/// Replies of one dispatch, waiting for their turn to be applied.
#[derive(Debug, Default)]
struct Completion {
    session_id: String,
    messages: Vec<ChatMessage>,
    is_ending: bool,
    /// Local apology, not a coach reply; crisis detection skips it.
    is_fallback: bool,
}

#[derive(Debug, Default)]
struct SessionState {
    session: Option<ChatSession>,
    crisis: CrisisState,
    policy: CrisisExitPolicy,
    next_seq: u64,
    next_to_apply: u64,
    completed: BTreeMap<u64, Completion>,
}

impl SessionState {
    fn ensure_session(&mut self, user_id: &str) -> &mut ChatSession {
        self.session
            .get_or_insert_with(|| ChatSession::new(user_id, SessionType::General))
    }

    fn is_crisis_mode(&self) -> bool {
        self.crisis.is_active(self.policy)
    }

    /// Applies finished dispatches strictly in the order they were issued.
    fn drain_completed(&mut self) {
        while let Some(done) = self.completed.remove(&self.next_to_apply) {
            self.next_to_apply += 1;
            let Some(session) = self.session.as_mut().filter(|s| s.id == done.session_id) else {
                debug!("Discarding {} replies for a closed session", done.messages.len());
                continue;
            };
            if !done.is_fallback {
                self.crisis.observe_turn(&done.messages, self.policy);
            }
            for message in done.messages {
                session.push(message);
            }
            if done.is_ending {
                session.is_ended = true;
            }
        }
    }
}

/// Injectable handle to the chat state. Clones share the same state.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<Mutex<SessionState>>,
}

impl SessionStore {
    pub fn new(policy: CrisisExitPolicy) -> Self {
        let state = SessionState { policy, ..Default::default() };
        Self { inner: Arc::new(Mutex::new(state)) }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn session(&self) -> Option<ChatSession> {
        self.lock().session.clone()
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.lock()
            .session
            .as_ref()
            .map(|s| s.messages.clone())
            .unwrap_or_default()
    }

    /// True while any dispatch is still waiting for its replies.
    pub fn is_typing(&self) -> bool {
        let state = self.lock();
        state.next_to_apply < state.next_seq
    }

    pub fn is_crisis_mode(&self) -> bool {
        self.lock().is_crisis_mode()
    }

    fn complete(&self, seq: u64, completion: Completion) {
        let mut state = self.lock();
        // Dispatches skipped by `end_session` no longer have a slot.
        if seq < state.next_to_apply {
            debug!("Discarding {} replies for a closed session", completion.messages.len());
            return;
        }
        state.completed.insert(seq, completion);
        state.drain_completed();
    }
}

/// Marks a dispatch as done even if its future is dropped mid-flight, so
/// later replies are not held back behind it forever.
struct PendingTurn {
    store: SessionStore,
    seq: u64,
    session_id: String,
    finished: bool,
}

impl PendingTurn {
    fn finish(mut self, messages: Vec<ChatMessage>, is_ending: bool, is_fallback: bool) {
        self.finished = true;
        let completion = Completion {
            session_id: std::mem::take(&mut self.session_id),
            messages,
            is_ending,
            is_fallback,
        };
        self.store.complete(self.seq, completion);
    }
}

impl Drop for PendingTurn {
    fn drop(&mut self) {
        if !self.finished {
            let completion = Completion {
                session_id: std::mem::take(&mut self.session_id),
                ..Default::default()
            };
            self.store.complete(self.seq, completion);
        }
    }
}

/// What selecting a quick reply did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuickReplyOutcome {
    CrisisModeEntered,
    /// The app should open this tool; nothing was sent.
    OpenTool(QuickReplyAction),
    Sent,
}

/// Drives one chat screen: session lifecycle, sending, crisis mode and
/// quick replies. Every failure ends up as a chat message, never an error.
#[derive(Clone)]
pub struct SessionController {
    store: SessionStore,
    proxy: Arc<dyn CoachProxy>,
    user_id: String,
    profile: Option<UserProfile>,
}

impl SessionController {
    pub fn new(user_id: impl Into<String>, proxy: Arc<dyn CoachProxy>, store: SessionStore) -> Self {
        Self { store, proxy, user_id: user_id.into(), profile: None }
    }

    pub fn with_profile(mut self, profile: UserProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    // ── Session lifecycle ─────────────────────────────────────────────────────

    /// Starts a session unless one is already active. Returns whether a new
    /// session was created.
    pub fn start_new_session(&self, session_type: SessionType) -> bool {
        let mut state = self.store.lock();
        if state.session.is_some() {
            return false;
        }
        let session = ChatSession::new(&self.user_id, session_type);
        info!("Started {:?} session {} for user {}", session_type, session.id, self.user_id);
        state.session = Some(session);
        true
    }

    /// Replaces the journey snapshot sent with subsequent turns.
    pub fn set_context(&self, context: SessionContext) {
        let mut state = self.store.lock();
        state.ensure_session(&self.user_id).context = Some(context);
    }

    /// Discards the session; replies still in flight for it are dropped.
    pub fn end_session(&self) {
        let mut state = self.store.lock();
        if let Some(session) = state.session.take() {
            info!("Ended session {} ({} messages)", session.id, session.messages.len());
        }
        // Outstanding dispatches belong to the old session; the next one
        // starts with a clean ordering window.
        state.next_to_apply = state.next_seq;
        state.completed.clear();
        state.crisis.exit();
    }

    // ── Sending ───────────────────────────────────────────────────────────────

    /// Sends free text. Blank input is ignored. The user message is visible
    /// before this future first suspends.
    pub async fn send_message(&self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        self.dispatch(ProxyAction::text(text), Some(ChatMessage::user(text))).await;
    }

    /// Asks the coach to open the conversation. No user message is shown.
    pub async fn launch(&self) {
        self.dispatch(ProxyAction::launch(), None).await;
    }

    pub async fn select_quick_reply(&self, reply: &QuickReply) -> QuickReplyOutcome {
        match reply.action {
            Some(QuickReplyAction::CrisisMode) => {
                self.enter_crisis_mode();
                QuickReplyOutcome::CrisisModeEntered
            }
            Some(tool) => QuickReplyOutcome::OpenTool(tool),
            None => {
                match &reply.payload {
                    Some(payload) => {
                        let action = ProxyAction::choice(payload.clone());
                        self.dispatch(action, Some(ChatMessage::user(&reply.text))).await;
                    }
                    None => self.send_message(&reply.text).await,
                }
                QuickReplyOutcome::Sent
            }
        }
    }

    async fn dispatch(&self, action: ProxyAction, user_message: Option<ChatMessage>) {
        let (pending, request) = {
            let mut state = self.store.lock();
            let session = state.ensure_session(&self.user_id);
            if let Some(message) = user_message {
                session.push(message);
            }
            let user_context =
                UserContext::assemble(self.profile.as_ref(), session.context.as_ref(), Utc::now());
            let session_id = session.id.clone();

            let seq = state.next_seq;
            state.next_seq += 1;

            let pending = PendingTurn { store: self.store.clone(), seq, session_id, finished: false };
            let request = ProxyRequest { action, user_id: self.user_id.clone(), user_context };
            (pending, request)
        };

        match self.proxy.send(&request).await {
            Ok(reply) => {
                let messages = reply.messages.into_iter().map(ReplyItem::into_message).collect();
                pending.finish(messages, reply.is_ending, false);
            }
            Err(e) => {
                warn!("Coach reply failed for user {}: {e}", self.user_id);
                pending.finish(vec![ChatMessage::assistant(FALLBACK_REPLY)], false, true);
            }
        }
    }

    // ── Crisis mode & quick replies ───────────────────────────────────────────

    pub fn enter_crisis_mode(&self) {
        self.store.lock().crisis.enter();
        info!("Crisis mode entered for user {}", self.user_id);
    }

    pub fn exit_crisis_mode(&self) {
        self.store.lock().crisis.exit();
        info!("Crisis mode exited for user {}", self.user_id);
    }

    pub fn is_crisis_mode(&self) -> bool {
        self.store.is_crisis_mode()
    }

    pub fn is_typing(&self) -> bool {
        self.store.is_typing()
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.store.messages()
    }

    /// Quick replies for the current mode, led by whatever the coach
    /// suggested with its latest message.
    pub fn visible_quick_replies(&self) -> Vec<QuickReply> {
        let state = self.store.lock();
        let suggested = state
            .session
            .as_ref()
            .and_then(|s| s.messages.last())
            .filter(|m| m.role == MessageRole::Assistant)
            .map(|m| m.quick_replies.as_slice())
            .unwrap_or_default();
        quick_replies::visible(suggested, state.is_crisis_mode())
    }
}
