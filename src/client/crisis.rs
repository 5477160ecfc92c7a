use std::time::Duration;

use tokio::time::Instant;

use crate::models::{ChatMessage, MessageRole};

/// How crisis mode ends once it has been entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrisisExitPolicy {
    /// Only an explicit `exit_crisis_mode` call ends it.
    #[default]
    ExplicitDismissal,
    /// The next assistant message without a crisis signal ends it.
    NextNonCrisisReply,
    /// It lapses this long after the most recent crisis signal.
    Timeout(Duration),
}

/// Whether an incoming message should put the session into crisis mode.
pub fn signals_crisis(message: &ChatMessage) -> bool {
    message.role == MessageRole::Assistant && message.is_crisis()
}

#[derive(Debug, Clone, Default)]
pub struct CrisisState {
    entered_at: Option<Instant>,
}

impl CrisisState {
    pub fn enter(&mut self) {
        self.entered_at = Some(Instant::now());
    }

    pub fn exit(&mut self) {
        self.entered_at = None;
    }

    pub fn is_active(&self, policy: CrisisExitPolicy) -> bool {
        match (self.entered_at, policy) {
            (None, _) => false,
            (Some(at), CrisisExitPolicy::Timeout(ttl)) => at.elapsed() < ttl,
            (Some(_), _) => true,
        }
    }

    /// Updates the mode for one coach turn that was just appended. Any crisis
    /// signal in the turn wins over calm replies alongside it.
    pub fn observe_turn(&mut self, messages: &[ChatMessage], policy: CrisisExitPolicy) {
        let mut replies = messages.iter().filter(|m| m.role == MessageRole::Assistant).peekable();
        if replies.peek().is_none() {
            return;
        }
        if replies.any(signals_crisis) {
            self.enter();
        } else if policy == CrisisExitPolicy::NextNonCrisisReply {
            self.exit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessageMetadata, MessageType, UrgencyLevel};

    fn crisis_reply() -> ChatMessage {
        ChatMessage::assistant("Stay with me.").with_metadata(Some(MessageMetadata {
            urgency_level: Some(UrgencyLevel::Crisis),
            ..Default::default()
        }))
    }

    #[test]
    fn either_tag_signals_crisis() {
        assert!(signals_crisis(&crisis_reply()));
        let by_type = ChatMessage::assistant("x").with_metadata(Some(MessageMetadata {
            message_type: Some(MessageType::Crisis),
            ..Default::default()
        }));
        assert!(signals_crisis(&by_type));
        assert!(!signals_crisis(&ChatMessage::assistant("hello")));
    }

    #[test]
    fn user_messages_never_trigger() {
        let mut msg = crisis_reply();
        msg.role = MessageRole::User;
        let mut state = CrisisState::default();
        state.observe_turn(&[msg], CrisisExitPolicy::ExplicitDismissal);
        assert!(!state.is_active(CrisisExitPolicy::ExplicitDismissal));
    }

    #[test]
    fn explicit_policy_ignores_calm_replies() {
        let policy = CrisisExitPolicy::ExplicitDismissal;
        let mut state = CrisisState::default();
        state.observe_turn(&[crisis_reply()], policy);
        state.observe_turn(&[ChatMessage::assistant("Nice work.")], policy);
        assert!(state.is_active(policy));
        state.exit();
        assert!(!state.is_active(policy));
    }

    #[test]
    fn next_reply_policy_exits_on_calm_reply() {
        let policy = CrisisExitPolicy::NextNonCrisisReply;
        let mut state = CrisisState::default();
        state.observe_turn(&[crisis_reply()], policy);
        assert!(state.is_active(policy));
        state.observe_turn(&[ChatMessage::assistant("Feeling better?")], policy);
        assert!(!state.is_active(policy));
    }

    #[test]
    fn calm_reply_in_the_same_turn_keeps_crisis_mode() {
        let policy = CrisisExitPolicy::NextNonCrisisReply;
        let mut state = CrisisState::default();
        state.observe_turn(&[crisis_reply(), ChatMessage::assistant("Let's breathe.")], policy);
        assert!(state.is_active(policy));
    }

    #[test]
    fn empty_turn_changes_nothing() {
        let policy = CrisisExitPolicy::NextNonCrisisReply;
        let mut state = CrisisState::default();
        state.enter();
        state.observe_turn(&[], policy);
        assert!(state.is_active(policy));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_policy_lapses() {
        let policy = CrisisExitPolicy::Timeout(Duration::from_secs(600));
        let mut state = CrisisState::default();
        state.enter();
        tokio::time::advance(Duration::from_secs(599)).await;
        assert!(state.is_active(policy));
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!state.is_active(policy));
    }
}
