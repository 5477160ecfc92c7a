use crate::models::{QuickReply, QuickReplyAction, QuickReplyCategory};

struct CatalogEntry {
    id: &'static str,
    text: &'static str,
    action: Option<QuickReplyAction>,
    category: QuickReplyCategory,
}

const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        id: "need-help-now",
        text: "I need help right now",
        action: Some(QuickReplyAction::CrisisMode),
        category: QuickReplyCategory::Crisis,
    },
    CatalogEntry {
        id: "strong-craving",
        text: "I'm having a really strong craving",
        action: None,
        category: QuickReplyCategory::Crisis,
    },
    CatalogEntry {
        id: "breathe-with-me",
        text: "Breathe with me",
        action: Some(QuickReplyAction::BreathingExercise),
        category: QuickReplyCategory::Crisis,
    },
    CatalogEntry {
        id: "talk-me-through",
        text: "Talk me through this urge",
        action: None,
        category: QuickReplyCategory::Support,
    },
    CatalogEntry {
        id: "slipped-up",
        text: "I slipped up",
        action: None,
        category: QuickReplyCategory::Support,
    },
    CatalogEntry {
        id: "encourage-me",
        text: "Tell me something encouraging",
        action: None,
        category: QuickReplyCategory::Support,
    },
    CatalogEntry {
        id: "urge-timer",
        text: "Start the urge timer",
        action: Some(QuickReplyAction::UrgeTimer),
        category: QuickReplyCategory::Tools,
    },
    CatalogEntry {
        id: "breathing",
        text: "Breathing exercise",
        action: Some(QuickReplyAction::BreathingExercise),
        category: QuickReplyCategory::Tools,
    },
    CatalogEntry {
        id: "how-am-i-doing",
        text: "How am I doing?",
        action: None,
        category: QuickReplyCategory::General,
    },
    CatalogEntry {
        id: "community",
        text: "See what the community says",
        action: Some(QuickReplyAction::Community),
        category: QuickReplyCategory::General,
    },
];

/// The built-in replies, in display order.
pub fn catalog() -> Vec<QuickReply> {
    CATALOG
        .iter()
        .map(|e| QuickReply {
            id: e.id.to_string(),
            text: e.text.to_string(),
            action: e.action,
            category: e.category,
            payload: None,
        })
        .collect()
}

pub fn allowed_in_crisis(category: QuickReplyCategory) -> bool {
    matches!(category, QuickReplyCategory::Crisis | QuickReplyCategory::Support)
}

/// Replies to show: runtime suggestions first, then the catalog, narrowed
/// to crisis and support entries while crisis mode is active.
pub fn visible(suggested: &[QuickReply], crisis_mode: bool) -> Vec<QuickReply> {
    suggested
        .iter()
        .cloned()
        .chain(catalog())
        .filter(|r| !crisis_mode || allowed_in_crisis(r.category))
        .collect()
}
