//! Broadcast composition: the per-admin authoring state machine.
//!
//! `ComposeState::next` is a pure transition function; `SessionStore` owns one
//! state per administrator and applies inputs to it. Sessions live only in
//! memory and are dropped as soon as they return to `Idle`.

use crate::model::Draft;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ComposeState {
    #[default]
    Idle,
    CollectingImage,
    CollectingText {
        image_ref: Option<String>,
    },
    AwaitingConfirmation(Draft),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastKind {
    Text,
    TextWithImage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposeInput {
    Begin(BroadcastKind),
    Text(String),
    Image(String),
    Confirm,
    Cancel,
}

/// What the caller should do after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Input did not match what the current state expects; state unchanged.
    Ignored,
    AskImage,
    AskText { after_image: bool },
    /// Draft is complete and awaits an explicit send/cancel.
    Preview(Draft),
    /// Draft was confirmed and must be handed to the delivery engine.
    Confirmed(Draft),
    Cancelled,
}

impl ComposeState {
    pub fn is_idle(&self) -> bool {
        matches!(self, ComposeState::Idle)
    }

    pub fn next(self, input: ComposeInput) -> (ComposeState, Step) {
        use ComposeInput as In;
        use ComposeState as S;

        match (self, input) {
            (_, In::Cancel) => (S::Idle, Step::Cancelled),
            (S::Idle, In::Begin(BroadcastKind::Text)) => (
                S::CollectingText { image_ref: None },
                Step::AskText { after_image: false },
            ),
            (S::Idle, In::Begin(BroadcastKind::TextWithImage)) => {
                (S::CollectingImage, Step::AskImage)
            }
            (S::CollectingImage, In::Image(image_ref)) => (
                S::CollectingText {
                    image_ref: Some(image_ref),
                },
                Step::AskText { after_image: true },
            ),
            (S::CollectingText { image_ref }, In::Text(text)) if !text.trim().is_empty() => {
                let draft = Draft { text, image_ref };
                (S::AwaitingConfirmation(draft.clone()), Step::Preview(draft))
            }
            (S::AwaitingConfirmation(draft), In::Confirm) => (S::Idle, Step::Confirmed(draft)),
            (state, _) => (state, Step::Ignored),
        }
    }
}

/// In-memory composition sessions keyed by administrator id.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<i64, ComposeState>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn apply(&self, admin_id: i64, input: ComposeInput) -> Step {
        let mut sessions = self.sessions.lock().await;
        let current = sessions.remove(&admin_id).unwrap_or_default();
        let (next, step) = current.next(input);
        if !next.is_idle() {
            sessions.insert(admin_id, next);
        }
        step
    }

    pub async fn state(&self, admin_id: i64) -> ComposeState {
        self.sessions
            .lock()
            .await
            .get(&admin_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn is_active(&self, admin_id: i64) -> bool {
        self.sessions.lock().await.contains_key(&admin_id)
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}
