//! Typed events for the presentation layer

use serde::Serialize;
use tokio::sync::broadcast;

use super::state::Step;

/// Assistant avatar expression
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    #[default]
    Neutral,
    /// Transient, while a VIN decode is in flight. Each turn still ends with
    /// exactly one settled mood after `Loading(false)`.
    Thinking,
    Happy,
    Concerned,
}

impl Mood {
    /// Mood implied by an assistant message when no explicit one was set
    pub fn from_content(content: &str) -> Self {
        let content = content.to_lowercase();
        if ["precio estimado", "perfecto", "gracias"]
            .iter()
            .any(|k| content.contains(k))
        {
            Mood::Happy
        } else if ["error", "no pude", "inválid", "invalido"]
            .iter()
            .any(|k| content.contains(k))
        {
            Mood::Concerned
        } else {
            Mood::Neutral
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ChatEvent {
    DockToggled { open: bool },
    OpenRequested { message: Option<String> },
    Handoff {
        reason: String,
        step: Step,
        conversation_id: String,
    },
    Mood(Mood),
    Loading(bool),
}

impl ChatEvent {
    /// SSE event name
    pub fn name(&self) -> &'static str {
        match self {
            ChatEvent::DockToggled { .. } => "dock_toggled",
            ChatEvent::OpenRequested { .. } => "open_requested",
            ChatEvent::Handoff { .. } => "handoff",
            ChatEvent::Mood(_) => "mood",
            ChatEvent::Loading(_) => "loading",
        }
    }
}

/// Per-session broadcast channel
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ChatEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishing with no subscribers is not an error
    pub fn publish(&self, event: ChatEvent) {
        tracing::trace!(event = event.name(), "Publishing chat event");
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
