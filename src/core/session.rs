//! Chat sessions
//!
//! A `ChatSession` owns one visitor's transcript and `UserData`, runs turns
//! through the engine one at a time and persists a snapshot after each.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::messages;
use crate::conversation::{ChatMessage, Transcript};
use crate::leads::LeadOutcome;

use super::engine::{ConversationEngine, Persistence, TurnContext, TurnResult};
use super::events::{ChatEvent, EventBus, Mood};
use super::memory::{SessionStore, SnapshotKind, StoreError};
use super::state::UserData;

/// Errors at the turn boundary. Decode and fallback failures are absorbed
/// by the engine, so only persistence can fail a turn.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub struct ChatSession {
    id: String,
    conversation_id: String,
    state: UserData,
    transcript: Transcript,
    is_open: bool,
    loading: bool,
    engine: Arc<ConversationEngine>,
    store: Arc<SessionStore>,
    events: EventBus,
    pending_lead: Option<JoinHandle<LeadOutcome>>,
}

impl ChatSession {
    pub fn new(
        id: impl Into<String>,
        engine: Arc<ConversationEngine>,
        store: Arc<SessionStore>,
        events: EventBus,
    ) -> Self {
        Self {
            id: id.into(),
            conversation_id: Uuid::new_v4().to_string(),
            state: UserData::new(),
            transcript: Transcript::new(),
            is_open: false,
            loading: false,
            engine,
            store,
            events,
            pending_lead: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn state(&self) -> &UserData {
        &self.state
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.transcript.messages()
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Handle of the lead dispatched by the last turn, if any
    pub fn take_pending_lead(&mut self) -> Option<JoinHandle<LeadOutcome>> {
        self.pending_lead.take()
    }

    /// Run one user turn. Returns the assistant messages it produced.
    pub async fn send_message(&mut self, text: &str) -> Vec<ChatMessage> {
        let max = self.engine.agency().chat.max_message_length;
        let text: String = text.trim().chars().take(max).collect();
        let text = text.trim_end();
        if text.is_empty() {
            return Vec::new();
        }

        self.loading = true;
        self.events.publish(ChatEvent::Loading(true));
        self.transcript.push(ChatMessage::user(text));

        let (replies, mood) = match self.run_turn(text).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(
                    session_id = %self.id,
                    conversation_id = %self.conversation_id,
                    error = %e,
                    "Turn failed"
                );
                (vec![ChatMessage::assistant(messages::GENERIC_ERROR)], Some(Mood::Concerned))
            }
        };
        self.transcript.extend(replies.clone());

        self.loading = false;
        self.events.publish(ChatEvent::Loading(false));
        let mood = mood.unwrap_or_else(|| {
            self.transcript
                .last_assistant()
                .map(|m| Mood::from_content(&m.content))
                .unwrap_or_default()
        });
        self.events.publish(ChatEvent::Mood(mood));

        replies
    }

    async fn run_turn(&mut self, text: &str) -> Result<(Vec<ChatMessage>, Option<Mood>), ChatError> {
        let ctx = TurnContext {
            conversation_id: &self.conversation_id,
            history: self.transcript.messages(),
            events: &self.events,
        };
        let mut result = self.engine.process_turn(text, &self.state, &ctx).await;

        match result.persistence {
            Persistence::Live => {}
            Persistence::Abandon => {
                self.store
                    .save(&self.id, SnapshotKind::Abandoned, &self.state)
                    .await?;
            }
            Persistence::DiscardSnapshots => {
                self.store.discard(&self.id, SnapshotKind::Abandoned).await?;
            }
            Persistence::Resume => {
                let snapshot = self.store.resumable(&self.id).await?;
                if snapshot.is_some() {
                    self.store.discard(&self.id, SnapshotKind::Abandoned).await?;
                }
                result = self.engine.resume(snapshot);
            }
        }

        let TurnResult {
            state,
            messages,
            mood,
            lead,
            fresh_conversation,
            ..
        } = result;

        self.store.save(&self.id, SnapshotKind::Live, &state).await?;
        self.state = state;
        if fresh_conversation {
            self.conversation_id = Uuid::new_v4().to_string();
            tracing::debug!(
                session_id = %self.id,
                conversation_id = %self.conversation_id,
                "Started a new conversation"
            );
        }
        if lead.is_some() {
            self.pending_lead = lead;
        }
        Ok((messages, mood))
    }

    /// Clear the transcript and begin a fresh conversation
    pub fn start_new_conversation(&mut self) {
        self.transcript.clear();
        self.state = UserData::new();
        self.conversation_id = Uuid::new_v4().to_string();
        self.transcript.push(self.engine.welcome());
    }

    /// Open or close the dock. Opening an empty dock greets the visitor and
    /// offers to resume a pending quote.
    pub async fn toggle_open(&mut self) -> Result<bool, ChatError> {
        self.is_open = !self.is_open;
        let event = if self.is_open { "chat_opened" } else { "chat_closed" };
        tracing::info!(
            event,
            session_id = %self.id,
            conversation_id = %self.conversation_id,
            "Chat dock toggled"
        );
        self.events.publish(ChatEvent::DockToggled { open: self.is_open });

        if self.is_open && self.transcript.is_empty() {
            self.transcript.push(self.engine.welcome());
            if self.store.resumable(&self.id).await?.is_some() {
                self.transcript.push(ChatMessage::suggestion(
                    messages::RESUME_OFFER,
                    messages::RESUME_OPTIONS,
                ));
            }
        }
        Ok(self.is_open)
    }

    /// Push an assistant message from outside the conversation, opening the dock
    pub async fn announce(&mut self, text: &str, options: Vec<String>) -> Result<(), ChatError> {
        if !self.is_open {
            self.toggle_open().await?;
        }
        let message = if options.is_empty() {
            ChatMessage::assistant(text)
        } else {
            ChatMessage::suggestion(text, options)
        };
        self.transcript.push(message);
        Ok(())
    }

    /// External request to open the chat, optionally with a message to show
    pub async fn request_open(&mut self, message: Option<String>) -> Result<(), ChatError> {
        self.events.publish(ChatEvent::OpenRequested {
            message: message.clone(),
        });

        let was_empty = self.transcript.is_empty();
        if !self.is_open {
            self.toggle_open().await?;
        }
        if let Some(text) = message.filter(|_| was_empty) {
            self.transcript.push(ChatMessage::assistant(text));
        }
        Ok(())
    }
}

/// Shared handle to a live session
#[derive(Clone)]
pub struct SessionHandle {
    pub session: Arc<Mutex<ChatSession>>,
    pub events: EventBus,
    last_seen: Arc<AtomicI64>,
}

impl SessionHandle {
    fn touch(&self) {
        self.last_seen
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    fn last_seen(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_seen.load(Ordering::Relaxed))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Mid-turn or streaming events to someone
    fn in_use(&self) -> bool {
        self.session.try_lock().is_err() || self.events.subscriber_count() > 0
    }
}

/// Live sessions by id. Sessions idle for longer than the snapshot TTL are
/// dropped by `evict_idle`; their snapshots stay in the store.
pub struct SessionRegistry {
    engine: Arc<ConversationEngine>,
    store: Arc<SessionStore>,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new(engine: Arc<ConversationEngine>, store: Arc<SessionStore>) -> Self {
        Self {
            engine,
            store,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn engine(&self) -> &Arc<ConversationEngine> {
        &self.engine
    }

    /// Return the session with this id, creating it if needed. A new id is
    /// generated when none is given.
    pub async fn open(&self, id: Option<String>) -> (String, SessionHandle) {
        let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());

        if let Some(handle) = self.get(&id).await {
            return (id, handle);
        }

        let mut sessions = self.sessions.write().await;
        let handle = sessions
            .entry(id.clone())
            .or_insert_with(|| {
                tracing::debug!(session_id = %id, "Creating chat session");
                let events = EventBus::default();
                let session = ChatSession::new(
                    id.clone(),
                    Arc::clone(&self.engine),
                    Arc::clone(&self.store),
                    events.clone(),
                );
                SessionHandle {
                    session: Arc::new(Mutex::new(session)),
                    events,
                    last_seen: Arc::new(AtomicI64::new(0)),
                }
            })
            .clone();
        handle.touch();
        (id, handle)
    }

    /// Existing session only
    pub async fn get(&self, id: &str) -> Option<SessionHandle> {
        let handle = self.sessions.read().await.get(id).cloned()?;
        handle.touch();
        Some(handle)
    }

    /// Drop sessions idle past the TTL. Returns how many were removed.
    pub async fn evict_idle(&self) -> usize {
        let cutoff = Utc::now() - self.store.ttl();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, handle| handle.in_use() || handle.last_seen() >= cutoff);
        before - sessions.len()
    }

    /// Periodic cleanup of idle sessions and stale snapshots
    pub async fn sweep(&self) {
        let evicted = self.evict_idle().await;
        match self.store.purge_stale().await {
            Ok(purged) if evicted > 0 || purged > 0 => {
                tracing::debug!(evicted, purged, "Swept idle sessions");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Failed to purge stale snapshots"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgencyConfig;
    use crate::core::state::Step;
    use crate::leads::testing::RecordingSubmitter;
    use crate::leads::LeadDispatcher;
    use crate::providers::testing::CannedFallback;
    use crate::vin::testing::{corolla, FakeDecoder};

    const VIN: &str = "2T1BURHE0JC000001";

    async fn store() -> Arc<SessionStore> {
        Arc::new(
            SessionStore::new_in_memory(chrono::Duration::minutes(90))
                .await
                .unwrap(),
        )
    }

    fn engine() -> Arc<ConversationEngine> {
        engine_with(Arc::default())
    }

    fn engine_with(submitter: Arc<RecordingSubmitter>) -> Arc<ConversationEngine> {
        Arc::new(ConversationEngine::new(
            Arc::new(AgencyConfig::default()),
            Arc::new(FakeDecoder::with(VIN, corolla())),
            Arc::new(LeadDispatcher::new(submitter)),
            Arc::new(CannedFallback(None)),
        ))
    }

    /// Run a one-vehicle quote through to the thank-you message
    async fn quote_and_finish(chat: &mut ChatSession) -> Vec<ChatMessage> {
        let mut replies = Vec::new();
        for input in [
            messages::QUOTE_AUTO,
            "1",
            "01/02/1990",
            VIN,
            "Sí, continuar",
            "Ana Pérez",
            "ana@example.com",
            "(562) 381-2012",
            "5863 Imperial Hwy, South Gate",
            "D1234567",
        ] {
            replies = chat.send_message(input).await;
        }
        replies
    }

    async fn session(id: &str, store: Arc<SessionStore>) -> ChatSession {
        ChatSession::new(id, engine(), store, EventBus::default())
    }

    #[tokio::test]
    async fn test_send_message_appends_in_order() {
        let mut chat = session("s1", store().await).await;
        chat.send_message(messages::QUOTE_AUTO).await;
        chat.send_message("1").await;
        chat.send_message("01/02/1990").await;
        let replies = chat.send_message(VIN).await;

        assert_eq!(chat.state().current_step, Step::ConfirmQuote);
        assert_eq!(replies.len(), 4);
        let all = chat.messages();
        assert_eq!(all[all.len() - 5].content, VIN);
        assert!(all.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[tokio::test]
    async fn test_empty_input_is_ignored_and_long_input_truncated() {
        let mut chat = session("s1", store().await).await;
        assert!(chat.send_message("   ").await.is_empty());
        assert!(chat.messages().is_empty());

        chat.send_message(&"x".repeat(600)).await;
        assert_eq!(chat.messages()[0].content.chars().count(), 500);
    }

    #[tokio::test]
    async fn test_loading_and_mood_events() {
        let mut chat = session("s1", store().await).await;
        let mut events = chat.events().subscribe();
        chat.send_message("hola").await;

        assert_eq!(events.recv().await.unwrap(), ChatEvent::Loading(true));
        assert_eq!(events.recv().await.unwrap(), ChatEvent::Loading(false));
        assert!(matches!(events.recv().await.unwrap(), ChatEvent::Mood(_)));
        assert!(!chat.is_loading());
    }

    #[tokio::test]
    async fn test_decode_turn_settles_on_one_mood() {
        let mut chat = session("s1", store().await).await;
        chat.send_message(messages::QUOTE_AUTO).await;
        chat.send_message("1").await;
        chat.send_message("01/02/1990").await;

        let mut events = chat.events().subscribe();
        chat.send_message(VIN).await;

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert_eq!(
            seen,
            vec![
                ChatEvent::Loading(true),
                ChatEvent::Mood(Mood::Thinking),
                ChatEvent::Loading(false),
                ChatEvent::Mood(Mood::Happy),
            ]
        );
        // exactly one mood once the turn is over
        let settled = seen
            .iter()
            .skip_while(|e| **e != ChatEvent::Loading(false))
            .filter(|e| matches!(e, ChatEvent::Mood(_)))
            .count();
        assert_eq!(settled, 1);
    }

    #[tokio::test]
    async fn test_restart_after_finish_allows_a_second_lead() {
        let submitter = Arc::new(RecordingSubmitter::default());
        let mut chat = ChatSession::new(
            "s1",
            engine_with(submitter.clone()),
            store().await,
            EventBus::default(),
        );

        let replies = quote_and_finish(&mut chat).await;
        assert_eq!(replies[0].content, messages::FINISH);
        chat.take_pending_lead().unwrap().await.unwrap();
        let first_conversation = chat.conversation_id().to_string();

        chat.send_message("Volver al inicio ⬅️").await;
        assert_ne!(chat.conversation_id(), first_conversation);

        let replies = quote_and_finish(&mut chat).await;
        assert_eq!(replies[0].content, messages::FINISH);
        chat.take_pending_lead().unwrap().await.unwrap();

        let leads = submitter.leads.lock().await;
        assert_eq!(leads.len(), 2);
        assert_eq!(leads[0].idempotency_key, first_conversation);
        assert_eq!(leads[1].idempotency_key, chat.conversation_id());
    }

    #[tokio::test]
    async fn test_open_offers_resume_after_restart() {
        let store = store().await;
        let mut chat = session("s1", store.clone()).await;
        chat.send_message(messages::QUOTE_AUTO).await;
        chat.send_message("2").await;
        chat.send_message("Volver al inicio ⬅️").await;
        assert_eq!(chat.state().current_step, Step::Welcome);

        // a fresh page load for the same visitor
        let mut reopened = session("s1", store).await;
        assert!(reopened.toggle_open().await.unwrap());
        let shown = reopened.messages();
        assert_eq!(shown.len(), 2);
        assert_eq!(shown[1].options(), messages::RESUME_OPTIONS);

        let replies = reopened.send_message(messages::RESUME_YES).await;
        assert_eq!(reopened.state().current_step, Step::AskBirthdate);
        assert_eq!(reopened.state().vehicles.len(), 2);
        assert_eq!(replies[0].content, messages::RESUMED);
        assert_eq!(replies[1].content, messages::ASK_BIRTHDATE);
    }

    #[tokio::test]
    async fn test_open_without_snapshot_only_welcomes() {
        let mut chat = session("s1", store().await).await;
        chat.toggle_open().await.unwrap();
        assert_eq!(chat.messages().len(), 1);
        assert_eq!(chat.messages()[0].options(), messages::WELCOME_SUGGESTIONS);

        // closing and reopening does not repeat the greeting
        assert!(!chat.toggle_open().await.unwrap());
        chat.toggle_open().await.unwrap();
        assert_eq!(chat.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_start_new_conversation() {
        let mut chat = session("s1", store().await).await;
        chat.send_message(messages::QUOTE_AUTO).await;
        let before = chat.conversation_id().to_string();

        chat.start_new_conversation();
        assert_ne!(chat.conversation_id(), before);
        assert_eq!(chat.state(), &UserData::new());
        assert_eq!(chat.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_request_open_with_message() {
        let mut chat = session("s1", store().await).await;
        chat.request_open(Some("¿Buscas cotizar tu auto?".into()))
            .await
            .unwrap();
        assert!(chat.is_open());
        assert_eq!(chat.messages().last().unwrap().content, "¿Buscas cotizar tu auto?");

        let count = chat.messages().len();
        chat.request_open(Some("otra vez".into())).await.unwrap();
        assert_eq!(chat.messages().len(), count);
    }

    #[tokio::test]
    async fn test_announce_opens_dock() {
        let mut chat = session("s1", store().await).await;
        chat.announce("Nuevo: descuentos multi-auto", vec!["Descuentos 💸".into()])
            .await
            .unwrap();
        assert!(chat.is_open());
        assert_eq!(chat.messages().last().unwrap().options(), ["Descuentos 💸"]);
    }

    #[tokio::test]
    async fn test_registry_reuses_sessions() {
        let registry = SessionRegistry::new(engine(), store().await);
        let (id, first) = registry.open(None).await;
        let (same_id, second) = registry.open(Some(id.clone())).await;

        assert_eq!(id, same_id);
        assert!(Arc::ptr_eq(&first.session, &second.session));
        assert!(registry.get(&id).await.is_some());
        assert!(registry.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_idle_sessions_are_evicted() {
        let store = Arc::new(
            SessionStore::new_in_memory(chrono::Duration::zero())
                .await
                .unwrap(),
        );
        let registry = SessionRegistry::new(engine(), store);
        let (idle, _) = registry.open(Some("idle".into())).await;
        let (_, busy) = registry.open(Some("busy".into())).await;
        let (_, watched) = registry.open(Some("watched".into())).await;
        let _turn = busy.session.lock().await;
        let _stream = watched.events.subscribe();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert_eq!(registry.evict_idle().await, 1);
        assert!(registry.get(&idle).await.is_none());
        assert!(registry.get("busy").await.is_some());
        assert!(registry.get("watched").await.is_some());
    }
}
