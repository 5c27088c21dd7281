//! Conversation API and the per-session event stream

use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
    routing::{get, post},
    Router,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;

use crate::conversation::ChatMessage;
use crate::core::{ChatError, ChatSession, SessionHandle, Step};
use crate::AppState;

use super::{api_error, ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct OpenSessionRequest {
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct AnnounceRequest {
    pub text: String,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OpenRequest {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub conversation_id: String,
    pub step: Step,
    pub is_open: bool,
    pub loading: bool,
    pub messages: Vec<ChatMessage>,
}

impl SessionView {
    fn of(chat: &ChatSession) -> Self {
        Self {
            session_id: chat.id().to_string(),
            conversation_id: chat.conversation_id().to_string(),
            step: chat.state().current_step,
            is_open: chat.is_open(),
            loading: chat.is_loading(),
            messages: chat.messages().to_vec(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TurnResponse {
    pub step: Step,
    pub replies: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub open: bool,
}

fn internal(err: ChatError) -> ApiError {
    tracing::error!(error = %err, "Session operation failed");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "Error interno del servidor")
}

/// Only `POST /v1/sessions` creates sessions
async fn existing(state: &AppState, id: &str) -> Result<SessionHandle, ApiError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Sesión no encontrada"))
}

async fn open_session(
    State(state): State<AppState>,
    body: Option<Json<OpenSessionRequest>>,
) -> Json<SessionView> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let (_, handle) = state.sessions.open(request.session_id).await;
    let chat = handle.session.lock().await;
    Json(SessionView::of(&chat))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    let handle = existing(&state, &id).await?;
    let chat = handle.session.lock().await;
    Ok(Json(SessionView::of(&chat)))
}

/// Turns are sequential: a second message while one is in flight is refused
async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<TurnResponse>, ApiError> {
    let handle = existing(&state, &id).await?;
    let mut chat = handle.session.try_lock().map_err(|_| {
        api_error(
            StatusCode::CONFLICT,
            "Todavía estoy procesando tu mensaje anterior",
        )
    })?;

    let replies = chat.send_message(&request.text).await;

    if let Some(lead) = chat.take_pending_lead() {
        let session_id = chat.id().to_string();
        tokio::spawn(async move {
            if let Ok(outcome) = lead.await {
                tracing::debug!(session_id, ?outcome, "Lead dispatch finished");
            }
        });
    }

    Ok(Json(TurnResponse {
        step: chat.state().current_step,
        replies,
    }))
}

async fn reset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    let handle = existing(&state, &id).await?;
    let mut chat = handle.session.lock().await;
    chat.start_new_conversation();
    Ok(Json(SessionView::of(&chat)))
}

async fn toggle(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ToggleResponse>, ApiError> {
    let handle = existing(&state, &id).await?;
    let mut chat = handle.session.lock().await;
    let open = chat.toggle_open().await.map_err(internal)?;
    Ok(Json(ToggleResponse { open }))
}

async fn announce(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AnnounceRequest>,
) -> Result<Json<SessionView>, ApiError> {
    if request.text.trim().is_empty() {
        return Err(api_error(StatusCode::UNPROCESSABLE_ENTITY, "El mensaje está vacío"));
    }
    let handle = existing(&state, &id).await?;
    let mut chat = handle.session.lock().await;
    chat.announce(request.text.trim(), request.options)
        .await
        .map_err(internal)?;
    Ok(Json(SessionView::of(&chat)))
}

async fn request_open(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<OpenRequest>>,
) -> Result<Json<SessionView>, ApiError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let handle = existing(&state, &id).await?;
    let mut chat = handle.session.lock().await;
    chat.request_open(request.message).await.map_err(internal)?;
    Ok(Json(SessionView::of(&chat)))
}

/// Server-sent stream of the session's `ChatEvent`s
async fn events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let handle = existing(&state, &id).await?;
    let session_id = id;
    let mut rx = handle.events.subscribe();

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => match Event::default().event(event.name()).json_data(&event) {
                    Ok(sse) => yield Ok(sse),
                    Err(e) => tracing::warn!(error = %e, "Failed to encode chat event"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(session_id = %session_id, skipped, "Event subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/sessions", post(open_session))
        .route("/v1/sessions/:id", get(get_session))
        .route("/v1/sessions/:id/messages", post(send_message))
        .route("/v1/sessions/:id/reset", post(reset))
        .route("/v1/sessions/:id/toggle", post(toggle))
        .route("/v1/sessions/:id/announce", post(announce))
        .route("/v1/sessions/:id/open", post(request_open))
        .route("/v1/sessions/:id/events", get(events))
}
