use axum::{
    extract::{Path, State},
    Extension, Json,
};

use crate::{
    app::AppState,
    error::AppResult,
    middleware::CurrentSession,
    model::{ChatHistoryOut, ChatRequest},
    service::{chat::ChatAnswer, topics},
};

pub async fn ask(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Extension(CurrentSession(session)): Extension<CurrentSession>,
    Json(payload): Json<ChatRequest>,
) -> AppResult<Json<ChatAnswer>> {
    topics::find_topic(&slug)?;
    let mut session = session.lock().await;
    let answer = state.chat.ask(&mut session, &payload.question).await?;
    Ok(Json(answer))
}

pub async fn history(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Extension(CurrentSession(session)): Extension<CurrentSession>,
) -> AppResult<Json<ChatHistoryOut>> {
    topics::find_topic(&slug)?;
    let session = session.lock().await;
    Ok(Json(ChatHistoryOut {
        mode: state.chat.mode(),
        turns: session.chat_history.clone(),
    }))
}

pub async fn clear(
    Path(slug): Path<String>,
    Extension(CurrentSession(session)): Extension<CurrentSession>,
) -> AppResult<Json<serde_json::Value>> {
    topics::find_topic(&slug)?;
    let mut session = session.lock().await;
    let cleared = session.chat_history.len();
    session.chat_history.clear();
    tracing::debug!(session_id = %session.id, cleared, "chat history cleared");
    Ok(Json(serde_json::json!({ "ok": true })))
}
