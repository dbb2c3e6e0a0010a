use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    app::AppState,
    error::{AppError, AppResult},
    model::SessionCreated,
};

pub async fn create_session(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<SessionCreated>)> {
    let (session_id, created_at) = state.sessions.issue_session().await;

    Ok((
        StatusCode::CREATED,
        Json(SessionCreated {
            session_id,
            expires_in: state.sessions.ttl_secs(),
            created_at: created_at.to_rfc3339(),
        }),
    ))
}

pub async fn end_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    if !state.sessions.end_session(&id).await {
        return Err(AppError::NotFound("알 수 없는 세션입니다".to_string()));
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}
