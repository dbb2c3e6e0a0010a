use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{
    app::AppState,
    error::AppError,
    service::session::{SessionHandle, SessionStatus},
};

pub const SESSION_HEADER: &str = "X-Session-Id";

/// The caller's session, inserted by [`require_session`].
#[derive(Clone)]
pub struct CurrentSession(pub SessionHandle);

pub async fn assign_trace_id(mut req: Request<Body>, next: Next) -> Response {
    let trace_id = Uuid::new_v4().to_string();
    req.extensions_mut().insert(trace_id.clone());
    let mut res = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        res.headers_mut().insert("X-Trace-Id", value);
    }
    res
}

pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let session_id = extract_session_id(req.headers())
        .ok_or_else(|| AppError::Unauthorized("X-Session-Id 헤더가 필요합니다".to_string()))?;

    match state.sessions.lookup(&session_id).await {
        Ok(handle) => {
            req.extensions_mut().insert(CurrentSession(handle));
            Ok(next.run(req).await)
        }
        Err(SessionStatus::Expired) => Err(AppError::Unauthorized(
            "세션이 만료되었습니다".to_string(),
        )),
        Err(_) => Err(AppError::Unauthorized(
            "알 수 없는 세션입니다".to_string(),
        )),
    }
}

fn extract_session_id(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(SESSION_HEADER)?.to_str().ok()?.trim();
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}
