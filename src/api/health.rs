use axum::{extract::State, Json};
use serde::Serialize;

use crate::{app::AppState, service::chat::QaMode};

#[derive(Serialize)]
pub struct HealthResponse {
    ok: bool,
    llm_backend: Option<&'static str>,
    llm_model: Option<String>,
    retrieval: bool,
    chat_mode: QaMode,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let generator = state.providers.generator.as_deref();
    Json(HealthResponse {
        ok: true,
        llm_backend: generator.map(|generator| generator.backend().as_str()),
        llm_model: generator.map(|generator| generator.model().to_string()),
        retrieval: state.retrieval_enabled,
        chat_mode: state.chat.mode(),
    })
}
