use axum::{
    extract::{Path, State},
    Extension, Json,
};

use crate::{
    app::AppState,
    error::{AppError, AppResult},
    middleware::CurrentSession,
    model::{GradeOut, GradeRequest, QuizOut, QuizRequest},
    service::topics,
};

pub async fn generate(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Extension(CurrentSession(session)): Extension<CurrentSession>,
    Json(payload): Json<QuizRequest>,
) -> AppResult<Json<QuizOut>> {
    let topic = topics::find_topic(&slug)?;
    let mut session = session.lock().await;
    let generated = state
        .quiz
        .generate(
            &mut session,
            topic,
            payload.difficulty,
            payload.n_items,
            payload.with_context,
        )
        .await?;

    let mut out = QuizOut::new(topic.slug, &generated.quiz);
    out.requested = Some(generated.requested);
    out.warnings = generated.warnings;
    Ok(Json(out))
}

pub async fn current(
    Path(slug): Path<String>,
    Extension(CurrentSession(session)): Extension<CurrentSession>,
) -> AppResult<Json<QuizOut>> {
    let topic = topics::find_topic(&slug)?;
    let session = session.lock().await;
    let quiz = session
        .current_quiz
        .get(topic.slug)
        .ok_or_else(|| AppError::NotFound("생성된 문제가 없습니다".to_string()))?;
    Ok(Json(QuizOut::new(topic.slug, quiz)))
}

pub async fn grade(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Extension(CurrentSession(session)): Extension<CurrentSession>,
    Json(payload): Json<GradeRequest>,
) -> AppResult<Json<GradeOut>> {
    let topic = topics::find_topic(&slug)?;
    let session = session.lock().await;
    let results = state.quiz.grade(&session, topic, &payload.answers).await?;
    Ok(Json(GradeOut::from(results)))
}
