use axum::{extract::Path, Extension, Json};

use crate::{
    catalog,
    error::AppResult,
    middleware::CurrentSession,
    model::{ProgressUpdate, TopicDetail, TopicSummary},
    service::topics,
};

pub async fn list_topics() -> Json<Vec<TopicSummary>> {
    Json(catalog::topics().iter().map(TopicSummary::from).collect())
}

pub async fn get_topic(
    Path(slug): Path<String>,
    Extension(CurrentSession(session)): Extension<CurrentSession>,
) -> AppResult<Json<TopicDetail>> {
    let topic = topics::find_topic(&slug)?;
    let session = session.lock().await;

    Ok(Json(TopicDetail {
        slug: topic.slug,
        category: topic.category,
        title: topic.title,
        overview: topic.overview,
        key_points: topic.key_points,
        progress: topics::progress(&session, topic),
    }))
}

pub async fn update_progress(
    Path(slug): Path<String>,
    Extension(CurrentSession(session)): Extension<CurrentSession>,
    Json(payload): Json<ProgressUpdate>,
) -> AppResult<Json<topics::ProgressReport>> {
    let topic = topics::find_topic(&slug)?;
    let mut session = session.lock().await;
    let report = topics::set_step(&mut session, topic, &payload.step, payload.completed)?;
    Ok(Json(report))
}
