use std::{sync::Arc, time::Duration};

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    api,
    config::AppConfig,
    middleware as mw,
    service::{
        chat::{ChatService, ChatSettings},
        quiz::{QuizService, QuizSettings},
        session::SessionManager,
    },
    util::{
        llm::{build_providers, LlmProviders},
        qdrant::{QdrantRetriever, Retriever},
    },
};

#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionManager,
    pub providers: LlmProviders,
    pub retrieval_enabled: bool,
    pub quiz: QuizService,
    pub chat: ChatService,
}

impl AppState {
    pub fn new(
        config: &AppConfig,
        providers: LlmProviders,
        retriever: Option<Arc<dyn Retriever>>,
    ) -> anyhow::Result<Self> {
        let quiz = QuizService::new(
            providers.generator.clone(),
            retriever.clone(),
            QuizSettings::from_config(config)?,
        );
        let chat = ChatService::new(
            providers.generator.clone(),
            retriever.clone(),
            ChatSettings::from_config(config)?,
        );
        let sessions = SessionManager::new(Duration::from_secs(config.session.ttl_secs));

        Ok(Self {
            sessions,
            providers,
            retrieval_enabled: retriever.is_some(),
            quiz,
            chat,
        })
    }
}

pub async fn build_router(config: &AppConfig) -> anyhow::Result<Router> {
    let providers = build_providers(&config.llm, &config.http_client)?;

    let retriever: Option<Arc<dyn Retriever>> =
        match QdrantRetriever::new(&config.retrieval, providers.embedder.clone()).await? {
            Some(retriever) => Some(Arc::new(retriever)),
            None => None,
        };

    let state = AppState::new(config, providers, retriever)?;
    tracing::info!(
        chat_mode = state.chat.mode().as_str(),
        retrieval = state.retrieval_enabled,
        session_ttl_secs = state.sessions.ttl_secs(),
        "application state ready"
    );

    Ok(router(state))
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(middleware::from_fn(mw::assign_trace_id));

    let session_api = Router::new()
        .route("/topics/:slug", get(api::topics::get_topic))
        .route("/topics/:slug/progress", put(api::topics::update_progress))
        .route(
            "/topics/:slug/chat",
            post(api::chat::ask)
                .get(api::chat::history)
                .delete(api::chat::clear),
        )
        .route(
            "/topics/:slug/quiz",
            post(api::quiz::generate).get(api::quiz::current),
        )
        .route("/topics/:slug/quiz/grade", post(api::quiz::grade))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            mw::require_session,
        ));

    Router::new()
        .route("/healthz", get(api::health::health_check))
        .route("/sessions", post(api::sessions::create_session))
        .route("/sessions/:id", delete(api::sessions::end_session))
        .route("/topics", get(api::topics::list_topics))
        .merge(session_api)
        .layer(middleware)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::{
        service::fakes::ScriptedGenerator,
        util::llm::TextGenerator,
    };

    fn test_state(generator: Option<Arc<dyn TextGenerator>>) -> AppState {
        let providers = LlmProviders {
            generator,
            embedder: None,
        };
        AppState::new(&AppConfig::default(), providers, None).unwrap()
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        session: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(session) = session {
            builder = builder.header("X-Session-Id", session);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn new_session(app: &Router) -> String {
        let (status, body) = send(app, Method::POST, "/sessions", None, None).await;
        assert_eq!(status, StatusCode::CREATED);
        body["session_id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_reports_configuration() {
        let app = router(test_state(None));
        let (status, body) = send(&app, Method::GET, "/healthz", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["llm_backend"], Value::Null);
        assert_eq!(body["chat_mode"], "manual");
    }

    #[tokio::test]
    async fn topic_list_is_public() {
        let app = router(test_state(None));
        let (status, body) = send(&app, Method::GET, "/topics", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 7);
    }

    #[tokio::test]
    async fn session_routes_require_a_known_session() {
        let app = router(test_state(None));

        let (status, body) = send(&app, Method::GET, "/topics/etch", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "Unauthorized");

        let (status, _) = send(&app, Method::GET, "/topics/etch", Some("nope"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let session = new_session(&app).await;
        let (status, _) = send(&app, Method::GET, "/topics/etch", Some(&session), None).await;
        assert_eq!(status, StatusCode::OK);

        let uri = format!("/sessions/{session}");
        let (status, _) = send(&app, Method::DELETE, &uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, Method::GET, "/topics/etch", Some(&session), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn progress_is_tracked_per_session() {
        let app = router(test_state(None));
        let session = new_session(&app).await;

        let (status, body) = send(
            &app,
            Method::PUT,
            "/topics/photolithography/progress",
            Some(&session),
            Some(json!({ "step": "노광 (Exposure)", "completed": true })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["completed"], 1);
        assert_eq!(body["total"], 8);
        assert_eq!(body["percent"], 12);

        let (status, body) = send(
            &app,
            Method::PUT,
            "/topics/photolithography/progress",
            Some(&session),
            Some(json!({ "step": "없는 단계", "completed": true })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "BadRequest");

        let other = new_session(&app).await;
        let (_, body) = send(
            &app,
            Method::GET,
            "/topics/photolithography",
            Some(&other),
            None,
        )
        .await;
        assert_eq!(body["progress"]["completed"], 0);
    }

    #[tokio::test]
    async fn unknown_topic_is_not_found() {
        let app = router(test_state(None));
        let session = new_session(&app).await;
        let (status, body) = send(&app, Method::GET, "/topics/cmp", Some(&session), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NotFound");
    }

    #[tokio::test]
    async fn quiz_without_backend_is_unavailable() {
        let app = router(test_state(None));
        let session = new_session(&app).await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/topics/etch/quiz",
            Some(&session),
            Some(json!({ "difficulty": "basic", "n_items": 3 })),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "Unavailable");
    }

    #[tokio::test]
    async fn invalid_item_count_is_bad_request() {
        let generator = ScriptedGenerator::new(Vec::<String>::new());
        let app = router(test_state(Some(generator)));
        let session = new_session(&app).await;
        let (status, _) = send(
            &app,
            Method::POST,
            "/topics/etch/quiz",
            Some(&session),
            Some(json!({ "difficulty": "advanced", "n_items": 2 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn quiz_round_trip_hides_answers_until_graded() {
        let generator = ScriptedGenerator::new([
            "1) 건식 식각의 대표 방식은?\nA) RIE\nB) CMP\nC) CVD\nD) ALD\n정답: A\n해설: RIE는 플라즈마 건식 식각입니다.",
        ]);
        let app = router(test_state(Some(generator)));
        let session = new_session(&app).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/topics/etch/quiz",
            Some(&session),
            Some(json!({ "difficulty": "basic", "n_items": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"][0]["kind"], "multiple_choice");
        assert_eq!(body["items"][0]["options"][0], "A) RIE");
        assert!(body["items"][0].get("answer").is_none());

        let (status, body) =
            send(&app, Method::GET, "/topics/etch/quiz", Some(&session), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"].as_array().unwrap().len(), 1);

        let (status, body) = send(
            &app,
            Method::POST,
            "/topics/etch/quiz/grade",
            Some(&session),
            Some(json!({ "answers": ["A"] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["correct"], 1);
        assert_eq!(body["results"][0]["verdict"], "correct");
        assert_eq!(body["results"][0]["correct_answer"], "A");
    }

    #[tokio::test]
    async fn upstream_failure_maps_to_bad_gateway() {
        let app = router(test_state(Some(ScriptedGenerator::failing())));
        let session = new_session(&app).await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/topics/deposition/quiz",
            Some(&session),
            Some(json!({ "difficulty": "advanced", "n_items": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "Upstream");
    }

    #[tokio::test]
    async fn chat_history_is_shared_across_topics_and_clearable() {
        let app = router(test_state(None));
        let session = new_session(&app).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/topics/etch/chat",
            Some(&session),
            Some(json!({ "question": "선택비란?" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "정확히 알 수 없습니다.");

        let (_, body) = send(
            &app,
            Method::GET,
            "/topics/oxidation/chat",
            Some(&session),
            None,
        )
        .await;
        assert_eq!(body["turns"].as_array().unwrap().len(), 2);
        assert_eq!(body["turns"][0]["role"], "user");

        let (status, _) = send(
            &app,
            Method::DELETE,
            "/topics/etch/chat",
            Some(&session),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = send(&app, Method::GET, "/topics/etch/chat", Some(&session), None).await;
        assert!(body["turns"].as_array().unwrap().is_empty());

        let (status, _) = send(
            &app,
            Method::POST,
            "/topics/etch/chat",
            Some(&session),
            Some(json!({ "question": "  " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
