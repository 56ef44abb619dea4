//! Interview Trainer - resume-driven interview practice server.

mod config;
mod error;
mod evaluator;
mod extract;
mod gemini;
mod questions;
mod report;
mod session;
mod wizard;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use config::AppConfig;
use error::ApiError;
use evaluator::GeminiAnswerEvaluator;
use extract::tesseract::TesseractEngine;
use extract::DocumentExtractor;
use gemini::{ApiKey, GeminiClient};
use questions::{GeminiQuestionGenerator, QuestionCount};
use report::ReportSummary;
use serde::{Deserialize, Serialize};
use session::{Session, SessionStore, SessionView, SharedSession};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;
use wizard::{AnswerOutcome, UploadRequest, UploadedFile, Wizard};

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    sessions: SessionStore,
    wizard: Wizard,
    default_api_key: Option<ApiKey>,
    default_question_count: QuestionCount,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "interview_trainer=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let gemini = GeminiClient::new(&config.gemini)?;
    info!("Gemini client initialized (model: {})", gemini.model());

    let ocr = TesseractEngine::new(&config.ocr);
    info!("OCR engine: {} ({})", config.ocr.tesseract_path, config.ocr.language);

    let wizard = Wizard::new(
        Arc::new(DocumentExtractor::new(Arc::new(ocr))),
        Arc::new(GeminiQuestionGenerator::new(gemini.clone())),
        Arc::new(GeminiAnswerEvaluator::new(gemini)),
    );

    let sessions = SessionStore::new();
    spawn_session_sweeper(sessions.clone(), config.session_ttl);

    let state = AppState {
        sessions,
        wizard,
        default_api_key: config.default_api_key.clone().and_then(ApiKey::new),
        default_question_count: config.default_question_count,
    };

    let app = router(state, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Server listening on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sessions", post(create_session))
        .route("/sessions/:id", get(get_session).delete(delete_session))
        .route("/sessions/:id/credential", put(set_credential))
        .route("/sessions/:id/upload", post(upload_resume))
        .route("/sessions/:id/answers", post(submit_answer))
        .route("/sessions/:id/report", get(get_report))
        .route("/sessions/:id/report/download", get(download_report))
        .route("/sessions/:id/reset", post(reset_session))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Start a new interview session.
async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionView>) {
    let session = Session::new(state.default_api_key.clone());
    let view = session.view();
    state.sessions.insert(session);
    info!("Created session {} ({} live)", view.id, state.sessions.len());
    (StatusCode::CREATED, Json(view))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let shared = find_session(&state, id)?;
    let session = shared.lock().await;
    Ok(Json(session.view()))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.sessions.remove(&id) {
        info!("Deleted session {}", id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::SessionNotFound(id))
    }
}

#[derive(Deserialize)]
struct CredentialBody {
    api_key: String,
}

async fn set_credential(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<CredentialBody>,
) -> Result<Json<SessionView>, ApiError> {
    let api_key = ApiKey::new(body.api_key)
        .ok_or_else(|| ApiError::Validation("api_key must not be empty".to_string()))?;
    let shared = find_session(&state, id)?;
    let mut session = shared.lock().await;
    session.set_api_key(api_key);
    info!("Session {}: credential configured", id);
    Ok(Json(session.view()))
}

/// Upload a resume with the job description and generate questions.
///
/// Multipart fields: `file`, `job_description`, `num_questions`.
async fn upload_resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<SessionView>, ApiError> {
    let shared = find_session(&state, id)?;

    let mut request = UploadRequest {
        question_count: state.default_question_count.get().to_string(),
        ..Default::default()
    };

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("resume").to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await?.to_vec();
                if data.is_empty() {
                    continue;
                }
                info!("Session {}: received file {} ({} bytes)", id, filename, data.len());
                request.file = Some(UploadedFile {
                    filename,
                    content_type,
                    data,
                });
            }
            Some("job_description") => {
                request.job_description = field.text().await?;
            }
            Some("num_questions") => {
                let raw = field.text().await?;
                if !raw.trim().is_empty() {
                    request.question_count = raw;
                }
            }
            _ => {}
        }
    }

    let mut session = shared.lock().await;
    state.wizard.upload(&mut session, request).await?;
    Ok(Json(session.view()))
}

#[derive(Deserialize)]
struct AnswerBody {
    answer: String,
}

#[derive(Serialize)]
struct AnswerResponse {
    #[serde(flatten)]
    outcome: AnswerOutcome,
    session: SessionView,
}

async fn submit_answer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<AnswerBody>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let shared = find_session(&state, id)?;
    let mut session = shared.lock().await;
    let outcome = state.wizard.submit_answer(&mut session, &body.answer).await?;
    Ok(Json(AnswerResponse {
        outcome,
        session: session.view(),
    }))
}

/// Report statistics and per-question feedback.
async fn get_report(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReportSummary>, ApiError> {
    let shared = find_session(&state, id)?;
    let session = shared.lock().await;
    let report = state.wizard.report(&session, &chrono::Local::now())?;
    Ok(Json(report.summary()))
}

/// The report as a downloadable JSON file.
async fn download_report(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let shared = find_session(&state, id)?;
    let session = shared.lock().await;
    let now = chrono::Local::now();
    let report = state.wizard.report(&session, &now)?;
    let body = report.to_json()?;
    let disposition = format!("attachment; filename=\"{}\"", report::file_name(&now));

    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    let shared = find_session(&state, id)?;
    let mut session = shared.lock().await;
    state.wizard.reset(&mut session);
    Ok(Json(session.view()))
}

// ============================================================================
// Helper functions
// ============================================================================

fn find_session(state: &AppState, id: Uuid) -> Result<SharedSession, ApiError> {
    state.sessions.get(&id).ok_or(ApiError::SessionNotFound(id))
}

/// Periodically drop sessions idle for longer than `ttl`.
fn spawn_session_sweeper(sessions: SessionStore, ttl: Duration) {
    let period = (ttl / 4).max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let evicted = sessions.evict_idle(ttl);
            if evicted > 0 {
                info!("Evicted {} idle sessions ({} live)", evicted, sessions.len());
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::pdf::tests::single_page_pdf;
    use crate::wizard::tests::{FakeEvaluator, FakeExtractor, FakeGenerator};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    const BOUNDARY: &str = "interview-boundary";

    fn test_app(api_key: Option<&str>, scores: &[&str]) -> Router {
        let responses: Vec<Option<&str>> = scores.iter().map(|s| Some(*s)).collect();
        let state = AppState {
            sessions: SessionStore::new(),
            wizard: Wizard::new(
                Arc::new(FakeExtractor::returning("Experienced engineer")),
                Arc::new(FakeGenerator::with_lines(5)),
                Arc::new(FakeEvaluator::scripted(&responses)),
            ),
            default_api_key: api_key.and_then(ApiKey::new),
            default_question_count: QuestionCount::new(5).unwrap(),
        };
        router(state, 1024 * 1024)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Response) {
        let response = app.clone().oneshot(request).await.unwrap();
        (response.status(), response)
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn text_part(name: &str, value: &str) -> Vec<u8> {
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        )
        .into_bytes()
    }

    fn file_part(filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
        let mut part = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .into_bytes();
        part.extend_from_slice(data);
        part.extend_from_slice(b"\r\n");
        part
    }

    fn multipart_request(id: &str, parts: Vec<Vec<u8>>) -> Request<Body> {
        let mut body = parts.concat();
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(format!("/sessions/{id}/upload"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn upload_request(id: &str, num_questions: &str) -> Request<Body> {
        multipart_request(
            id,
            vec![
                file_part("cv.pdf", "application/pdf", &single_page_pdf("Experienced engineer")),
                text_part("job_description", "Backend role"),
                text_part("num_questions", num_questions),
            ],
        )
    }

    async fn create(app: &Router) -> String {
        let request = Request::builder()
            .method("POST")
            .uri("/sessions")
            .body(Body::empty())
            .unwrap();
        let (status, response) = send(app, request).await;
        assert_eq!(status, StatusCode::CREATED);
        body_json(response).await["id"].as_str().unwrap().to_string()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_full_flow_over_http() {
        let app = test_app(Some("key"), &["Score: 8/10", "nothing", "Score: 6/10"]);
        let id = create(&app).await;

        let (status, response) = send(&app, upload_request(&id, "3")).await;
        assert_eq!(status, StatusCode::OK);
        let view = body_json(response).await;
        assert_eq!(view["step"], "interview");
        assert_eq!(view["progress"]["total"], 3);
        assert_eq!(view["current_question"]["number"], 1);

        for i in 0..3 {
            let (status, response) = send(
                &app,
                json_request(
                    "POST",
                    &format!("/sessions/{id}/answers"),
                    serde_json::json!({ "answer": format!("answer {i}") }),
                ),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            let body = body_json(response).await;
            assert_eq!(body["session"]["progress"]["answered"], i + 1);
        }

        let (status, response) = send(&app, get_request(&format!("/sessions/{id}/report"))).await;
        assert_eq!(status, StatusCode::OK);
        let summary = body_json(response).await;
        assert_eq!(summary["average_score"], "4.7/10");
        assert_eq!(summary["completion"], "100%");

        let (status, response) =
            send(&app, get_request(&format!("/sessions/{id}/report/download"))).await;
        assert_eq!(status, StatusCode::OK);
        let disposition = response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.starts_with("attachment; filename=\"interview_report_"));
        let report = body_json(response).await;
        assert_eq!(report["scores"], serde_json::json!(["8/10", "N/A", "6/10"]));
        assert_eq!(report["average_score"], "4.7/10");
    }

    #[tokio::test]
    async fn test_upload_without_credential() {
        let app = test_app(None, &[]);
        let id = create(&app).await;

        let (status, response) = send(&app, upload_request(&id, "3")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (_, response) = send(&app, get_request(&format!("/sessions/{id}"))).await;
        assert_eq!(body_json(response).await["step"], "upload");
    }

    #[tokio::test]
    async fn test_credential_then_upload() {
        let app = test_app(None, &[]);
        let id = create(&app).await;

        let (status, response) = send(
            &app,
            json_request(
                "PUT",
                &format!("/sessions/{id}/credential"),
                serde_json::json!({ "api_key": "secret" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let view = body_json(response).await;
        assert_eq!(view["credential_configured"], true);
        assert!(!view.to_string().contains("secret"));

        let (status, _) = send(&app, upload_request(&id, "4")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_invalid_question_count() {
        let app = test_app(Some("key"), &[]);
        let id = create(&app).await;

        for raw in ["lots", "2", "300"] {
            let (status, response) = send(&app, upload_request(&id, raw)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            let message = body_json(response).await["error"]["message"]
                .as_str()
                .unwrap()
                .to_string();
            assert!(message.starts_with("number of questions must be between 3 and 10"));
        }
    }

    #[tokio::test]
    async fn test_missing_num_questions_uses_default() {
        let app = test_app(Some("key"), &[]);
        let id = create(&app).await;
        let request = multipart_request(
            &id,
            vec![
                file_part("cv.pdf", "application/pdf", &single_page_pdf("Experienced engineer")),
                text_part("job_description", "Backend role"),
            ],
        );

        let (status, response) = send(&app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body_json(response).await["progress"]["total"], 5);
    }

    async fn upload_error(
        app: &Router,
        parts: Vec<Vec<u8>>,
        key: Option<&str>,
    ) -> (StatusCode, String) {
        let id = create(app).await;
        if let Some(key) = key {
            let (status, _) = send(
                app,
                json_request(
                    "PUT",
                    &format!("/sessions/{id}/credential"),
                    serde_json::json!({ "api_key": key }),
                ),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, response) = send(app, multipart_request(&id, parts)).await;
        let message = body_json(response).await["error"]["message"]
            .as_str()
            .unwrap()
            .to_string();
        (status, message)
    }

    #[tokio::test]
    async fn test_upload_checks_credential_first() {
        let app = test_app(None, &[]);

        let (status, message) = upload_error(
            &app,
            vec![
                file_part("cv.docx", "application/msword", b"PK\x03\x04"),
                text_part("job_description", "Backend role"),
                text_part("num_questions", "3"),
            ],
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message, "please enter your Gemini API key");

        let (status, message) =
            upload_error(&app, vec![text_part("num_questions", "abc")], None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message, "please enter your Gemini API key");
    }

    #[tokio::test]
    async fn test_upload_check_order_with_credential() {
        let app = test_app(None, &[]);

        let (status, message) = upload_error(
            &app,
            vec![
                text_part("job_description", ""),
                text_part("num_questions", "abc"),
            ],
            Some("key"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message, "please upload your resume");

        let (status, message) = upload_error(
            &app,
            vec![
                file_part("cv.docx", "application/msword", b"PK\x03\x04"),
                text_part("job_description", "  "),
                text_part("num_questions", "300"),
            ],
            Some("key"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message, "please enter a job description");

        let (status, message) = upload_error(
            &app,
            vec![
                file_part("cv.docx", "application/msword", b"PK\x03\x04"),
                text_part("job_description", "Backend role"),
                text_part("num_questions", "300"),
            ],
            Some("key"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message, "number of questions must be between 3 and 10, got \"300\"");

        let (status, message) = upload_error(
            &app,
            vec![
                file_part("cv.docx", "application/msword", b"PK\x03\x04"),
                text_part("job_description", "Backend role"),
                text_part("num_questions", "3"),
            ],
            Some("key"),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(message.contains("unsupported document type: application/msword"));
    }

    #[tokio::test]
    async fn test_report_before_completion_conflicts() {
        let app = test_app(Some("key"), &[]);
        let id = create(&app).await;

        let (status, response) = send(&app, get_request(&format!("/sessions/{id}/report"))).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["error"]["code"], "WRONG_STEP");
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let app = test_app(None, &[]);
        let uri = format!("/sessions/{}", Uuid::new_v4());

        let (status, _) = send(&app, get_request(&uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let request = Request::builder()
            .method("DELETE")
            .uri(&uri)
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_reset_and_delete() {
        let app = test_app(Some("key"), &[]);
        let id = create(&app).await;
        let (status, _) = send(&app, upload_request(&id, "3")).await;
        assert_eq!(status, StatusCode::OK);

        let request = Request::builder()
            .method("POST")
            .uri(format!("/sessions/{id}/reset"))
            .body(Body::empty())
            .unwrap();
        let (status, response) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        let view = body_json(response).await;
        assert_eq!(view["step"], "upload");
        assert_eq!(view["credential_configured"], true);
        assert_eq!(view["progress"]["total"], 0);

        let request = Request::builder()
            .method("DELETE")
            .uri(format!("/sessions/{id}"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
}
