//! Error types for the interview pipeline and the HTTP surface.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::wizard::WizardError;

/// The uploaded resume could not be turned into text.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("unsupported document type: {0} (expected PDF, PNG or JPEG)")]
    UnsupportedType(String),

    #[error("failed to read PDF: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("no text could be extracted from the resume")]
    NoText,

    #[error("extraction task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// The model call for interview questions failed or returned nothing usable.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("question generation request failed: {0}")]
    Request(String),

    #[error("the model returned no questions")]
    NoQuestions,
}

/// The model call for scoring an answer failed.
#[derive(Debug, Error)]
#[error("answer evaluation request failed: {0}")]
pub struct EvaluationError(pub String);

/// HTTP-facing error. Handlers return `Result<T, ApiError>`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("session not found: {0}")]
    SessionNotFound(uuid::Uuid),

    #[error("{0}")]
    Validation(String),

    #[error("invalid upload: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error("{0}")]
    Wizard(#[from] WizardError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::SessionNotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string()),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            ApiError::Multipart(err) => (err.status(), "UPLOAD_ERROR", err.body_text()),
            ApiError::Wizard(err) => {
                let (status, code) = wizard_status(err);
                if status.is_server_error() {
                    tracing::error!("{err}");
                } else {
                    tracing::warn!("{err}");
                }
                (status, code, err.to_string())
            }
            ApiError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

fn wizard_status(err: &WizardError) -> (StatusCode, &'static str) {
    match err {
        WizardError::WrongStep { .. } => (StatusCode::CONFLICT, "WRONG_STEP"),
        WizardError::MissingCredential
        | WizardError::MissingResume
        | WizardError::MissingJobDescription
        | WizardError::InvalidQuestionCount(_)
        | WizardError::EmptyAnswer => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        WizardError::Extraction(ExtractionError::Task(_)) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
        }
        WizardError::Extraction(_) => (StatusCode::UNPROCESSABLE_ENTITY, "EXTRACTION_ERROR"),
        WizardError::Generation(_) => (StatusCode::BAD_GATEWAY, "GENERATION_ERROR"),
    }
}
