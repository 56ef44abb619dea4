//! The interview wizard: drives a [`Session`] from upload to report.

use std::sync::Arc;

use chrono::{DateTime, TimeZone};
use serde::Serialize;
use std::fmt::Display;
use thiserror::Error;
use tracing::{info, warn};

use crate::error::{ExtractionError, GenerationError};
use crate::evaluator::{AnswerEvaluator, Evaluation, EvaluationContext};
use crate::extract::{Document, TextExtractor};
use crate::questions::{QuestionCount, QuestionGenerator};
use crate::report::Report;
use crate::session::{Session, Step};

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("this action needs the {expected} step, but the session is at {actual}")]
    WrongStep { expected: Step, actual: Step },

    #[error("please enter your Gemini API key")]
    MissingCredential,

    #[error("please upload your resume")]
    MissingResume,

    #[error("please enter a job description")]
    MissingJobDescription,

    #[error(
        "number of questions must be between {min} and {max}, got {0:?}",
        min = QuestionCount::MIN,
        max = QuestionCount::MAX
    )]
    InvalidQuestionCount(String),

    #[error("please provide an answer")]
    EmptyAnswer,

    #[error("failed to extract text from resume: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("failed to generate questions: {0}")]
    Generation(#[from] GenerationError),
}

/// A file as received, before its type is checked.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// Raw inputs collected at the upload step. Validated by [`Wizard::upload`].
#[derive(Debug, Default)]
pub struct UploadRequest {
    pub file: Option<UploadedFile>,
    pub job_description: String,
    pub question_count: String,
}

/// Result of submitting an answer.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerOutcome {
    pub evaluation: Evaluation,
    /// Set when the evaluator failed and a placeholder was recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Runs each step's external calls against the session.
#[derive(Clone)]
pub struct Wizard {
    extractor: Arc<dyn TextExtractor>,
    generator: Arc<dyn QuestionGenerator>,
    evaluator: Arc<dyn AnswerEvaluator>,
}

impl Wizard {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        generator: Arc<dyn QuestionGenerator>,
        evaluator: Arc<dyn AnswerEvaluator>,
    ) -> Self {
        Self {
            extractor,
            generator,
            evaluator,
        }
    }

    /// Extract the resume and generate questions. The session is only changed
    /// (to Interview) when both succeed.
    ///
    /// Checked in order: credential, file, job description, question count,
    /// then the file type.
    pub async fn upload(
        &self,
        session: &mut Session,
        request: UploadRequest,
    ) -> Result<(), WizardError> {
        expect_step(session, Step::Upload)?;

        let api_key = session.api_key().ok_or(WizardError::MissingCredential)?;
        let file = request.file.ok_or(WizardError::MissingResume)?;
        if request.job_description.trim().is_empty() {
            return Err(WizardError::MissingJobDescription);
        }
        let count = QuestionCount::parse(&request.question_count)
            .ok_or(WizardError::InvalidQuestionCount(request.question_count))?;
        let document =
            Document::from_upload(file.filename, file.content_type.as_deref(), file.data)?;

        let resume_text = self.extractor.extract(&document).await?;
        if resume_text.trim().is_empty() {
            return Err(ExtractionError::NoText.into());
        }

        let questions = self
            .generator
            .generate(api_key, &resume_text, &request.job_description, count)
            .await?;
        if questions.is_empty() {
            return Err(GenerationError::NoQuestions.into());
        }

        info!(
            "Session {}: {} questions generated from {}",
            session.id(),
            questions.len(),
            document.filename
        );
        session.begin_interview(resume_text, request.job_description, questions);
        Ok(())
    }

    /// Evaluate and record the answer to the current question.
    ///
    /// An evaluator failure still records the answer, with a placeholder
    /// evaluation, and is reported through [`AnswerOutcome::warning`].
    pub async fn submit_answer(
        &self,
        session: &mut Session,
        answer: &str,
    ) -> Result<AnswerOutcome, WizardError> {
        expect_step(session, Step::Interview)?;
        if answer.trim().is_empty() {
            return Err(WizardError::EmptyAnswer);
        }
        let api_key = session.api_key().ok_or(WizardError::MissingCredential)?;
        let question = session.current_question().ok_or(WizardError::WrongStep {
            expected: Step::Interview,
            actual: session.step(),
        })?;

        let context = EvaluationContext {
            resume_text: session.resume_text(),
            job_description: session.job_description(),
        };

        let (evaluation, warning) = match self
            .evaluator
            .evaluate(api_key, question, answer, context)
            .await
        {
            Ok(evaluation) => (evaluation, None),
            Err(e) => {
                warn!("Session {}: {}", session.id(), e);
                (Evaluation::failed(), Some(e.to_string()))
            }
        };

        let number = session.current_index() + 1;
        session.record_answer(answer.to_string(), evaluation.clone());
        info!(
            "Session {}: question {} scored {} (now at {})",
            session.id(),
            number,
            evaluation.score,
            session.step()
        );

        Ok(AnswerOutcome {
            evaluation,
            warning,
        })
    }

    /// Build the report of a finished session.
    pub fn report<Tz>(&self, session: &Session, now: &DateTime<Tz>) -> Result<Report, WizardError>
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        expect_step(session, Step::Report)?;
        Ok(Report::from_session(session, now))
    }

    /// Start over, keeping only the credential.
    pub fn reset(&self, session: &mut Session) {
        info!("Session {}: reset from {}", session.id(), session.step());
        session.reset();
    }
}

fn expect_step(session: &Session, expected: Step) -> Result<(), WizardError> {
    match (session.step(), expected) {
        (Step::Upload, Step::Upload)
        | (Step::Interview, Step::Interview)
        | (Step::Report, Step::Report) => Ok(()),
        (actual, expected) => Err(WizardError::WrongStep { expected, actual }),
    }
}
