//! Interview session state and the in-memory session registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use crate::evaluator::Evaluation;
use crate::gemini::ApiKey;

/// Where a session is in the interview flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Upload,
    Interview,
    Report,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Upload => "upload",
            Step::Interview => "interview",
            Step::Report => "report",
        };
        f.write_str(name)
    }
}

/// One user's interview run.
///
/// Answers and evaluations are index-aligned with questions and always have
/// the same length, which is also the index of the current question.
/// Fields are only changed through the transition methods below.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    created_at: DateTime<Utc>,
    step: Step,
    api_key: Option<ApiKey>,
    resume_text: String,
    job_description: String,
    questions: Vec<String>,
    answers: Vec<String>,
    evaluations: Vec<Evaluation>,
}

impl Session {
    pub fn new(api_key: Option<ApiKey>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            step: Step::Upload,
            api_key,
            resume_text: String::new(),
            job_description: String::new(),
            questions: Vec::new(),
            answers: Vec::new(),
            evaluations: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn api_key(&self) -> Option<&ApiKey> {
        self.api_key.as_ref()
    }

    pub fn set_api_key(&mut self, api_key: ApiKey) {
        self.api_key = Some(api_key);
    }

    pub fn resume_text(&self) -> &str {
        &self.resume_text
    }

    pub fn job_description(&self) -> &str {
        &self.job_description
    }

    pub fn questions(&self) -> &[String] {
        &self.questions
    }

    pub fn answers(&self) -> &[String] {
        &self.answers
    }

    pub fn evaluations(&self) -> &[Evaluation] {
        &self.evaluations
    }

    /// Index of the next question to answer.
    pub fn current_index(&self) -> usize {
        self.answers.len()
    }

    /// The question awaiting an answer, only while interviewing.
    pub fn current_question(&self) -> Option<&str> {
        match self.step {
            Step::Interview => self.questions.get(self.current_index()).map(String::as_str),
            Step::Upload | Step::Report => None,
        }
    }

    /// Upload -> Interview. Ignores an empty question list.
    pub(crate) fn begin_interview(
        &mut self,
        resume_text: String,
        job_description: String,
        questions: Vec<String>,
    ) {
        if self.step != Step::Upload || questions.is_empty() {
            return;
        }
        self.resume_text = resume_text;
        self.job_description = job_description;
        self.questions = questions;
        self.answers.clear();
        self.evaluations.clear();
        self.step = Step::Interview;
    }

    /// Record the answer to the current question; moves to Report after the
    /// last one. Returns false when there is no current question.
    pub(crate) fn record_answer(&mut self, answer: String, evaluation: Evaluation) -> bool {
        if self.current_question().is_none() {
            return false;
        }
        self.answers.push(answer);
        self.evaluations.push(evaluation);
        if self.answers.len() == self.questions.len() {
            self.step = Step::Report;
        }
        true
    }

    /// Clear everything except the credential and go back to Upload.
    pub(crate) fn reset(&mut self) {
        let api_key = self.api_key.take();
        *self = Self {
            id: self.id,
            created_at: self.created_at,
            ..Self::new(api_key)
        };
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            id: self.id,
            created_at: self.created_at,
            step: self.step,
            credential_configured: self.api_key.is_some(),
            progress: Progress {
                answered: self.answers.len(),
                total: self.questions.len(),
            },
            current_question: self.current_question().map(|text| CurrentQuestion {
                number: self.current_index() + 1,
                total: self.questions.len(),
                text: text.to_string(),
            }),
        }
    }
}

/// What a client sees of a session. Never includes the credential.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub step: Step,
    pub credential_configured: bool,
    pub progress: Progress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_question: Option<CurrentQuestion>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Progress {
    pub answered: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrentQuestion {
    /// 1-based.
    pub number: usize,
    pub total: usize,
    pub text: String,
}

pub type SharedSession = Arc<Mutex<Session>>;

#[derive(Debug)]
struct Entry {
    session: SharedSession,
    last_used: Instant,
}

/// In-memory registry of live sessions.
///
/// Each session has its own async mutex so one user's actions run one at a
/// time while the registry lock is only held for lookups. A lookup counts as
/// use; [`SessionStore::evict_idle`] drops sessions unused for too long.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<Uuid, Entry>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session and return its handle.
    pub fn insert(&self, session: Session) -> SharedSession {
        let id = session.id();
        let shared = Arc::new(Mutex::new(session));
        let mut store = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        store.insert(
            id,
            Entry {
                session: shared.clone(),
                last_used: Instant::now(),
            },
        );
        shared
    }

    pub fn get(&self, id: &Uuid) -> Option<SharedSession> {
        let mut store = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let entry = store.get_mut(id)?;
        entry.last_used = Instant::now();
        Some(entry.session.clone())
    }

    /// Drop a session. Returns true if it existed.
    pub fn remove(&self, id: &Uuid) -> bool {
        let mut store = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        store.remove(id).is_some()
    }

    /// Drop sessions not looked up within `ttl`. Returns how many went.
    pub fn evict_idle(&self, ttl: Duration) -> usize {
        let mut store = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let before = store.len();
        store.retain(|_, entry| entry.last_used.elapsed() < ttl);
        before - store.len()
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
