//! Interview question generation.

use tracing::{debug, info};

use crate::error::GenerationError;
use crate::gemini::{ApiKey, GeminiClient};

/// Number of questions to ask, always within `MIN..=MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionCount(u8);

impl QuestionCount {
    pub const MIN: u8 = 3;
    pub const MAX: u8 = 10;

    pub fn new(count: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&count).then_some(Self(count))
    }

    /// Parse a user-supplied count such as a form field.
    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse().ok().and_then(Self::new)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

#[async_trait::async_trait]
pub trait QuestionGenerator: Send + Sync {
    /// Return at most `count` non-empty questions.
    async fn generate(
        &self,
        api_key: &ApiKey,
        resume_text: &str,
        job_description: &str,
        count: QuestionCount,
    ) -> Result<Vec<String>, GenerationError>;
}

/// Asks Gemini for a numbered list of questions.
pub struct GeminiQuestionGenerator {
    client: GeminiClient,
}

impl GeminiQuestionGenerator {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl QuestionGenerator for GeminiQuestionGenerator {
    async fn generate(
        &self,
        api_key: &ApiKey,
        resume_text: &str,
        job_description: &str,
        count: QuestionCount,
    ) -> Result<Vec<String>, GenerationError> {
        let prompt = question_prompt(resume_text, job_description, count);
        debug!("Requesting {} questions from {}", count.get(), self.client.model());

        let response = self
            .client
            .generate(api_key, &prompt)
            .await
            .map_err(|e| GenerationError::Request(format!("{e:#}")))?;

        let questions = parse_questions(&response, count);
        if questions.is_empty() {
            return Err(GenerationError::NoQuestions);
        }

        info!("Generated {} of {} requested questions", questions.len(), count.get());
        Ok(questions)
    }
}

pub fn question_prompt(resume_text: &str, job_description: &str, count: QuestionCount) -> String {
    let n = count.get();
    format!(
        r#"Based on the following resume and job description, generate {n} relevant interview questions.

Resume:
{resume_text}

Job Description:
{job_description}

Generate questions that assess:
1. Technical skills relevant to the job
2. Experience mentioned in the resume
3. Problem-solving abilities
4. Cultural fit

Format: Return only the questions, numbered 1 to {n}, one per line."#
    )
}

/// One question per non-blank line, trimmed, capped at `count`.
pub fn parse_questions(response: &str, count: QuestionCount) -> Vec<String> {
    response
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(count.get() as usize)
        .map(str::to_string)
        .collect()
}
