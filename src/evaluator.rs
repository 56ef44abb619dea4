//! Answer evaluation and score parsing.

use serde::Serialize;
use tracing::{debug, info};

use crate::error::EvaluationError;
use crate::gemini::{ApiKey, GeminiClient};

/// Resume and job description are cut to this many characters in the prompt.
pub const CONTEXT_CHARS: usize = 500;

pub const UNSCORED: &str = "N/A";
const FAILED_EVALUATION: &str = "Error in evaluation";

/// Scored feedback for one answered question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    /// Usually `"<number>/10"`, or `"N/A"` when the model gave no score line.
    pub score: String,
    /// Full model response.
    pub evaluation: String,
}

impl Evaluation {
    /// Build an evaluation from raw model output.
    pub fn from_response(response: &str) -> Self {
        let evaluation = response.trim().to_string();
        let score = extract_score(&evaluation).unwrap_or_else(|| UNSCORED.to_string());
        Self { score, evaluation }
    }

    /// Placeholder recorded when the model call fails.
    pub fn failed() -> Self {
        Self {
            score: UNSCORED.to_string(),
            evaluation: FAILED_EVALUATION.to_string(),
        }
    }
}

/// Result of reading a score string.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParsedScore {
    Numeric(f64),
    Unparseable,
}

impl ParsedScore {
    /// Reads the number before the first `/` (`"7.5/10"` is 7.5, `"8"` is 8).
    pub fn parse(score: &str) -> Self {
        let numerator = score.split('/').next().unwrap_or_default().trim();
        match numerator.parse::<f64>() {
            Ok(value) if value.is_finite() => Self::Numeric(value),
            _ => Self::Unparseable,
        }
    }

    /// Value used for averaging; an unparseable score counts as zero.
    pub fn value_or_zero(self) -> f64 {
        match self {
            Self::Numeric(value) => value,
            Self::Unparseable => 0.0,
        }
    }
}

/// Text after `Score:` on the first line that has it.
pub fn extract_score(evaluation: &str) -> Option<String> {
    let line = evaluation.lines().find(|line| line.contains("Score:"))?;
    let (_, rest) = line.split_once("Score:")?;
    Some(rest.trim().trim_matches('*').trim().to_string())
}

/// Context handed to the evaluator alongside the question and answer.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    pub resume_text: &'a str,
    pub job_description: &'a str,
}

#[async_trait::async_trait]
pub trait AnswerEvaluator: Send + Sync {
    async fn evaluate(
        &self,
        api_key: &ApiKey,
        question: &str,
        answer: &str,
        context: EvaluationContext<'_>,
    ) -> Result<Evaluation, EvaluationError>;
}

pub struct GeminiAnswerEvaluator {
    client: GeminiClient,
}

impl GeminiAnswerEvaluator {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl AnswerEvaluator for GeminiAnswerEvaluator {
    async fn evaluate(
        &self,
        api_key: &ApiKey,
        question: &str,
        answer: &str,
        context: EvaluationContext<'_>,
    ) -> Result<Evaluation, EvaluationError> {
        let prompt = evaluation_prompt(question, answer, context);
        debug!("Requesting evaluation from {}", self.client.model());

        let response = self
            .client
            .generate(api_key, &prompt)
            .await
            .map_err(|e| EvaluationError(format!("{e:#}")))?;
        if response.is_empty() {
            return Err(EvaluationError(format!(
                "{} returned an empty evaluation",
                self.client.model()
            )));
        }

        let evaluation = Evaluation::from_response(&response);
        info!("Answer scored {}", evaluation.score);
        Ok(evaluation)
    }
}

pub fn evaluation_prompt(question: &str, answer: &str, context: EvaluationContext<'_>) -> String {
    let resume = truncate_chars(context.resume_text, CONTEXT_CHARS);
    let job = truncate_chars(context.job_description, CONTEXT_CHARS);
    format!(
        r#"Evaluate the following interview answer:

Question: {question}
Answer: {answer}

Resume Context:
{resume}

Job Description Context:
{job}

Provide:
1. Score out of 10
2. Detailed feedback on the answer
3. Suggestions for improvement

Format your response as:
Score: [number]/10
Feedback: [detailed feedback]
Suggestions: [improvement suggestions]"#
    )
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
