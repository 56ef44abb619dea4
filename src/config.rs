//! Service configuration.
//!
//! Values come from the process environment (a `.env` file is loaded first if
//! present). Everything has a default; the model credential is normally
//! supplied per session rather than here.

use anyhow::{Context, Result};
use std::str::FromStr;
use std::time::Duration;

use crate::questions::QuestionCount;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub gemini: GeminiConfig,
    pub ocr: OcrConfig,
    /// Used when an upload does not say how many questions it wants.
    pub default_question_count: QuestionCount,
    pub max_upload_bytes: usize,
    /// Sessions unused for this long are dropped.
    pub session_ttl: Duration,
    /// Credential copied into every new session, if set.
    pub default_api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_url: String,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub tesseract_path: String,
    pub language: String,
    pub timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| -> String {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let question_count: u8 = parse_var(&lookup, "DEFAULT_QUESTION_COUNT", 5)?;
        let default_question_count = QuestionCount::new(question_count).with_context(|| {
            format!(
                "DEFAULT_QUESTION_COUNT must be between {} and {}",
                QuestionCount::MIN,
                QuestionCount::MAX
            )
        })?;

        let max_upload_mb: usize = parse_var(&lookup, "MAX_UPLOAD_MB", 20)?;

        let session_ttl_secs: u64 = parse_var(&lookup, "SESSION_TTL_SECS", 3600)?;
        if session_ttl_secs == 0 {
            anyhow::bail!("SESSION_TTL_SECS must be greater than zero");
        }

        Ok(Self {
            bind_addr: get("BIND_ADDR", DEFAULT_BIND_ADDR),
            gemini: GeminiConfig {
                api_url: get("GEMINI_API_URL", DEFAULT_GEMINI_API_URL)
                    .trim_end_matches('/')
                    .to_string(),
                model: get("GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
                timeout: Duration::from_secs(parse_var(&lookup, "GEMINI_TIMEOUT_SECS", 120)?),
            },
            ocr: OcrConfig {
                tesseract_path: get("TESSERACT_PATH", "tesseract"),
                language: get("OCR_LANGUAGE", "eng"),
                timeout: Duration::from_secs(parse_var(&lookup, "OCR_TIMEOUT_SECS", 60)?),
            },
            default_question_count,
            max_upload_bytes: max_upload_mb * 1024 * 1024,
            session_ttl: Duration::from_secs(session_ttl_secs),
            default_api_key: lookup("GEMINI_API_KEY").filter(|v| !v.trim().is_empty()),
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        _ => Ok(default),
    }
}
