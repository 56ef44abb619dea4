//! Interview report types and serialization.
//!
//! The JSON layout matches the downloadable report: `timestamp`, `questions`,
//! `answers`, `evaluations`, `scores` and `average_score`.

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::evaluator::ParsedScore;
use crate::session::Session;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Final summary of a completed session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub timestamp: String,
    pub questions: Vec<String>,
    pub answers: Vec<String>,
    pub evaluations: Vec<String>,
    pub scores: Vec<String>,
    pub average_score: String,
}

impl Report {
    /// Project a session into a report stamped with `now`.
    pub fn from_session<Tz>(session: &Session, now: &DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let scores: Vec<String> = session
            .evaluations()
            .iter()
            .map(|e| e.score.clone())
            .collect();

        Self {
            timestamp: now.format(TIMESTAMP_FORMAT).to_string(),
            questions: session.questions().to_vec(),
            answers: session.answers().to_vec(),
            evaluations: session
                .evaluations()
                .iter()
                .map(|e| e.evaluation.clone())
                .collect(),
            average_score: format_average(average_score(&scores)),
            scores,
        }
    }

    /// Pretty JSON with four-space indentation.
    pub fn to_json(&self) -> anyhow::Result<String> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.serialize(&mut serializer)?;
        Ok(String::from_utf8(out)?)
    }

    /// Summary view with per-question detail.
    pub fn summary(&self) -> ReportSummary {
        let items = self
            .questions
            .iter()
            .enumerate()
            .map(|(i, question)| ReportItem {
                number: i + 1,
                question: question.clone(),
                answer: self.answers.get(i).cloned().unwrap_or_default(),
                evaluation: self.evaluations.get(i).cloned().unwrap_or_default(),
                score: self.scores.get(i).cloned().unwrap_or_default(),
            })
            .collect();

        ReportSummary {
            timestamp: self.timestamp.clone(),
            total_questions: self.questions.len(),
            average_score: self.average_score.clone(),
            completion: completion(self.answers.len(), self.questions.len()),
            items,
        }
    }
}

/// Download file name for a report generated at `now`.
pub fn file_name<Tz>(now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!("interview_report_{}.json", now.format(FILE_TIMESTAMP_FORMAT))
}

/// Mean of all scores, counting unparseable ones as zero. Empty is zero.
pub fn average_score<S: AsRef<str>>(scores: &[S]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let total: f64 = scores
        .iter()
        .map(|s| ParsedScore::parse(s.as_ref()).value_or_zero())
        .sum();
    total / scores.len() as f64
}

pub fn format_average(average: f64) -> String {
    format!("{average:.1}/10")
}

fn completion(answered: usize, total: usize) -> String {
    if total == 0 {
        return "0%".to_string();
    }
    format!("{}%", answered * 100 / total)
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub timestamp: String,
    pub total_questions: usize,
    pub average_score: String,
    pub completion: String,
    pub items: Vec<ReportItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportItem {
    pub number: usize,
    pub question: String,
    pub answer: String,
    pub evaluation: String,
    pub score: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::Evaluation;
    use crate::gemini::ApiKey;
    use chrono::{NaiveDate, Utc};

    fn fixed_time() -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(2026, 3, 14)
            .unwrap()
            .and_hms_opt(9, 26, 53)
            .unwrap()
            .and_utc()
    }

    fn completed_session(scores: &[&str]) -> Session {
        let questions = (1..=scores.len()).map(|i| format!("Q{i}")).collect();
        let mut session = Session::new(ApiKey::new("key"));
        session.begin_interview("resume".into(), "job".into(), questions);
        for (i, score) in scores.iter().enumerate() {
            session.record_answer(
                format!("A{}", i + 1),
                Evaluation {
                    score: score.to_string(),
                    evaluation: format!("Score: {score}\nFeedback: fine"),
                },
            );
        }
        session
    }

    #[test]
    fn test_average_counts_unparseable_as_zero() {
        let avg = average_score(&["8/10", "N/A", "6/10"]);
        assert!((avg - 14.0 / 3.0).abs() < 1e-9);
        assert_eq!(format_average(avg), "4.7/10");
    }

    #[test]
    fn test_average_of_nothing_is_zero() {
        let empty: [&str; 0] = [];
        assert_eq!(average_score(&empty), 0.0);
        assert_eq!(format_average(0.0), "0.0/10");
    }

    #[test]
    fn test_average_matches_manual_mean() {
        let cases: [&[&str]; 4] = [
            &["10/10"],
            &["7.5/10", "8.5/10"],
            &["garbage", "also garbage"],
            &["3", "4/10", "x/10", "9.25/10"],
        ];
        for scores in cases {
            let expected: f64 = scores
                .iter()
                .map(|s| s.split('/').next().unwrap().trim().parse::<f64>().unwrap_or(0.0))
                .sum::<f64>()
                / scores.len() as f64;
            assert!((average_score(scores) - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_from_session() {
        let session = completed_session(&["8/10", "N/A", "6/10"]);
        let report = Report::from_session(&session, &fixed_time());

        assert_eq!(report.timestamp, "2026-03-14 09:26:53");
        assert_eq!(report.questions, vec!["Q1", "Q2", "Q3"]);
        assert_eq!(report.answers, vec!["A1", "A2", "A3"]);
        assert_eq!(report.scores, vec!["8/10", "N/A", "6/10"]);
        assert_eq!(report.evaluations[1], "Score: N/A\nFeedback: fine");
        assert_eq!(report.average_score, "4.7/10");
    }

    #[test]
    fn test_json_round_trip() {
        let session = completed_session(&["9/10", "5.5/10", "N/A", "7/10"]);
        let report = Report::from_session(&session, &fixed_time());

        let json = report.to_json().unwrap();
        assert!(json.contains("\n    \"timestamp\": \"2026-03-14 09:26:53\""));

        let parsed: Report = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report);
        assert_eq!(format_average(average_score(&parsed.scores)), report.average_score);
    }

    #[test]
    fn test_json_field_names() {
        let report = Report::from_session(&completed_session(&["8/10"]), &fixed_time());
        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        let mut keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort();
        assert_eq!(
            keys,
            vec!["answers", "average_score", "evaluations", "questions", "scores", "timestamp"]
        );
    }

    #[test]
    fn test_file_name() {
        assert_eq!(
            file_name(&fixed_time()),
            "interview_report_20260314_092653.json"
        );
    }

    #[test]
    fn test_summary() {
        let report = Report::from_session(&completed_session(&["8/10", "6/10"]), &fixed_time());
        let summary = report.summary();
        assert_eq!(summary.total_questions, 2);
        assert_eq!(summary.average_score, "7.0/10");
        assert_eq!(summary.completion, "100%");
        assert_eq!(summary.items[1].number, 2);
        assert_eq!(summary.items[1].answer, "A2");
        assert_eq!(summary.items[1].score, "6/10");
    }
}
