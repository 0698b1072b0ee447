use crate::utils::error::{Result, TeacherError};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_TOPIC: &str = "General";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Beginner, Level::Intermediate, Level::Advanced];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Beginner => "beginner",
            Level::Intermediate => "intermediate",
            Level::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = TeacherError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(Level::Beginner),
            "intermediate" => Ok(Level::Intermediate),
            "advanced" => Ok(Level::Advanced),
            other => Err(TeacherError::InvalidParameterError {
                field: "level".to_string(),
                reason: format!(
                    "'{}' is not one of beginner, intermediate, advanced",
                    other
                ),
            }),
        }
    }
}

/// Raw `/api/ai` parameters, from the query string or a POST body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AskRequest {
    pub question: Option<String>,
    pub topic: Option<String>,
    pub level: Option<String>,
}

impl AskRequest {
    pub fn into_lesson_request(self) -> Result<LessonRequest> {
        let question = self
            .question
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| TeacherError::MissingParameterError {
                field: "question".to_string(),
            })?;

        // 空字串視同未提供
        let topic = self
            .topic
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TOPIC.to_string());

        let level = match self.level.filter(|l| !l.trim().is_empty()) {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!("Unknown level '{}', using {}", raw, Level::default());
                Level::default()
            }),
            None => Level::default(),
        };

        Ok(LessonRequest {
            question,
            topic,
            level,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonRequest {
    pub question: String,
    pub topic: String,
    pub level: Level,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum BoardKind {
    Formula,
    Code,
    Diagram,
    #[default]
    Text,
    List,
}

impl From<String> for BoardKind {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "formula" => BoardKind::Formula,
            "code" => BoardKind::Code,
            "diagram" => BoardKind::Diagram,
            "list" => BoardKind::List,
            _ => BoardKind::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BoardContent {
    #[serde(rename = "type")]
    pub kind: BoardKind,
    /// `list` boards sometimes arrive as an array; items are joined by newlines.
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "text_or_lines"
    )]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagram: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// The structured answer rendered on the board.
///
/// Every field tolerates `null` or absence; models routinely leave parts out.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Lesson {
    #[serde(deserialize_with = "null_as_default")]
    pub topic: String,
    #[serde(deserialize_with = "null_as_default")]
    pub subject: String,
    #[serde(deserialize_with = "null_as_default")]
    pub explanation: String,
    #[serde(deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(deserialize_with = "null_as_default")]
    pub steps: Vec<String>,
    pub board_content: Option<BoardContent>,
    #[serde(deserialize_with = "null_as_default")]
    pub examples: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub key_points: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub next_topics: Vec<String>,
}

impl Lesson {
    /// Canned answer served when the model output cannot be repaired.
    pub fn fallback() -> Self {
        Self {
            topic: "General".to_string(),
            subject: "Educational Content".to_string(),
            explanation: "I apologize, but there was an issue processing the AI response. Please try asking your question again, perhaps with simpler wording.".to_string(),
            content: "Error in response processing".to_string(),
            steps: vec![
                "Please try your question again".to_string(),
                "Use simpler language".to_string(),
                "Check your internet connection".to_string(),
            ],
            board_content: Some(BoardContent {
                kind: BoardKind::Text,
                content: Some("Please try asking your question again".to_string()),
                ..BoardContent::default()
            }),
            examples: vec![
                "Try rephrasing your question".to_string(),
                "Ask a simpler version".to_string(),
            ],
            key_points: vec!["Response processing error occurred".to_string()],
            next_topics: vec!["Try asking again".to_string()],
        }
    }

    /// 語音朗讀用的文字
    pub fn spoken_text(&self) -> &str {
        if !self.explanation.is_empty() {
            &self.explanation
        } else if !self.content.is_empty() {
            &self.content
        } else {
            "Response ready."
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn text_or_lines<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Lines(Vec<String>),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(text) => text,
        Raw::Lines(lines) => lines.join("\n"),
    }))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub message: String,
    pub timestamp: String,
}

impl HealthStatus {
    pub fn ok() -> Self {
        Self {
            status: "OK".to_string(),
            message: "All-Rounder AI Teacher Backend is running".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        }
    }
}

/// Generation parameters sent with every upstream request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    pub name: String,
    pub base_url: String,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
    pub request_timeout_seconds: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            name: "gemini-1.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 2048,
            request_timeout_seconds: 45,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    pub max_attempts: usize,
    pub base_delay_ms: u64,
    pub max_jitter_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2000,
            max_jitter_ms: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ask_request_defaults() {
        let request = AskRequest {
            question: Some("What is a prime number?".to_string()),
            topic: None,
            level: Some(String::new()),
        }
        .into_lesson_request()
        .unwrap();

        assert_eq!(request.topic, "General");
        assert_eq!(request.level, Level::Intermediate);
    }

    #[test]
    fn test_ask_request_requires_question() {
        let err = AskRequest {
            question: Some("   ".to_string()),
            ..AskRequest::default()
        }
        .into_lesson_request()
        .unwrap_err();

        assert!(matches!(err, TeacherError::MissingParameterError { ref field } if field == "question"));
    }

    #[test]
    fn test_unknown_level_falls_back_to_intermediate() {
        let request = AskRequest {
            question: Some("What is a limit?".to_string()),
            topic: Some("Mathematics".to_string()),
            level: Some("expert".to_string()),
        }
        .into_lesson_request()
        .unwrap();

        assert_eq!(request.level, Level::Intermediate);
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!("ADVANCED".parse::<Level>().unwrap(), Level::Advanced);
        assert_eq!(" beginner ".parse::<Level>().unwrap(), Level::Beginner);
        assert!("expert".parse::<Level>().is_err());
    }

    #[test]
    fn test_lesson_tolerates_nulls_and_missing_fields() {
        let lesson: Lesson = serde_json::from_value(serde_json::json!({
            "topic": "Physics",
            "explanation": null,
            "steps": ["one"],
            "boardContent": {"type": "formula", "formula": "F = ma", "diagram": null}
        }))
        .unwrap();

        assert_eq!(lesson.topic, "Physics");
        assert_eq!(lesson.explanation, "");
        assert!(lesson.examples.is_empty());
        let board = lesson.board_content.unwrap();
        assert_eq!(board.kind, BoardKind::Formula);
        assert_eq!(board.formula.as_deref(), Some("F = ma"));
        assert_eq!(board.diagram, None);
    }

    #[test]
    fn test_unknown_board_kind_is_text() {
        let board: BoardContent =
            serde_json::from_value(serde_json::json!({"type": "chart"})).unwrap();
        assert_eq!(board.kind, BoardKind::Text);
    }

    #[test]
    fn test_list_board_content_accepts_array() {
        let board: BoardContent = serde_json::from_value(serde_json::json!({
            "type": "list",
            "content": ["Mercury", "Venus"]
        }))
        .unwrap();
        assert_eq!(board.kind, BoardKind::List);
        assert_eq!(board.content.as_deref(), Some("Mercury\nVenus"));
    }

    #[test]
    fn test_fallback_serializes_camel_case() {
        let value = serde_json::to_value(Lesson::fallback()).unwrap();
        assert_eq!(value["subject"], "Educational Content");
        assert_eq!(value["boardContent"]["type"], "text");
        assert!(value["boardContent"].get("formula").is_none());
        assert_eq!(value["keyPoints"][0], "Response processing error occurred");
        assert_eq!(value["nextTopics"][0], "Try asking again");
    }

    #[test]
    fn test_spoken_text_prefers_explanation() {
        let mut lesson = Lesson::default();
        assert_eq!(lesson.spoken_text(), "Response ready.");
        lesson.content = "F = ma".to_string();
        assert_eq!(lesson.spoken_text(), "F = ma");
        lesson.explanation = "Force is mass times acceleration".to_string();
        assert_eq!(lesson.spoken_text(), "Force is mass times acceleration");
    }
}
