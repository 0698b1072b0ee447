use crate::domain::model::{Lesson, Level};
use crate::domain::ports::LessonSource;
use crate::utils::error::{Result, TeacherError};

pub const TEACHERS: [&str; 2] = ["Nanami", "Naoki"];

pub const SUBJECTS: [&str; 13] = [
    "Mathematics",
    "Science",
    "Physics",
    "Chemistry",
    "Biology",
    "Computer Science",
    "History",
    "Geography",
    "Literature",
    "Languages",
    "Philosophy",
    "Economics",
    "General",
];

const DEFAULT_ERROR: &str = "Failed to get response from AI teacher";

/// One answered question.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: usize,
    pub question: String,
    pub subject: String,
    pub level: Level,
    pub answer: Lesson,
}

/// Headless classroom state: who teaches, what subject, and the conversation so far.
#[derive(Debug, Clone)]
pub struct Classroom {
    pub teacher: String,
    pub subject: String,
    pub level: Level,
    pub show_steps: bool,
    pub show_examples: bool,
    pub loading: bool,
    pub error: Option<String>,
    pub messages: Vec<Message>,
    current: Option<usize>,
}

impl Default for Classroom {
    fn default() -> Self {
        Self {
            teacher: TEACHERS[0].to_string(),
            subject: SUBJECTS[0].to_string(),
            level: Level::default(),
            show_steps: true,
            show_examples: true,
            loading: false,
            error: None,
            messages: Vec::new(),
            current: None,
        }
    }
}

impl Classroom {
    pub fn new() -> Self {
        Self::default()
    }

    /// 向老師提問；空白問題直接忽略
    ///
    /// Failures are recorded in `error` rather than returned, so the caller
    /// can keep the classroom running.
    pub async fn ask<S: LessonSource + ?Sized>(&mut self, source: &S, question: &str) -> Option<&Message> {
        let question = question.trim();
        if question.is_empty() {
            return None;
        }

        self.loading = true;
        self.error = None;
        tracing::debug!(
            "Sending request to backend: {} ({}, {})",
            question,
            self.subject,
            self.level
        );

        match source.lesson(question, &self.subject, self.level).await {
            Ok(answer) => {
                let id = self.messages.len();
                self.messages.push(Message {
                    id,
                    question: question.to_string(),
                    subject: self.subject.clone(),
                    level: self.level,
                    answer,
                });
                self.current = Some(id);
                self.loading = false;
                self.messages.last()
            }
            Err(err) => {
                tracing::error!("Error asking AI: {}", err);
                let text = err.to_string();
                self.error = Some(if text.is_empty() {
                    DEFAULT_ERROR.to_string()
                } else {
                    text
                });
                self.loading = false;
                None
            }
        }
    }

    pub fn current(&self) -> Option<&Message> {
        self.current.and_then(|id| self.messages.get(id))
    }

    pub fn set_teacher(&mut self, teacher: &str) -> Result<()> {
        self.teacher = pick("teacher", &TEACHERS, teacher)?;
        Ok(())
    }

    pub fn set_subject(&mut self, subject: &str) -> Result<()> {
        self.subject = pick("subject", &SUBJECTS, subject)?;
        Ok(())
    }

    pub fn set_level(&mut self, level: Level) {
        self.level = level;
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Stop presenting the current message. History is kept.
    pub fn stop(&mut self) {
        self.current = None;
    }
}

fn pick(field: &str, options: &[&str], value: &str) -> Result<String> {
    options
        .iter()
        .find(|o| o.eq_ignore_ascii_case(value.trim()))
        .map(|o| o.to_string())
        .ok_or_else(|| TeacherError::InvalidParameterError {
            field: field.to_string(),
            reason: format!("'{}' is not one of {}", value, options.join(", ")),
        })
}
