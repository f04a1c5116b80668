use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Quiz sections in the order a daily session walks through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Nonfiction,
    Fiction,
    Poetry,
    Grammar,
}

impl Section {
    pub const ALL: [Section; 4] = [
        Section::Nonfiction,
        Section::Fiction,
        Section::Poetry,
        Section::Grammar,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Nonfiction => "nonfiction",
            Section::Fiction => "fiction",
            Section::Poetry => "poetry",
            Section::Grammar => "grammar",
        }
    }

    pub fn domain(&self) -> Domain {
        match self {
            Section::Nonfiction => Domain::Reading,
            Section::Fiction | Section::Poetry => Domain::Literature,
            Section::Grammar => Domain::Grammar,
        }
    }

    pub fn next(&self) -> Option<Section> {
        let position = Section::ALL.iter().position(|s| s == self)?;
        Section::ALL.get(position + 1).copied()
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Subject area a wrong-answer note is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Reading,
    Literature,
    Grammar,
}

/// Kind of passage as stored in `passages_data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassageType {
    Nonfiction,
    Fiction,
    Poetry,
}

impl PassageType {
    pub fn section(&self) -> Section {
        match self {
            PassageType::Nonfiction => Section::Nonfiction,
            PassageType::Fiction => Section::Fiction,
            PassageType::Poetry => Section::Poetry,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionQuestion {
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
    #[serde(default)]
    pub explanation: String,
    /// One entry per option; the entry at the correct index is usually empty.
    #[serde(default)]
    pub wrong_explanations: Vec<String>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub student_answer: Option<usize>,
    #[serde(default)]
    pub is_correct: Option<bool>,
    /// Set on the first answer and never changed afterwards.
    #[serde(default)]
    pub first_try_correct: Option<bool>,
}

impl SessionQuestion {
    pub fn new(
        id: impl Into<String>,
        question: impl Into<String>,
        options: Vec<String>,
        correct_answer: usize,
        explanation: impl Into<String>,
        wrong_explanations: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            question: question.into(),
            options,
            correct_answer,
            explanation: explanation.into(),
            wrong_explanations,
            attempts: 0,
            student_answer: None,
            is_correct: None,
            first_try_correct: None,
        }
    }

    pub fn is_solved(&self) -> bool {
        self.is_correct == Some(true)
    }

    pub fn wrong_explanation(&self, choice: usize) -> Option<&str> {
        self.wrong_explanations
            .get(choice)
            .map(String::as_str)
            .filter(|text| !text.is_empty())
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.options.len() < 2 {
            return Err(AppError::Validation(format!(
                "Question {} has fewer than two options",
                self.id
            )));
        }
        if self.correct_answer >= self.options.len() {
            return Err(AppError::Validation(format!(
                "Question {} has correct answer {} outside {} options",
                self.id,
                self.correct_answer,
                self.options.len()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Passage {
    pub id: String,
    #[serde(rename = "type")]
    pub passage_type: PassageType,
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    pub content: String,
    pub questions: Vec<SessionQuestion>,
}

/// Question material for one day: the passages plus the standalone grammar list.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyContent {
    pub passages: Vec<Passage>,
    pub grammar_questions: Vec<SessionQuestion>,
}

impl DailyContent {
    /// Parses the two JSON columns of a stored session row.
    pub fn from_json(passages_data: &str, grammar_questions_data: &str) -> Result<Self, AppError> {
        let passages = parse_json_column(passages_data)?;
        let grammar_questions = parse_json_column(grammar_questions_data)?;
        Ok(Self {
            passages,
            grammar_questions,
        })
    }

    pub fn passages_json(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string(&self.passages)?)
    }

    pub fn grammar_questions_json(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string(&self.grammar_questions)?)
    }

    /// Fresh content must populate every section with answerable questions.
    pub fn validate(&self) -> Result<(), AppError> {
        for section in Section::ALL {
            if self.questions(section).next().is_none() {
                return Err(AppError::Validation(format!(
                    "Section {} has no questions",
                    section
                )));
            }
        }

        self.all_questions().try_for_each(SessionQuestion::validate)
    }

    pub fn questions(&self, section: Section) -> Box<dyn Iterator<Item = &SessionQuestion> + '_> {
        match section {
            Section::Grammar => Box::new(self.grammar_questions.iter()),
            _ => Box::new(
                self.passages
                    .iter()
                    .filter(move |p| p.passage_type.section() == section)
                    .flat_map(|p| p.questions.iter()),
            ),
        }
    }

    pub fn question_mut(&mut self, section: Section, index: usize) -> Option<&mut SessionQuestion> {
        match section {
            Section::Grammar => self.grammar_questions.get_mut(index),
            _ => self
                .passages
                .iter_mut()
                .filter(|p| p.passage_type.section() == section)
                .flat_map(|p| p.questions.iter_mut())
                .nth(index),
        }
    }

    pub fn question_count(&self, section: Section) -> usize {
        self.questions(section).count()
    }

    pub fn all_questions(&self) -> impl Iterator<Item = &SessionQuestion> {
        self.passages
            .iter()
            .flat_map(|p| p.questions.iter())
            .chain(self.grammar_questions.iter())
    }

    /// Clears answer state so stored content can be replayed from scratch.
    pub fn reset_progress(&mut self) {
        let questions = self
            .passages
            .iter_mut()
            .flat_map(|p| p.questions.iter_mut())
            .chain(self.grammar_questions.iter_mut());
        for question in questions {
            question.attempts = 0;
            question.student_answer = None;
            question.is_correct = None;
            question.first_try_correct = None;
        }
    }
}

fn parse_json_column<T: serde::de::DeserializeOwned>(raw: &str) -> Result<Vec<T>, AppError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(raw)?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::NotStarted => "not_started",
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
        }
    }

    /// Unknown strings are read as `not_started`.
    pub fn parse(s: &str) -> Self {
        match s {
            "in_progress" => SessionStatus::InProgress,
            "completed" => SessionStatus::Completed,
            _ => SessionStatus::NotStarted,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
