use serde::Serialize;

use super::model::{DailyContent, Section, SessionQuestion};
use crate::error::AppError;

pub const XP_FIRST_TRY: i64 = 10;
pub const XP_SECOND_TRY: i64 = 5;
pub const XP_LATER_TRY: i64 = 2;

/// XP for a correct answer given how many times the question was tried before.
pub fn xp_for_attempts(prior_attempts: u32) -> i64 {
    match prior_attempts {
        0 => XP_FIRST_TRY,
        1 => XP_SECOND_TRY,
        _ => XP_LATER_TRY,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cursor {
    pub section: Section,
    pub question_index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnswerOutcome {
    Correct {
        xp_awarded: i64,
        attempts: u32,
        next: Option<Cursor>,
        /// True only on the answer that finished the last open section.
        session_completed: bool,
    },
    Incorrect {
        attempts: u32,
        wrong_explanation: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionProgress {
    pub section: Section,
    pub total: usize,
    pub solved: usize,
    pub complete: bool,
}

/// Walks a day's four sections question by question.
///
/// The cursor is derived from the answer state stored in the content, so a
/// sequencer rebuilt from a persisted session picks up where the student
/// left off.
#[derive(Debug, Clone)]
pub struct QuizSequencer {
    content: DailyContent,
    cursor: Option<Cursor>,
}

impl QuizSequencer {
    pub fn resume(content: DailyContent) -> Self {
        let cursor = positions(&content)
            .find(|(_, solved)| !solved)
            .map(|(c, _)| c);
        Self { content, cursor }
    }

    pub fn cursor(&self) -> Option<Cursor> {
        self.cursor
    }

    pub fn content(&self) -> &DailyContent {
        &self.content
    }

    pub fn into_content(self) -> DailyContent {
        self.content
    }

    pub fn current_question(&self) -> Option<&SessionQuestion> {
        let cursor = self.cursor?;
        self.content
            .questions(cursor.section)
            .nth(cursor.question_index)
    }

    pub fn is_section_complete(&self, section: Section) -> bool {
        self.content.questions(section).all(SessionQuestion::is_solved)
    }

    pub fn is_complete(&self) -> bool {
        Section::ALL.iter().all(|&s| self.is_section_complete(s))
    }

    pub fn section_progress(&self) -> Vec<SectionProgress> {
        Section::ALL
            .iter()
            .map(|&section| {
                let total = self.content.question_count(section);
                let solved = self
                    .content
                    .questions(section)
                    .filter(|q| q.is_solved())
                    .count();
                SectionProgress {
                    section,
                    total,
                    solved,
                    complete: solved == total,
                }
            })
            .collect()
    }

    /// Answers the question under the cursor with option `choice`.
    pub fn answer(&mut self, choice: usize) -> Result<AnswerOutcome, AppError> {
        let cursor = self
            .cursor
            .ok_or_else(|| AppError::Validation("Session is already complete".to_string()))?;

        let question = self
            .content
            .question_mut(cursor.section, cursor.question_index)
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "Cursor {}#{} points past the section",
                    cursor.section, cursor.question_index
                ))
            })?;

        if choice >= question.options.len() {
            return Err(AppError::Validation(format!(
                "Answer {} is not one of the {} options",
                choice,
                question.options.len()
            )));
        }

        let prior_attempts = question.attempts;
        let is_correct = choice == question.correct_answer;

        question.attempts += 1;
        question.student_answer = Some(choice);
        question.is_correct = Some(is_correct);
        if question.first_try_correct.is_none() {
            question.first_try_correct = Some(is_correct);
        }

        if !is_correct {
            return Ok(AnswerOutcome::Incorrect {
                attempts: question.attempts,
                wrong_explanation: question.wrong_explanation(choice).map(str::to_string),
            });
        }

        let attempts = question.attempts;
        self.cursor = self.next_open_after(cursor);

        Ok(AnswerOutcome::Correct {
            xp_awarded: xp_for_attempts(prior_attempts),
            attempts,
            next: self.cursor,
            session_completed: self.cursor.is_none(),
        })
    }

    /// First unsolved question after `from`, wrapping around to earlier sections.
    fn next_open_after(&self, from: Cursor) -> Option<Cursor> {
        let all: Vec<(Cursor, bool)> = positions(&self.content).collect();
        let start = all.iter().position(|(c, _)| *c == from)?;

        all[start + 1..]
            .iter()
            .chain(all[..start].iter())
            .find(|(_, solved)| !solved)
            .map(|(c, _)| *c)
    }
}

/// Every question position in session order, paired with whether it is solved.
fn positions(content: &DailyContent) -> impl Iterator<Item = (Cursor, bool)> + '_ {
    Section::ALL.into_iter().flat_map(move |section| {
        content
            .questions(section)
            .enumerate()
            .map(move |(question_index, q)| {
                (
                    Cursor {
                        section,
                        question_index,
                    },
                    q.is_solved(),
                )
            })
    })
}
