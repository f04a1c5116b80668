use chrono::NaiveDate;
use serde::Serialize;

use super::model::{DailyContent, Domain, Passage, SessionQuestion};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WrongAnswerNote {
    pub id: String,
    pub session_id: i64,
    pub date: NaiveDate,
    pub domain: Domain,
    pub passage_title: Option<String>,
    pub passage_content: Option<String>,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
    pub student_answer: usize,
    pub explanation: String,
    pub wrong_explanation: Option<String>,
    pub attempts: u32,
}

/// Review notes for every question of a session left answered incorrectly.
pub fn extract_notes(
    session_id: i64,
    date: NaiveDate,
    content: &DailyContent,
) -> Vec<WrongAnswerNote> {
    let from_passages = content.passages.iter().flat_map(|passage| {
        let domain = passage.passage_type.section().domain();
        passage
            .questions
            .iter()
            .filter_map(move |q| note_for(session_id, date, domain, Some(passage), q))
    });

    let from_grammar = content
        .grammar_questions
        .iter()
        .filter_map(|q| note_for(session_id, date, Domain::Grammar, None, q));

    from_passages.chain(from_grammar).collect()
}

fn note_for(
    session_id: i64,
    date: NaiveDate,
    domain: Domain,
    passage: Option<&Passage>,
    question: &SessionQuestion,
) -> Option<WrongAnswerNote> {
    if question.is_correct != Some(false) {
        return None;
    }
    let student_answer = question.student_answer?;

    Some(WrongAnswerNote {
        id: format!("{}-{}", session_id, question.id),
        session_id,
        date,
        domain,
        passage_title: passage.map(|p| p.title.clone()),
        passage_content: passage.map(|p| p.content.clone()),
        question: question.question.clone(),
        options: question.options.clone(),
        correct_answer: question.correct_answer,
        student_answer,
        explanation: question.explanation.clone(),
        wrong_explanation: question.wrong_explanation(student_answer).map(str::to_string),
        attempts: question.attempts,
    })
}
