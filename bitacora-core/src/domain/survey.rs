//! Satisfaction survey and grade computation

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MIN_ANSWER: u8 = 1;
pub const MAX_ANSWER: u8 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Survey {
    pub id: Uuid,
    pub title: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Survey {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            active: true,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub survey_id: Uuid,
    pub text: String,
    pub position: i32,
    pub active: bool,
}

impl Question {
    pub fn new(survey_id: Uuid, text: impl Into<String>, position: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            survey_id,
            text: text.into(),
            position,
            active: true,
        }
    }
}

/// The active survey together with its active questions, in order
#[derive(Debug, Clone, Serialize)]
pub struct ActiveSurvey {
    pub survey: Survey,
    pub questions: Vec<Question>,
}

/// Answers keyed by question id
pub type Answers = BTreeMap<Uuid, u8>;

/// Mean of the answers and the 0-10 grade derived from it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GradeResult {
    pub mean: Decimal,
    pub grade: u8,
}

/// `grade = round(mean * 2)`, halves rounded away from zero
///
/// Returns None for an empty answer set.
pub fn compute_grade(values: &[u8]) -> Option<GradeResult> {
    if values.is_empty() {
        return None;
    }
    let sum: u32 = values.iter().map(|v| *v as u32).sum();
    let count = values.len() as u32;
    let mean = Decimal::from(sum) / Decimal::from(count);
    // round(2 * sum / count) for non-negative values, in integers
    let grade = ((4 * sum + count) / (2 * count)) as u8;
    Some(GradeResult {
        mean: mean.round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero).normalize(),
        grade,
    })
}

/// Check that `answers` covers exactly the active questions with 1..=5 values
pub fn check_answers(survey: &ActiveSurvey, answers: &Answers) -> Result<(), String> {
    if survey.questions.is_empty() {
        return Err("active survey has no questions".to_string());
    }

    let expected: HashSet<Uuid> = survey.questions.iter().map(|q| q.id).collect();
    let missing = expected.iter().filter(|id| !answers.contains_key(*id)).count();
    if missing > 0 {
        return Err(format!("{} question(s) left unanswered", missing));
    }
    if let Some(unknown) = answers.keys().find(|id| !expected.contains(*id)) {
        return Err(format!("question {} is not part of the active survey", unknown));
    }
    if let Some((id, value)) = answers
        .iter()
        .find(|(_, v)| !(MIN_ANSWER..=MAX_ANSWER).contains(*v))
    {
        return Err(format!(
            "answer {} for question {} is outside {}..={}",
            value, id, MIN_ANSWER, MAX_ANSWER
        ));
    }
    Ok(())
}
