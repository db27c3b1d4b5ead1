use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::instrument::Instrument;

pub type QuestionId = u32;

/// A single questionnaire item. Answers are on a 1..=5 scale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub is_reversed: bool,
}

impl Question {
    /// Whether this question feeds the given category key.
    pub fn belongs_to(&self, category_key: &str) -> bool {
        self.category == category_key || self.subcategory.as_deref() == Some(category_key)
    }
}

/// Immutable, ordered question catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionCatalog {
    questions: Vec<Question>,
}

impl QuestionCatalog {
    /// Build a catalog, rejecting duplicate question ids.
    pub fn new(questions: Vec<Question>) -> Result<Self, CoreError> {
        let mut seen = HashSet::with_capacity(questions.len());
        for q in &questions {
            if !seen.insert(q.id) {
                return Err(CoreError::DuplicateQuestion(q.id));
            }
        }
        Ok(Self { questions })
    }

    pub fn from_json_str(json: &str) -> Result<Self, CoreError> {
        let questions: Vec<Question> = serde_json::from_str(json)?;
        Self::new(questions)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// The subset of questions that feed any category of `instrument`, in catalog order.
    pub fn for_instrument(&self, instrument: Instrument) -> Vec<&Question> {
        let cats = instrument.categories();
        self.questions
            .iter()
            .filter(|q| cats.iter().any(|c| q.belongs_to(c)))
            .collect()
    }
}

impl AsRef<[Question]> for QuestionCatalog {
    fn as_ref(&self) -> &[Question] {
        &self.questions
    }
}

/// Sparse mapping from question id to a raw answer. `None` and a missing key
/// both mean "unanswered".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerSet {
    answers: BTreeMap<QuestionId, Option<i64>>,
}

impl AnswerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Record an answer for a question.
    pub fn insert(&mut self, id: QuestionId, value: i64) {
        self.answers.insert(id, Some(value));
    }

    /// Explicitly mark a question as unanswered.
    pub fn clear(&mut self, id: QuestionId) {
        self.answers.insert(id, None);
    }

    pub fn get(&self, id: QuestionId) -> Option<i64> {
        self.answers.get(&id).copied().flatten()
    }

    pub fn is_answered(&self, id: QuestionId) -> bool {
        self.get(id).is_some()
    }

    /// Number of non-null answers.
    pub fn answered_count(&self) -> usize {
        self.answers.values().filter(|v| v.is_some()).count()
    }
}

impl FromIterator<(QuestionId, i64)> for AnswerSet {
    fn from_iter<I: IntoIterator<Item = (QuestionId, i64)>>(iter: I) -> Self {
        Self {
            answers: iter.into_iter().map(|(id, v)| (id, Some(v))).collect(),
        }
    }
}
