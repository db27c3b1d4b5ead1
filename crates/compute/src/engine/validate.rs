use serde::{Deserialize, Serialize};
use traitscope_core::{AnswerSet, Question, QuestionId};

/// Completeness of an answer set against a question catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    /// Unanswered question ids, in catalog order.
    pub missing_question_ids: Vec<QuestionId>,
    pub total_questions: usize,
    pub answered_questions: usize,
}

/// Single pass over `questions`; a null or absent answer counts as missing.
pub fn validate_answers(answers: &AnswerSet, questions: &[Question]) -> ValidationResult {
    let mut missing_question_ids = Vec::new();
    let mut answered_questions = 0;

    for question in questions {
        if answers.is_answered(question.id) {
            answered_questions += 1;
        } else {
            missing_question_ids.push(question.id);
        }
    }

    ValidationResult {
        is_valid: missing_question_ids.is_empty(),
        missing_question_ids,
        total_questions: questions.len(),
        answered_questions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(ids: &[QuestionId]) -> Vec<Question> {
        ids.iter()
            .map(|&id| Question {
                id,
                text: String::new(),
                category: "social".to_string(),
                subcategory: None,
                is_reversed: false,
            })
            .collect()
    }

    #[test]
    fn complete_answers_are_valid() {
        let questions = catalog(&[1, 2, 3]);
        let answers: AnswerSet = [(1, 1), (2, 2), (3, 3)].into_iter().collect();
        let result = validate_answers(&answers, &questions);
        assert!(result.is_valid);
        assert!(result.missing_question_ids.is_empty());
        assert_eq!(result.answered_questions, 3);
    }

    #[test]
    fn missing_ids_follow_catalog_order() {
        let questions = catalog(&[9, 4, 7, 1]);
        let mut answers = AnswerSet::new();
        answers.insert(4, 3);
        answers.clear(1);
        let result = validate_answers(&answers, &questions);
        assert!(!result.is_valid);
        assert_eq!(result.missing_question_ids, vec![9, 7, 1]);
        assert_eq!(result.answered_questions + result.missing_question_ids.len(), result.total_questions);
    }

    #[test]
    fn answers_outside_catalog_are_ignored() {
        let questions = catalog(&[1]);
        let answers: AnswerSet = [(1, 5), (99, 5)].into_iter().collect();
        let result = validate_answers(&answers, &questions);
        assert_eq!(result.total_questions, 1);
        assert_eq!(result.answered_questions, 1);
    }

    #[test]
    fn validation_is_pure() {
        let questions = catalog(&[1, 2]);
        let answers: AnswerSet = [(2, 4)].into_iter().collect();
        assert_eq!(validate_answers(&answers, &questions), validate_answers(&answers, &questions));
    }

    #[test]
    fn serializes_camel_case() {
        let result = validate_answers(&AnswerSet::new(), &catalog(&[5]));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["isValid"], false);
        assert_eq!(json["missingQuestionIds"][0], 5);
    }
}
