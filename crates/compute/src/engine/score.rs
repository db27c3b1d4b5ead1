use indexmap::IndexMap;
use traitscope_core::{AnswerSet, Instrument, Question};

/// Normalized category score, always within `0..=100`.
pub type CategoryScore = u8;

/// Category key -> score, one entry per category of an instrument, in list order.
pub type BatteryScores = IndexMap<String, CategoryScore>;

/// Answers live on a 1..=5 scale, so reverse scoring is the involution `6 - x`.
pub fn reverse_answer(answer: i64) -> i64 {
    6i64.saturating_sub(answer)
}

/// Round half away from zero and clamp into `0..=100`.
///
/// Clamping only matters for malformed answers outside 1..=5.
pub fn round_score(value: f64) -> CategoryScore {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as CategoryScore
}

/// Score one category from the answered questions that belong to it.
///
/// A question belongs to `category_key` when either its category or its
/// subcategory matches. Unanswered questions are skipped; a category with
/// no answered questions scores 0.
pub fn category_score(answers: &AnswerSet, questions: &[Question], category_key: &str) -> CategoryScore {
    let mut sum = 0i64;
    let mut count = 0u32;

    for question in questions.iter().filter(|q| q.belongs_to(category_key)) {
        let Some(answer) = answers.get(question.id) else {
            continue;
        };
        // Out-of-scale values count as the nearest end of the scale.
        let answer = answer.clamp(1, 5);
        sum += if question.is_reversed {
            reverse_answer(answer)
        } else {
            answer
        };
        count += 1;
    }

    if count == 0 {
        return 0;
    }

    let average = sum as f64 / count as f64;
    round_score((average - 1.0) / 4.0 * 100.0)
}

/// Score every category of `instrument`.
///
/// `on_category(done, total, category)` fires after each category is scored.
pub fn battery_scores(
    instrument: Instrument,
    answers: &AnswerSet,
    questions: &[Question],
    on_category: &mut dyn FnMut(usize, usize, &str),
) -> BatteryScores {
    let categories = instrument.categories();
    let total = categories.len();
    let mut scores = BatteryScores::with_capacity(total);

    for (index, &category) in categories.iter().enumerate() {
        scores.insert(category.to_string(), category_score(answers, questions, category));
        on_category(index + 1, total, category);
    }

    scores
}

/// Instrument A battery.
pub fn riasec_scores(answers: &AnswerSet, questions: &[Question]) -> BatteryScores {
    battery_scores(Instrument::Riasec, answers, questions, &mut |_, _, _| {})
}

/// Instrument B battery.
pub fn ocean_scores(answers: &AnswerSet, questions: &[Question]) -> BatteryScores {
    battery_scores(Instrument::Ocean, answers, questions, &mut |_, _, _| {})
}

/// Instrument C battery.
pub fn via_scores(answers: &AnswerSet, questions: &[Question]) -> BatteryScores {
    battery_scores(Instrument::Via, answers, questions, &mut |_, _, _| {})
}
