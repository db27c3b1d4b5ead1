//! Pure scoring functions: category scores, trait batteries, industry
//! matching, and answer validation.
//!
//! Nothing here knows about threads or the worker pool. Both the in-worker
//! request handler and the same-thread fallback call these same functions.

pub mod industry;
pub mod score;
pub mod validate;
pub mod weights;

pub use industry::{industry_scores, industry_scores_with, sector_score, IndustryScores, TraitProfile};
pub use score::{
    battery_scores, category_score, ocean_scores, reverse_answer, riasec_scores, round_score,
    via_scores, BatteryScores, CategoryScore,
};
pub use validate::{validate_answers, ValidationResult};
pub use weights::{SectorWeights, WeightTables, WeightsError};
