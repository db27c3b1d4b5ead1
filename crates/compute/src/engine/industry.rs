use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use traitscope_core::{Instrument, INDUSTRY_KEYS};

use super::score::{round_score, BatteryScores, CategoryScore};
use super::weights::{SectorWeights, WeightTables};

/// The three battery results an industry match is computed from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraitProfile {
    pub riasec: BatteryScores,
    pub ocean: BatteryScores,
    pub via: BatteryScores,
}

impl TraitProfile {
    pub fn battery(&self, instrument: Instrument) -> &BatteryScores {
        match instrument {
            Instrument::Riasec => &self.riasec,
            Instrument::Ocean => &self.ocean,
            Instrument::Via => &self.via,
        }
    }
}

/// Sector key -> compatibility score. Always holds every key of [`INDUSTRY_KEYS`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndustryScores(IndexMap<String, CategoryScore>);

impl IndustryScores {
    pub fn get(&self, sector: &str) -> Option<CategoryScore> {
        self.0.get(sector).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, CategoryScore)> {
        self.0.iter().map(|(k, &v)| (k.as_str(), v))
    }

    /// The `n` best-matching sectors, highest first. Ties keep sector key order.
    pub fn top(&self, n: usize) -> Vec<(&str, CategoryScore)> {
        let mut ranked: Vec<_> = self.iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(n);
        ranked
    }

    pub fn into_inner(self) -> IndexMap<String, CategoryScore> {
        self.0
    }
}

/// Weighted cross-instrument score for one sector.
///
/// RIASEC and VIA weights contribute `score * weight / 100`. OCEAN weights
/// may be negative, in which case the inverted trait `100 - score` is used
/// with the absolute weight.
pub fn sector_score(profile: &TraitProfile, weights: &SectorWeights) -> CategoryScore {
    let mut total_score = 0.0f64;
    let mut total_weight = 0.0f64;

    for instrument in [Instrument::Riasec, Instrument::Via] {
        let scores = profile.battery(instrument);
        for (category, &weight) in weights.for_instrument(instrument) {
            let trait_score = f64::from(scores.get(category).copied().unwrap_or(0));
            total_score += trait_score * f64::from(weight) / 100.0;
            total_weight += f64::from(weight);
        }
    }

    for (category, &weight) in &weights.ocean {
        let trait_score = f64::from(profile.ocean.get(category).copied().unwrap_or(0));
        let adjusted = if weight < 0 { 100.0 - trait_score } else { trait_score };
        let adjusted_weight = f64::from(weight.unsigned_abs());
        total_score += adjusted * adjusted_weight / 100.0;
        total_weight += adjusted_weight;
    }

    if total_weight > 0.0 {
        round_score(total_score / total_weight * 100.0)
    } else {
        0
    }
}

/// Score every sector in the closed key set. Sectors without a weight table score 0.
///
/// `on_sector(done, total, sector)` fires once per sector key.
pub fn industry_scores_with(
    profile: &TraitProfile,
    tables: &WeightTables,
    on_sector: &mut dyn FnMut(usize, usize, &str),
) -> IndustryScores {
    let total = INDUSTRY_KEYS.len();
    let mut scores = IndexMap::with_capacity(total);

    for (index, &sector) in INDUSTRY_KEYS.iter().enumerate() {
        let score = tables
            .sector(sector)
            .map_or(0, |weights| sector_score(profile, weights));
        scores.insert(sector.to_string(), score);
        on_sector(index + 1, total, sector);
    }

    IndustryScores(scores)
}

pub fn industry_scores(profile: &TraitProfile, tables: &WeightTables) -> IndustryScores {
    industry_scores_with(profile, tables, &mut |_, _, _| {})
}
