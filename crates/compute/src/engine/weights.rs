//! Industry weight tables: per sector, per instrument category weights.
//!
//! Tables are configuration data loaded from YAML. The built-in set is
//! embedded from `data/industry-weights.yml`; a file can override it.
//! Tables are validated once at load time so the matcher never has to
//! defend against unknown categories on the hot path.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use traitscope_core::{Instrument, INDUSTRY_KEYS};

const BUILTIN_WEIGHTS: &str = include_str!("../../data/industry-weights.yml");

#[derive(Debug, Error)]
pub enum WeightsError {
    #[error("weights IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("weights parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("unknown industry sector: {0}")]
    UnknownSector(String),

    #[error("sector {sector}: unknown {instrument} category '{category}'")]
    UnknownCategory {
        sector: String,
        instrument: Instrument,
        category: String,
    },

    #[error("sector {sector}: negative weight for {instrument} category '{category}'")]
    NegativeWeight {
        sector: String,
        instrument: Instrument,
        category: String,
    },
}

/// Category weights for one sector, split by instrument.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SectorWeights {
    #[serde(default)]
    pub riasec: IndexMap<String, i32>,
    /// May carry negative weights (inverted trait contribution).
    #[serde(default)]
    pub ocean: IndexMap<String, i32>,
    #[serde(default)]
    pub via: IndexMap<String, i32>,
}

impl SectorWeights {
    pub fn for_instrument(&self, instrument: Instrument) -> &IndexMap<String, i32> {
        match instrument {
            Instrument::Riasec => &self.riasec,
            Instrument::Ocean => &self.ocean,
            Instrument::Via => &self.via,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.riasec.is_empty() && self.ocean.is_empty() && self.via.is_empty()
    }
}

/// Full weight-table set keyed by industry sector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeightTables {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub sectors: IndexMap<String, SectorWeights>,
}

fn default_version() -> u32 {
    1
}

impl WeightTables {
    /// The embedded default tables.
    pub fn builtin() -> Result<Self, WeightsError> {
        Self::from_yaml_str(BUILTIN_WEIGHTS)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, WeightsError> {
        let tables: WeightTables = serde_yaml::from_str(yaml)?;
        tables.validate()?;
        Ok(tables)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, WeightsError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    /// Build from already-typed sectors (validated like a parsed file).
    pub fn from_sectors(
        sectors: impl IntoIterator<Item = (String, SectorWeights)>,
    ) -> Result<Self, WeightsError> {
        let tables = Self {
            version: default_version(),
            sectors: sectors.into_iter().collect(),
        };
        tables.validate()?;
        Ok(tables)
    }

    pub fn sector(&self, key: &str) -> Option<&SectorWeights> {
        self.sectors.get(key)
    }

    /// Check every sector and category name against the closed key sets.
    pub fn validate(&self) -> Result<(), WeightsError> {
        for (sector, weights) in &self.sectors {
            if !INDUSTRY_KEYS.contains(&sector.as_str()) {
                return Err(WeightsError::UnknownSector(sector.clone()));
            }
            for instrument in Instrument::ALL {
                let known = instrument.categories();
                for (category, &weight) in weights.for_instrument(instrument) {
                    if !known.contains(&category.as_str()) {
                        return Err(WeightsError::UnknownCategory {
                            sector: sector.clone(),
                            instrument,
                            category: category.clone(),
                        });
                    }
                    if weight < 0 && instrument != Instrument::Ocean {
                        return Err(WeightsError::NegativeWeight {
                            sector: sector.clone(),
                            instrument,
                            category: category.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
