use serde::{Deserialize, Serialize};

/// The three independent trait batteries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Instrument {
    /// Instrument A: trait-interest (RIASEC style).
    Riasec,
    /// Instrument B: personality dimensions (OCEAN style).
    Ocean,
    /// Instrument C: character strengths (VIA style).
    Via,
}

impl Instrument {
    pub const ALL: [Instrument; 3] = [Instrument::Riasec, Instrument::Ocean, Instrument::Via];

    /// Fixed category list for this instrument, in reporting order.
    pub fn categories(self) -> &'static [&'static str] {
        match self {
            Instrument::Riasec => RIASEC_CATEGORIES,
            Instrument::Ocean => OCEAN_CATEGORIES,
            Instrument::Via => VIA_CATEGORIES,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Instrument::Riasec => "riasec",
            Instrument::Ocean => "ocean",
            Instrument::Via => "via",
        }
    }
}

impl std::fmt::Display for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Instrument {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "riasec" | "a" => Ok(Instrument::Riasec),
            "ocean" | "b" => Ok(Instrument::Ocean),
            "via" | "c" => Ok(Instrument::Via),
            other => Err(format!("unknown instrument: {other}")),
        }
    }
}

pub const RIASEC_CATEGORIES: &[&str] = &[
    "realistic",
    "investigative",
    "artistic",
    "social",
    "enterprising",
    "conventional",
];

pub const OCEAN_CATEGORIES: &[&str] = &[
    "openness",
    "conscientiousness",
    "extraversion",
    "agreeableness",
    "neuroticism",
];

pub const VIA_CATEGORIES: &[&str] = &[
    "creativity",
    "curiosity",
    "judgment",
    "love_of_learning",
    "perspective",
    "bravery",
    "perseverance",
    "honesty",
    "zest",
    "love",
    "kindness",
    "social_intelligence",
    "teamwork",
    "fairness",
    "leadership",
    "forgiveness",
    "humility",
    "prudence",
    "self_regulation",
    "appreciation_of_beauty",
    "gratitude",
    "hope",
    "humor",
    "spirituality",
];

/// Closed set of industry sector keys. Every industry result carries all of them.
pub const INDUSTRY_KEYS: &[&str] = &[
    "teknologi",
    "kesehatan",
    "pendidikan",
    "keuangan",
    "manufaktur",
    "konstruksi",
    "pertanian",
    "energi",
    "transportasi",
    "logistik",
    "perdagangan",
    "kreatif",
    "media",
    "hukum",
    "pemerintahan",
    "pariwisata",
    "perhotelan",
    "telekomunikasi",
    "pertambangan",
    "sosial",
    "riset",
    "olahraga",
    "kuliner",
    "properti",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_lists_have_no_duplicates() {
        for instrument in Instrument::ALL {
            let cats = instrument.categories();
            let unique: std::collections::HashSet<_> = cats.iter().collect();
            assert_eq!(unique.len(), cats.len(), "{instrument} has duplicate categories");
        }
    }

    #[test]
    fn industry_key_set_is_closed_24() {
        let unique: std::collections::HashSet<_> = INDUSTRY_KEYS.iter().collect();
        assert_eq!(INDUSTRY_KEYS.len(), 24);
        assert_eq!(unique.len(), 24);
    }

    #[test]
    fn instrument_parse() {
        assert_eq!("OCEAN".parse::<Instrument>().unwrap(), Instrument::Ocean);
        assert_eq!("a".parse::<Instrument>().unwrap(), Instrument::Riasec);
        assert!("mbti".parse::<Instrument>().is_err());
    }

    #[test]
    fn instrument_serde_lowercase() {
        let json = serde_json::to_string(&Instrument::Via).unwrap();
        assert_eq!(json, "\"via\"");
    }
}
