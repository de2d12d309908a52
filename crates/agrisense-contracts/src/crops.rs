use std::sync::OnceLock;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub const GENERIC_CROP_ICON: &str = "🌿";
pub const DEFAULT_SUITABILITY: u8 = 70;
pub const DEFAULT_TIP: &str = "No specific tips available";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuitabilityBand {
    High,
    Moderate,
    Low,
}

impl SuitabilityBand {
    pub fn from_score(score: u8) -> Self {
        if score >= 90 {
            SuitabilityBand::High
        } else if score >= 75 {
            SuitabilityBand::Moderate
        } else {
            SuitabilityBand::Low
        }
    }
}

/// Descriptive metadata attached to a recommended crop label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropInfo {
    pub name: String,
    pub icon: String,
    #[serde(rename = "yield")]
    pub yield_range: String,
    pub profit: String,
    pub season: String,
    pub suitability: u8,
    pub suitability_band: SuitabilityBand,
    pub tips: Vec<String>,
}

impl CropInfo {
    /// Synthesized record for labels the table does not know.
    pub fn unknown(label: &str) -> Self {
        Self {
            name: label.to_string(),
            icon: GENERIC_CROP_ICON.to_string(),
            yield_range: "N/A".to_string(),
            profit: "N/A".to_string(),
            season: "N/A".to_string(),
            suitability: DEFAULT_SUITABILITY,
            suitability_band: SuitabilityBand::from_score(DEFAULT_SUITABILITY),
            tips: vec![DEFAULT_TIP.to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CropProfile {
    icon: &'static str,
    yield_range: &'static str,
    profit: &'static str,
    season: &'static str,
    suitability: u8,
    tips: &'static [&'static str],
}

#[derive(Debug)]
pub struct CropInfoTable {
    profiles: IndexMap<&'static str, CropProfile>,
}

impl CropInfoTable {
    /// Process-wide table, built on first use and read-only afterwards.
    pub fn global() -> &'static CropInfoTable {
        static TABLE: OnceLock<CropInfoTable> = OnceLock::new();
        TABLE.get_or_init(|| CropInfoTable {
            profiles: default_profiles(),
        })
    }

    pub fn labels(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.profiles.keys().copied()
    }

    pub fn get(&self, label: &str) -> Option<CropInfo> {
        let (_, profile) = self.profiles.get_key_value(label).or_else(|| {
            let trimmed = label.trim();
            self.profiles
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(trimmed))
        })?;
        Some(CropInfo {
            name: label.to_string(),
            icon: profile.icon.to_string(),
            yield_range: profile.yield_range.to_string(),
            profit: profile.profit.to_string(),
            season: profile.season.to_string(),
            suitability: profile.suitability,
            suitability_band: SuitabilityBand::from_score(profile.suitability),
            tips: profile.tips.iter().map(|tip| (*tip).to_string()).collect(),
        })
    }

    /// Never fails: unknown labels get [`CropInfo::unknown`].
    pub fn lookup(&self, label: &str) -> CropInfo {
        self.get(label).unwrap_or_else(|| CropInfo::unknown(label))
    }
}

fn default_profiles() -> IndexMap<&'static str, CropProfile> {
    let mut map = IndexMap::new();

    let mut insert = |label: &'static str,
                      icon: &'static str,
                      yield_range: &'static str,
                      profit: &'static str,
                      season: &'static str,
                      suitability: u8,
                      tips: &'static [&'static str]| {
        map.insert(
            label,
            CropProfile {
                icon,
                yield_range,
                profit,
                season,
                suitability,
                tips,
            },
        );
    };

    insert(
        "Rice",
        "🌾",
        "45–60 quintals/hectare",
        "₹35,000–50,000/hectare",
        "Kharif",
        92,
        &[
            "Use quality seeds",
            "Ensure proper irrigation",
            "Apply organic fertilizers",
        ],
    );
    insert(
        "Wheat",
        "🌾",
        "35–50 quintals/hectare",
        "₹30,000–45,000/hectare",
        "Rabi",
        88,
        &[
            "Sow in early November",
            "Irrigate at crown root initiation",
            "Control weeds within 30 days",
        ],
    );
    insert(
        "Maize",
        "🌽",
        "50–70 quintals/hectare",
        "₹25,000–40,000/hectare",
        "Kharif",
        85,
        &[
            "Maintain 60 cm row spacing",
            "Apply nitrogen in split doses",
            "Watch for fall armyworm",
        ],
    );
    insert(
        "Cotton",
        "☁️",
        "15–25 quintals/hectare",
        "₹40,000–60,000/hectare",
        "Kharif",
        80,
        &[
            "Use certified Bt seed",
            "Avoid waterlogging",
            "Monitor for bollworm",
        ],
    );
    insert(
        "Chickpea",
        "🫘",
        "15–20 quintals/hectare",
        "₹25,000–35,000/hectare",
        "Rabi",
        78,
        &[
            "Treat seeds with Rhizobium",
            "Limit irrigation to flowering",
            "Rotate with cereals",
        ],
    );

    map
}
