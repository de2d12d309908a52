use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_TOMORROW_API_BASE: &str = "https://api.tomorrow.io/v4";
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_CROP_MODEL_PATH: &str = "models/crop_recommendation_model.json";
pub const DEFAULT_YIELD_MODEL_PATH: &str = "models/crop_yield_predictor.json";

/// Everything the engine reads from the environment, resolved once at startup.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub tomorrow_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub tomorrow_api_base: String,
    pub gemini_api_base: String,
    pub gemini_model: String,
    pub weather_timeout: Duration,
    pub diagnosis_timeout: Duration,
    pub crop_model_path: PathBuf,
    pub yield_model_path: PathBuf,
    pub events_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tomorrow_api_key: None,
            gemini_api_key: None,
            tomorrow_api_base: DEFAULT_TOMORROW_API_BASE.to_string(),
            gemini_api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            weather_timeout: Duration::from_secs(15),
            diagnosis_timeout: Duration::from_secs(60),
            crop_model_path: PathBuf::from(DEFAULT_CROP_MODEL_PATH),
            yield_model_path: PathBuf::from(DEFAULT_YIELD_MODEL_PATH),
            events_path: None,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |keys: &[&str]| first_non_empty(&lookup, keys);
        let defaults = Self::default();
        Self {
            tomorrow_api_key: get(&["TOMORROW_API_KEY"]),
            gemini_api_key: get(&["GEMINI_API_KEY", "GOOGLE_API_KEY"]),
            tomorrow_api_base: get(&["TOMORROW_API_BASE"])
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or(defaults.tomorrow_api_base),
            gemini_api_base: get(&["GEMINI_API_BASE"])
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or(defaults.gemini_api_base),
            gemini_model: get(&["GEMINI_MODEL"]).unwrap_or(defaults.gemini_model),
            weather_timeout: seconds_in_range(
                get(&["AGRISENSE_WEATHER_TIMEOUT"]).as_deref(),
                15.0,
                1.0,
                120.0,
            ),
            diagnosis_timeout: seconds_in_range(
                get(&["AGRISENSE_DIAGNOSIS_TIMEOUT"]).as_deref(),
                60.0,
                5.0,
                300.0,
            ),
            crop_model_path: get(&["AGRISENSE_CROP_MODEL"])
                .map(PathBuf::from)
                .unwrap_or(defaults.crop_model_path),
            yield_model_path: get(&["AGRISENSE_YIELD_MODEL"])
                .map(PathBuf::from)
                .unwrap_or(defaults.yield_model_path),
            events_path: get(&["AGRISENSE_EVENTS_PATH"]).map(PathBuf::from),
        }
    }

    /// Names of provider keys that are not configured.
    pub fn missing_keys(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.tomorrow_api_key.is_none() {
            missing.push("TOMORROW_API_KEY");
        }
        if self.gemini_api_key.is_none() {
            missing.push("GEMINI_API_KEY");
        }
        missing
    }

    pub fn secrets(&self) -> Vec<&str> {
        [&self.tomorrow_api_key, &self.gemini_api_key]
            .into_iter()
            .filter_map(|key| key.as_deref())
            .collect()
    }
}

fn first_non_empty(lookup: &impl Fn(&str) -> Option<String>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        lookup(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

fn seconds_in_range(raw: Option<&str>, default: f64, min: f64, max: f64) -> Duration {
    let parsed = raw
        .and_then(|text| text.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite());
    Duration::from_secs_f64(parsed.unwrap_or(default).clamp(min, max))
}
