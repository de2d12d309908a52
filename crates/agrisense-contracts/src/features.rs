use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::PredictionError;

pub const RECOMMEND_FEATURES: [&str; 4] = ["temperature", "humidity", "ph", "rainfall"];
pub const YIELD_FEATURES: [&str; 5] = [
    "temperature",
    "humidity",
    "rainfall",
    "crop_type",
    "land_size",
];

/// Closed crop-type encoding used by the yield regressor.
pub const CROP_TYPE_INDEX: &[(&str, u32)] = &[("wheat", 0), ("rice", 1), ("maize", 2)];

/// Ordered model input. Built once per request and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn new(values: Vec<f64>) -> Result<Self, PredictionError> {
        if let Some(idx) = values.iter().position(|value| !value.is_finite()) {
            return Err(PredictionError::validation(
                format!("feature[{idx}]"),
                "value is not a finite number",
            ));
        }
        Ok(Self(values))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub fn encode_crop_type(raw: &str) -> Result<u32, PredictionError> {
    let normalized = raw.trim().to_lowercase();
    CROP_TYPE_INDEX
        .iter()
        .find(|(name, _)| *name == normalized)
        .map(|(_, code)| *code)
        .ok_or_else(|| PredictionError::UnsupportedCropType(raw.trim().to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecommendInput {
    pub temperature: f64,
    pub humidity: f64,
    pub ph: f64,
    pub rainfall: f64,
}

impl RecommendInput {
    pub fn from_payload(payload: &Map<String, Value>) -> Result<Self, PredictionError> {
        Ok(Self {
            temperature: required_number(payload, "temperature")?,
            humidity: required_number(payload, "humidity")?,
            ph: required_number(payload, "ph")?,
            rainfall: required_number(payload, "rainfall")?,
        })
    }

    pub fn features(&self) -> Result<FeatureVector, PredictionError> {
        FeatureVector::new(vec![
            self.temperature,
            self.humidity,
            self.ph,
            self.rainfall,
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldInput {
    pub temperature: f64,
    pub humidity: f64,
    pub rainfall: f64,
    pub crop_type: String,
    pub land_size: f64,
}

impl YieldInput {
    pub fn from_payload(payload: &Map<String, Value>) -> Result<Self, PredictionError> {
        Ok(Self {
            temperature: required_number(payload, "temperature")?,
            humidity: required_number(payload, "humidity")?,
            rainfall: required_number(payload, "rainfall")?,
            crop_type: required_text(payload, "crop_type")?,
            land_size: required_number(payload, "land_size")?,
        })
    }

    /// Resolves the crop type before anything reaches the model.
    pub fn features(&self) -> Result<FeatureVector, PredictionError> {
        let crop_encoded = encode_crop_type(&self.crop_type)?;
        FeatureVector::new(vec![
            self.temperature,
            self.humidity,
            self.rainfall,
            f64::from(crop_encoded),
            self.land_size,
        ])
    }
}

pub fn required_number(payload: &Map<String, Value>, field: &str) -> Result<f64, PredictionError> {
    let Some(value) = payload.get(field) else {
        return Err(PredictionError::validation(field, "missing"));
    };
    let parsed = match value {
        Value::Number(num) => num.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        Value::Null => return Err(PredictionError::validation(field, "missing")),
        _ => None,
    };
    match parsed {
        Some(number) if number.is_finite() => Ok(number),
        Some(_) => Err(PredictionError::validation(field, "not a finite number")),
        None => Err(PredictionError::validation(field, "not a number")),
    }
}

pub fn required_text(payload: &Map<String, Value>, field: &str) -> Result<String, PredictionError> {
    match payload.get(field) {
        None | Some(Value::Null) => Err(PredictionError::validation(field, "missing")),
        Some(Value::String(text)) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        Some(Value::String(_)) => Err(PredictionError::validation(field, "empty")),
        Some(_) => Err(PredictionError::validation(field, "not a string")),
    }
}
