use std::sync::Arc;

use agrisense_contracts::features::{RECOMMEND_FEATURES, YIELD_FEATURES};
use agrisense_contracts::{CropInfo, CropInfoTable, FeatureVector, PredictionError};
use anyhow::{anyhow, bail};
use serde::{Deserialize, Serialize};

use crate::models::{ModelOutput, TabularModel};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YieldPrediction {
    pub predicted_yield: f64,
}

/// The two pre-loaded models plus the crop enrichment table.
#[derive(Clone)]
pub struct TabularPredictorService {
    crop_model: Arc<dyn TabularModel>,
    yield_model: Arc<dyn TabularModel>,
    crop_info: &'static CropInfoTable,
}

impl TabularPredictorService {
    pub fn new(crop_model: Arc<dyn TabularModel>, yield_model: Arc<dyn TabularModel>) -> Self {
        Self {
            crop_model,
            yield_model,
            crop_info: CropInfoTable::global(),
        }
    }

    pub fn crop_model_name(&self) -> &str {
        self.crop_model.name()
    }

    pub fn yield_model_name(&self) -> &str {
        self.yield_model.name()
    }

    /// Predicts a crop label and enriches it; unknown labels still come back.
    pub fn recommend(&self, features: &FeatureVector) -> Result<CropInfo, PredictionError> {
        let label = self.predict_label(features).map_err(PredictionError::PredictionFailed)?;
        Ok(self.crop_info.lookup(&label))
    }

    pub fn predict_yield(&self, features: &FeatureVector) -> Result<YieldPrediction, PredictionError> {
        let raw = self.predict_value(features).map_err(PredictionError::PredictionFailed)?;
        let predicted_yield = round_to_cents(raw);
        if !predicted_yield.is_finite() {
            return Err(PredictionError::PredictionFailed(anyhow!(
                "yield {raw} from model '{}' is out of range after rounding",
                self.yield_model.name()
            )));
        }
        Ok(YieldPrediction { predicted_yield })
    }

    fn predict_label(&self, features: &FeatureVector) -> anyhow::Result<String> {
        check_arity("crop recommendation", features, RECOMMEND_FEATURES.len())?;
        match self.crop_model.predict(features.as_slice())? {
            ModelOutput::Label(label) if !label.trim().is_empty() => Ok(label),
            ModelOutput::Label(_) => bail!("model '{}' returned an empty label", self.crop_model.name()),
            ModelOutput::Value(value) => bail!(
                "model '{}' returned value {value} where a crop label was expected",
                self.crop_model.name()
            ),
        }
    }

    fn predict_value(&self, features: &FeatureVector) -> anyhow::Result<f64> {
        check_arity("yield prediction", features, YIELD_FEATURES.len())?;
        match self.yield_model.predict(features.as_slice())? {
            ModelOutput::Value(value) if value.is_finite() => Ok(value),
            ModelOutput::Value(value) => Err(anyhow!(
                "model '{}' returned non-finite yield {value}",
                self.yield_model.name()
            )),
            ModelOutput::Label(label) => bail!(
                "model '{}' returned label '{label}' where a yield was expected",
                self.yield_model.name()
            ),
        }
    }
}

fn check_arity(purpose: &str, features: &FeatureVector, expected: usize) -> anyhow::Result<()> {
    if features.len() != expected {
        bail!(
            "{purpose} expects {expected} features, got {}",
            features.len()
        );
    }
    Ok(())
}

/// Two decimals, ties to even.
pub fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}
