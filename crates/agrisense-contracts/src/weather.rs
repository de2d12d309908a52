use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Hours used to turn an instantaneous precipitation rate into a daily figure.
pub const RAINFALL_HOURS_PER_DAY: f64 = 24.0;

/// Current conditions in the vocabulary the recommender expects.
///
/// `rainfall` is an estimate: the provider reports an intensity in mm/hour and it is
/// scaled to a day, not an observed daily accumulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub temperature: f64,
    pub humidity: f64,
    pub rainfall: f64,
}

impl WeatherSnapshot {
    /// Maps a Tomorrow.io realtime payload (`data.values.*`).
    pub fn from_realtime_payload(payload: &Value) -> Result<Self> {
        let values = payload
            .get("data")
            .and_then(|data| data.get("values"))
            .and_then(Value::as_object)
            .context("weather payload missing data.values")?;
        let temperature = values
            .get("temperature")
            .and_then(Value::as_f64)
            .context("weather payload missing numeric temperature")?;
        let humidity = values
            .get("humidity")
            .and_then(Value::as_f64)
            .context("weather payload missing numeric humidity")?;
        let intensity = match values.get("precipitationIntensity") {
            None | Some(Value::Null) => 0.0,
            Some(value) => value
                .as_f64()
                .context("weather payload has non-numeric precipitationIntensity")?,
        };
        let rainfall = daily_rainfall_estimate(intensity);
        if !rainfall.is_finite() {
            bail!("weather payload precipitationIntensity {intensity} is out of range");
        }
        Ok(Self {
            temperature,
            humidity,
            rainfall,
        })
    }
}

pub fn daily_rainfall_estimate(intensity_mm_per_hour: f64) -> f64 {
    intensity_mm_per_hour * RAINFALL_HOURS_PER_DAY
}
