use std::time::Duration;

use agrisense_contracts::WeatherSnapshot;
use anyhow::{Context, Result};
use reqwest::blocking::Client as HttpClient;
use serde_json::Value;

use crate::config::EngineConfig;
use crate::http::response_text_or_error;

pub trait WeatherProvider: Send + Sync {
    fn name(&self) -> &str;
    fn current(&self, location: &str) -> Result<WeatherSnapshot>;
}

/// Tomorrow.io realtime endpoint. One request per call, no retry, no cache.
pub struct TomorrowWeatherProvider {
    api_base: String,
    api_key: Option<String>,
    timeout: Duration,
    http: HttpClient,
}

impl TomorrowWeatherProvider {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            api_base: config.tomorrow_api_base.clone(),
            api_key: config.tomorrow_api_key.clone(),
            timeout: config.weather_timeout,
            http: HttpClient::new(),
        }
    }

    fn realtime_endpoint(&self) -> String {
        format!("{}/weather/realtime", self.api_base)
    }
}

impl WeatherProvider for TomorrowWeatherProvider {
    fn name(&self) -> &str {
        "tomorrow"
    }

    fn current(&self, location: &str) -> Result<WeatherSnapshot> {
        let api_key = self
            .api_key
            .as_deref()
            .context("TOMORROW_API_KEY not set")?;
        let response = self
            .http
            .get(self.realtime_endpoint())
            .query(&[("location", location), ("apikey", api_key)])
            .timeout(self.timeout)
            .send()
            .map_err(reqwest::Error::without_url)
            .context("Tomorrow.io request failed")?;
        let body = response_text_or_error("Tomorrow.io", response)?;
        let payload: Value =
            serde_json::from_str(&body).context("Tomorrow.io returned invalid JSON payload")?;
        WeatherSnapshot::from_realtime_payload(&payload)
    }
}
