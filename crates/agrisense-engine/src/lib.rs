pub mod assembler;
pub mod config;
pub mod http;
pub mod models;
pub mod predictor;
pub mod vision;
pub mod weather;

use std::time::Instant;

use agrisense_contracts::diagnosis::{diagnosis_instruction, parse_diagnosis_response};
use agrisense_contracts::events::{EventPayload, EventWriter};
use agrisense_contracts::features::{required_number, required_text};
use agrisense_contracts::{
    CropInfo, DiagnosisReport, PredictionError, RecommendInput, WeatherSnapshot, YieldInput,
};
use anyhow::{Context, Result};
use serde_json::{json, Value};

pub use assembler::{Operation, OperationRequest, OperationResponse};
pub use config::EngineConfig;
pub use predictor::{TabularPredictorService, YieldPrediction};

use crate::assembler::success_body;
use crate::http::{redact_secrets, truncate_text};
use crate::models::load_model_artifact;
use crate::vision::{
    encode_image, EncodedImage, GeminiVisionProvider, VisionProvider, VisionRequest,
};
use crate::weather::{TomorrowWeatherProvider, WeatherProvider};

const CAUSE_MAX_CHARS: usize = 1024;

/// Prediction orchestration: one call per inbound request, no state shared between calls.
pub struct AgrisenseEngine {
    predictor: TabularPredictorService,
    weather: Box<dyn WeatherProvider>,
    vision: Box<dyn VisionProvider>,
    events: EventWriter,
    secrets: Vec<String>,
}

impl AgrisenseEngine {
    pub fn new(
        predictor: TabularPredictorService,
        weather: Box<dyn WeatherProvider>,
        vision: Box<dyn VisionProvider>,
        events: EventWriter,
    ) -> Self {
        Self {
            predictor,
            weather,
            vision,
            events,
            secrets: Vec::new(),
        }
    }

    /// Loads both model artifacts and wires the real providers.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let crop_model = load_model_artifact(&config.crop_model_path)
            .context("crop recommendation model unavailable")?;
        let yield_model = load_model_artifact(&config.yield_model_path)
            .context("crop yield model unavailable")?;
        let session_id = uuid::Uuid::new_v4().to_string();
        let events = match &config.events_path {
            Some(path) => EventWriter::new(path, session_id),
            None => EventWriter::stderr(session_id),
        };
        let mut engine = Self::new(
            TabularPredictorService::new(crop_model, yield_model),
            Box::new(TomorrowWeatherProvider::new(config)),
            Box::new(GeminiVisionProvider::new(config)),
            events,
        );
        engine.secrets = config.secrets().into_iter().map(str::to_string).collect();

        let mut payload = EventPayload::new();
        payload.insert("missing_keys".to_string(), json!(config.missing_keys()));
        payload.insert(
            "crop_model".to_string(),
            json!(engine.predictor.crop_model_name()),
        );
        payload.insert(
            "yield_model".to_string(),
            json!(engine.predictor.yield_model_name()),
        );
        payload.insert("weather_provider".to_string(), json!(engine.weather.name()));
        payload.insert("vision_provider".to_string(), json!(engine.vision.name()));
        engine.emit("engine_ready", payload);
        Ok(engine)
    }

    pub fn diagnose_disease(&self, image: Option<&[u8]>) -> Result<DiagnosisReport, PredictionError> {
        self.diagnose_encoded(encode_image(image)?)
    }

    fn diagnose_encoded(&self, image: EncodedImage) -> Result<DiagnosisReport, PredictionError> {
        let request = VisionRequest {
            instruction: diagnosis_instruction().to_string(),
            image,
        };
        let body = self
            .vision
            .generate(&request)
            .map_err(PredictionError::DiagnosisServiceUnavailable)?;
        let response: Value = serde_json::from_str(&body).map_err(|err| {
            PredictionError::DiagnosisParseFailed(format!("response body is not JSON: {err}"))
        })?;
        parse_diagnosis_response(&response)
    }

    pub fn get_weather(&self, location: Option<&str>) -> Result<WeatherSnapshot, PredictionError> {
        let location = location
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| PredictionError::validation("location", "missing"))?;
        self.weather
            .current(location)
            .map_err(PredictionError::WeatherUnavailable)
    }

    pub fn recommend_crop(&self, input: &RecommendInput) -> Result<CropInfo, PredictionError> {
        self.predictor.recommend(&input.features()?)
    }

    /// Current weather for `location` fed into the recommender with the caller's soil pH.
    pub fn recommend_for_location(
        &self,
        location: Option<&str>,
        ph: f64,
    ) -> Result<CropInfo, PredictionError> {
        if !ph.is_finite() {
            return Err(PredictionError::validation("ph", "not a finite number"));
        }
        let weather = self.get_weather(location)?;
        self.recommend_crop(&RecommendInput {
            temperature: weather.temperature,
            humidity: weather.humidity,
            ph,
            rainfall: weather.rainfall,
        })
    }

    pub fn predict_yield(&self, input: &YieldInput) -> Result<YieldPrediction, PredictionError> {
        self.predictor.predict_yield(&input.features()?)
    }

    /// Runs one request to completion and shapes the outcome. Every failure is logged.
    pub fn handle(&self, request: OperationRequest) -> OperationResponse {
        let operation = request.operation();
        let request_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();
        let mut fields = EventPayload::new();

        let outcome = match &request {
            OperationRequest::DiagnoseDisease { image } => encode_image(image.as_deref())
                .and_then(|encoded| {
                    fields.insert("image_bytes".to_string(), json!(encoded.byte_len));
                    fields.insert("image_sha256".to_string(), json!(encoded.sha256));
                    self.diagnose_encoded(encoded)
                })
                .and_then(|report| success_body(&report)),
            OperationRequest::GetWeather { location } => self
                .get_weather(location.as_deref())
                .and_then(|snapshot| success_body(&snapshot)),
            OperationRequest::RecommendCrop { payload } => RecommendInput::from_payload(payload)
                .and_then(|input| self.recommend_crop(&input))
                .and_then(|info| success_body(&info)),
            OperationRequest::RecommendForLocation { payload } => {
                required_text(payload, "location")
                    .and_then(|location| {
                        let ph = required_number(payload, "ph")?;
                        self.recommend_for_location(Some(&location), ph)
                    })
                    .and_then(|info| success_body(&info))
            }
            OperationRequest::PredictYield { payload } => YieldInput::from_payload(payload)
                .and_then(|input| self.predict_yield(&input))
                .and_then(|prediction| success_body(&prediction)),
        };

        fields.insert("operation".to_string(), json!(operation.as_str()));
        fields.insert("request_id".to_string(), json!(request_id));
        fields.insert(
            "elapsed_ms".to_string(),
            json!(u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)),
        );

        match outcome {
            Ok(body) => {
                let response = OperationResponse::ok(body);
                fields.insert("status".to_string(), json!(response.status));
                self.emit("operation_completed", fields);
                response
            }
            Err(err) => {
                let response = OperationResponse::failure(operation, &err);
                fields.insert("status".to_string(), json!(response.status));
                fields.insert("error_kind".to_string(), json!(err.kind()));
                fields.insert("class".to_string(), json!(err.class().as_str()));
                fields.insert("cause".to_string(), json!(self.cause_text(&err)));
                self.emit("operation_failed", fields);
                response
            }
        }
    }

    fn cause_text(&self, err: &PredictionError) -> String {
        let joined = err.chain_text().join(" | caused by: ");
        let secrets: Vec<&str> = self.secrets.iter().map(String::as_str).collect();
        truncate_text(&redact_secrets(&joined, &secrets), CAUSE_MAX_CHARS)
    }

    fn emit(&self, event_type: &str, payload: EventPayload) {
        if let Err(err) = self.events.emit(event_type, payload) {
            eprintln!("agrisense event log error ({event_type}): {err:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use agrisense_contracts::events::EventWriter;
    use agrisense_contracts::{PredictionError, WeatherSnapshot};
    use anyhow::bail;
    use serde_json::{json, Map, Value};

    use super::{AgrisenseEngine, EngineConfig, OperationRequest};
    use crate::predictor::tests::StubModel;
    use crate::predictor::TabularPredictorService;
    use crate::vision::{VisionProvider, VisionRequest};
    use crate::weather::WeatherProvider;

    const SECRET: &str = "gemini-secret-key";

    struct FixedWeather(Option<WeatherSnapshot>);

    impl WeatherProvider for FixedWeather {
        fn name(&self) -> &str {
            "fixed"
        }

        fn current(&self, location: &str) -> anyhow::Result<WeatherSnapshot> {
            match self.0 {
                Some(snapshot) => Ok(snapshot),
                None => bail!("provider unreachable for {location}"),
            }
        }
    }

    /// Parses a canned realtime payload the way the live provider does.
    struct RawWeather(Value);

    impl WeatherProvider for RawWeather {
        fn name(&self) -> &str {
            "raw"
        }

        fn current(&self, _location: &str) -> anyhow::Result<WeatherSnapshot> {
            WeatherSnapshot::from_realtime_payload(&self.0)
        }
    }

    struct CannedVision(Result<String, String>);

    impl VisionProvider for CannedVision {
        fn name(&self) -> &str {
            "canned"
        }

        fn generate(&self, request: &VisionRequest) -> anyhow::Result<String> {
            assert!(!request.image.data.is_empty());
            match &self.0 {
                Ok(body) => Ok(body.clone()),
                Err(message) => bail!("{message}"),
            }
        }
    }

    fn gemini_body(text: &str) -> String {
        json!({"candidates": [{"content": {"parts": [{"text": text}]}}]}).to_string()
    }

    fn engine_with(
        dir: &std::path::Path,
        crop: Arc<StubModel>,
        yield_model: Arc<StubModel>,
        weather: Option<WeatherSnapshot>,
        vision: Result<String, String>,
    ) -> AgrisenseEngine {
        let mut engine = AgrisenseEngine::new(
            TabularPredictorService::new(crop, yield_model),
            Box::new(FixedWeather(weather)),
            Box::new(CannedVision(vision)),
            EventWriter::new(dir.join("events.jsonl"), "session-test"),
        );
        engine.secrets = vec![SECRET.to_string()];
        engine
    }

    fn read_events(dir: &std::path::Path) -> anyhow::Result<Vec<Value>> {
        let content = fs::read_to_string(dir.join("events.jsonl"))?;
        content
            .lines()
            .map(|line| serde_json::from_str(line).map_err(anyhow::Error::from))
            .collect()
    }

    fn payload(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn recommend_request_returns_enriched_label() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let engine = engine_with(
            temp.path(),
            StubModel::label("Rice"),
            StubModel::value(1.0),
            None,
            Ok(String::new()),
        );
        let response = engine.handle(OperationRequest::RecommendCrop {
            payload: payload(json!({
                "temperature": 20.8, "humidity": 82.0, "ph": 6.5, "rainfall": 202.9
            })),
        });
        assert_eq!(response.status, 200);
        assert_eq!(response.body["name"], "Rice");
        assert_eq!(response.body["yield"], "45–60 quintals/hectare");
        assert_eq!(response.body["suitability"], 92);

        let events = read_events(temp.path())?;
        assert_eq!(events[0]["type"], "operation_completed");
        assert_eq!(events[0]["operation"], "recommend_crop");
        assert_eq!(events[0]["status"], 200);
        assert!(events[0]["elapsed_ms"].is_u64());
        Ok(())
    }

    #[test]
    fn missing_numeric_field_is_a_logged_client_error() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let crop = StubModel::label("Rice");
        let engine = engine_with(temp.path(), crop.clone(), StubModel::value(1.0), None, Ok(String::new()));
        let response = engine.handle(OperationRequest::RecommendCrop {
            payload: payload(json!({"temperature": 20.8, "humidity": 82.0, "rainfall": 202.9})),
        });
        assert_eq!(response.status, 400);
        assert_eq!(response.body, json!({"error": "Invalid or missing field: ph"}));
        assert_eq!(crop.calls(), 0);

        let events = read_events(temp.path())?;
        assert_eq!(events[0]["type"], "operation_failed");
        assert_eq!(events[0]["error_kind"], "validation_error");
        assert_eq!(events[0]["class"], "client");
        Ok(())
    }

    #[test]
    fn unsupported_crop_type_never_reaches_the_model() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let yield_model = StubModel::value(40.0);
        let engine = engine_with(
            temp.path(),
            StubModel::label("Rice"),
            yield_model.clone(),
            None,
            Ok(String::new()),
        );
        let response = engine.handle(OperationRequest::PredictYield {
            payload: payload(json!({
                "temperature": 24, "humidity": 60, "rainfall": 110,
                "crop_type": "barley", "land_size": 2
            })),
        });
        assert_eq!(response.status, 400);
        assert_eq!(response.body, json!({"error": "Unsupported crop type"}));
        assert_eq!(yield_model.calls(), 0);

        let response = engine.handle(OperationRequest::PredictYield {
            payload: payload(json!({
                "temperature": 24, "humidity": 60, "rainfall": 110,
                "crop_type": "Wheat", "land_size": 2
            })),
        });
        assert_eq!(response.status, 200);
        assert_eq!(response.body, json!({"predicted_yield": 40.0}));
        assert_eq!(yield_model.calls(), 1);
        Ok(())
    }

    #[test]
    fn predict_yield_missing_land_size_is_a_client_error() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let yield_model = StubModel::value(40.0);
        let engine = engine_with(
            temp.path(),
            StubModel::label("Rice"),
            yield_model.clone(),
            None,
            Ok(String::new()),
        );
        let response = engine.handle(OperationRequest::PredictYield {
            payload: payload(json!({
                "temperature": 24, "humidity": 60, "rainfall": 110, "crop_type": "Rice"
            })),
        });
        assert_eq!(response.status, 400);
        assert_eq!(response.body, json!({"error": "Invalid or missing field: land_size"}));
        assert_eq!(yield_model.calls(), 0);
        Ok(())
    }

    #[test]
    fn yield_overflowing_on_rounding_is_a_server_error() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let engine = engine_with(
            temp.path(),
            StubModel::label("Rice"),
            StubModel::value(1.0e307),
            None,
            Ok(String::new()),
        );
        let response = engine.handle(OperationRequest::PredictYield {
            payload: payload(json!({
                "temperature": 24, "humidity": 60, "rainfall": 110,
                "crop_type": "Rice", "land_size": 2
            })),
        });
        assert_eq!(response.status, 500);
        assert_eq!(response.body, json!({"error": "Failed to predict yield"}));
        Ok(())
    }

    #[test]
    fn out_of_range_precipitation_is_a_weather_failure() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let crop = StubModel::label("Rice");
        let mut engine = engine_with(temp.path(), crop.clone(), StubModel::value(1.0), None, Ok(String::new()));
        engine.weather = Box::new(RawWeather(json!({
            "data": {"values": {"temperature": 25.0, "humidity": 50.0, "precipitationIntensity": 1.0e308}}
        })));

        let response = engine.handle(OperationRequest::GetWeather {
            location: Some("Punjab".to_string()),
        });
        assert_eq!(response.status, 500);
        assert_eq!(response.body, json!({"error": "Failed to fetch weather data"}));

        let response = engine.handle(OperationRequest::RecommendForLocation {
            payload: payload(json!({"location": "Punjab", "ph": 6.5})),
        });
        assert_eq!(response.status, 500);
        assert_eq!(crop.calls(), 0);

        let events = read_events(temp.path())?;
        assert_eq!(events[1]["error_kind"], "weather_unavailable");
        Ok(())
    }

    #[test]
    fn weather_requires_a_location_and_maps_provider_failures() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let engine = engine_with(
            temp.path(),
            StubModel::label("Rice"),
            StubModel::value(1.0),
            None,
            Ok(String::new()),
        );
        let response = engine.handle(OperationRequest::GetWeather { location: None });
        assert_eq!(response.status, 400);
        assert_eq!(response.body, json!({"error": "Invalid or missing field: location"}));

        let response = engine.handle(OperationRequest::GetWeather {
            location: Some("  ".to_string()),
        });
        assert_eq!(response.status, 400);

        let response = engine.handle(OperationRequest::GetWeather {
            location: Some("Punjab".to_string()),
        });
        assert_eq!(response.status, 500);
        assert_eq!(response.body, json!({"error": "Failed to fetch weather data"}));

        let events = read_events(temp.path())?;
        assert_eq!(events[2]["error_kind"], "weather_unavailable");
        assert!(events[2]["cause"]
            .as_str()
            .unwrap_or_default()
            .contains("provider unreachable for Punjab"));
        Ok(())
    }

    #[test]
    fn recommend_for_location_chains_weather_into_the_model() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let engine = engine_with(
            temp.path(),
            StubModel::label("Maize"),
            StubModel::value(1.0),
            Some(WeatherSnapshot {
                temperature: 27.0,
                humidity: 65.0,
                rainfall: 12.0,
            }),
            Ok(String::new()),
        );
        let info = engine.recommend_for_location(Some("Punjab"), 6.8)?;
        assert_eq!(info.name, "Maize");

        let response = engine.handle(OperationRequest::RecommendForLocation {
            payload: payload(json!({"location": "Punjab"})),
        });
        assert_eq!(response.body, json!({"error": "Invalid or missing field: ph"}));
        Ok(())
    }

    #[test]
    fn diagnosis_recovers_fenced_json() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let text = "Here is the result:\n```json\n{\"disease\":\"Blight\",\"duration\":\"2 weeks\",\"causative_agents\":[\"Alternaria solani\"],\"untreated_result\":\"Yield loss\",\"preventive_measures\":[\"Rotate crops\"],\"treatment\":[\"Mancozeb spray\"]}\n```";
        let engine = engine_with(
            temp.path(),
            StubModel::label("Rice"),
            StubModel::value(1.0),
            None,
            Ok(gemini_body(text)),
        );
        let response = engine.handle(OperationRequest::DiagnoseDisease {
            image: Some(b"leaf-photo".to_vec()),
        });
        assert_eq!(response.status, 200);
        assert_eq!(response.body["disease"], "Blight");
        assert_eq!(response.body["treatment"], json!(["Mancozeb spray"]));

        let events = read_events(temp.path())?;
        assert_eq!(events[0]["image_bytes"], 10);
        assert_eq!(events[0]["image_sha256"].as_str().map(str::len), Some(64));
        Ok(())
    }

    #[test]
    fn diagnosis_failures_are_distinguished_in_the_log_only() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let refusal = engine_with(
            temp.path(),
            StubModel::label("Rice"),
            StubModel::value(1.0),
            None,
            Ok(gemini_body("I can't help with that.")),
        );
        let response = refusal.handle(OperationRequest::DiagnoseDisease {
            image: Some(b"leaf".to_vec()),
        });
        assert_eq!(response.status, 500);
        assert_eq!(response.body, json!({"error": "Failed to detect disease"}));

        let unauthorized = engine_with(
            temp.path(),
            StubModel::label("Rice"),
            StubModel::value(1.0),
            None,
            Err(format!("Gemini request failed (400): API key {SECRET} not valid")),
        );
        let response = unauthorized.handle(OperationRequest::DiagnoseDisease {
            image: Some(b"leaf".to_vec()),
        });
        assert_eq!(response.status, 500);

        let response = unauthorized.handle(OperationRequest::DiagnoseDisease { image: None });
        assert_eq!(response.status, 400);
        assert_eq!(response.body, json!({"error": "No image provided"}));

        let events = read_events(temp.path())?;
        assert_eq!(events[0]["error_kind"], "diagnosis_parse_failed");
        assert_eq!(events[1]["error_kind"], "diagnosis_service_unavailable");
        let cause = events[1]["cause"].as_str().unwrap_or_default();
        assert!(cause.contains("[redacted]"));
        assert!(!cause.contains(SECRET));
        assert_eq!(events[2]["error_kind"], "invalid_image");
        Ok(())
    }

    #[test]
    fn non_json_response_body_is_a_parse_failure() {
        let temp = tempfile::tempdir().expect("tempdir");
        let engine = engine_with(
            temp.path(),
            StubModel::label("Rice"),
            StubModel::value(1.0),
            None,
            Ok("<html>gateway</html>".to_string()),
        );
        let err = engine.diagnose_disease(Some(b"leaf")).unwrap_err();
        assert!(matches!(err, PredictionError::DiagnosisParseFailed(_)));
    }

    #[test]
    fn from_config_fails_clearly_without_model_artifacts() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let config = EngineConfig {
            crop_model_path: temp.path().join("missing.json"),
            ..EngineConfig::default()
        };
        let err = AgrisenseEngine::from_config(&config)
            .err()
            .map(|err| format!("{err:#}"))
            .unwrap_or_default();
        assert!(err.starts_with("crop recommendation model unavailable"));
        Ok(())
    }

    #[test]
    fn from_config_announces_missing_keys() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let crop = temp.path().join("crop.json");
        let yield_path = temp.path().join("yield.json");
        fs::write(
            &crop,
            r#"{"kind":"forest_classifier","name":"crop-v1","n_features":4,"classes":["Rice"],"trees":[{"node":"leaf","value":0}]}"#,
        )?;
        fs::write(
            &yield_path,
            r#"{"kind":"linear_regressor","name":"yield-v1","coefficients":[0.1,0.1,0.1,1.0,2.0],"intercept":0.0}"#,
        )?;
        let config = EngineConfig {
            crop_model_path: crop,
            yield_model_path: yield_path,
            events_path: Some(temp.path().join("events.jsonl")),
            tomorrow_api_key: Some("tomorrow-key".to_string()),
            ..EngineConfig::default()
        };
        let engine = AgrisenseEngine::from_config(&config)?;
        let events = read_events(temp.path())?;
        assert_eq!(events[0]["type"], "engine_ready");
        assert_eq!(events[0]["missing_keys"], json!(["GEMINI_API_KEY"]));
        assert_eq!(events[0]["crop_model"], "crop-v1");

        let prediction = engine.predict_yield(&agrisense_contracts::YieldInput {
            temperature: 10.0,
            humidity: 20.0,
            rainfall: 30.0,
            crop_type: "maize".to_string(),
            land_size: 1.5,
        })?;
        assert_eq!(prediction.predicted_yield, 11.0);
        Ok(())
    }
}
