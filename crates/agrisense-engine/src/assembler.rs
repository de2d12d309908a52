use agrisense_contracts::PredictionError;
use serde::Serialize;
use serde_json::{json, Map, Value};

/// The top-level operations a caller can invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    DiagnoseDisease,
    GetWeather,
    RecommendCrop,
    RecommendForLocation,
    PredictYield,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::DiagnoseDisease => "diagnose_disease",
            Operation::GetWeather => "get_weather",
            Operation::RecommendCrop => "recommend_crop",
            Operation::RecommendForLocation => "recommend_for_location",
            Operation::PredictYield => "predict_yield",
        }
    }

    /// Caller-facing message for a failure. Never includes the cause.
    pub fn public_message(self, err: &PredictionError) -> String {
        match err {
            PredictionError::Validation { field, .. } => {
                format!("Invalid or missing field: {field}")
            }
            PredictionError::UnsupportedCropType(_) => "Unsupported crop type".to_string(),
            PredictionError::InvalidImage(_) => "No image provided".to_string(),
            PredictionError::WeatherUnavailable(_) => "Failed to fetch weather data".to_string(),
            PredictionError::DiagnosisServiceUnavailable(_)
            | PredictionError::DiagnosisParseFailed(_)
            | PredictionError::PredictionFailed(_) => match self {
                Operation::DiagnoseDisease => "Failed to detect disease",
                Operation::GetWeather => "Failed to fetch weather data",
                Operation::RecommendCrop | Operation::RecommendForLocation => "Prediction failed",
                Operation::PredictYield => "Failed to predict yield",
            }
            .to_string(),
        }
    }
}

/// Inbound request as handed over by the routing collaborator.
#[derive(Debug, Clone)]
pub enum OperationRequest {
    DiagnoseDisease { image: Option<Vec<u8>> },
    GetWeather { location: Option<String> },
    RecommendCrop { payload: Map<String, Value> },
    RecommendForLocation { payload: Map<String, Value> },
    PredictYield { payload: Map<String, Value> },
}

impl OperationRequest {
    pub fn operation(&self) -> Operation {
        match self {
            OperationRequest::DiagnoseDisease { .. } => Operation::DiagnoseDisease,
            OperationRequest::GetWeather { .. } => Operation::GetWeather,
            OperationRequest::RecommendCrop { .. } => Operation::RecommendCrop,
            OperationRequest::RecommendForLocation { .. } => Operation::RecommendForLocation,
            OperationRequest::PredictYield { .. } => Operation::PredictYield,
        }
    }
}

/// Outward result: an HTTP-equivalent status and a JSON body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationResponse {
    pub status: u16,
    pub body: Value,
}

impl OperationResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn failure(operation: Operation, err: &PredictionError) -> Self {
        Self {
            status: err.status_code(),
            body: json!({ "error": operation.public_message(err) }),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }
}

/// Serializes a successful outcome; a serialization failure is treated as a prediction failure.
pub fn success_body<T: Serialize>(value: &T) -> Result<Value, PredictionError> {
    serde_json::to_value(value)
        .map_err(|err| PredictionError::PredictionFailed(anyhow::Error::new(err)))
}
