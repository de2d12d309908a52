use thiserror::Error;

/// Which side of the request a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Client,
    Server,
}

impl ErrorClass {
    pub fn status_code(self) -> u16 {
        match self {
            ErrorClass::Client => 400,
            ErrorClass::Server => 500,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorClass::Client => "client",
            ErrorClass::Server => "server",
        }
    }
}

#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("invalid field '{field}': {reason}")]
    Validation { field: String, reason: String },

    #[error("unsupported crop type '{0}'")]
    UnsupportedCropType(String),

    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("weather provider unavailable")]
    WeatherUnavailable(#[source] anyhow::Error),

    #[error("diagnosis service unavailable")]
    DiagnosisServiceUnavailable(#[source] anyhow::Error),

    #[error("diagnosis response could not be parsed: {0}")]
    DiagnosisParseFailed(String),

    #[error("model prediction failed")]
    PredictionFailed(#[source] anyhow::Error),
}

impl PredictionError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            PredictionError::Validation { .. }
            | PredictionError::UnsupportedCropType(_)
            | PredictionError::InvalidImage(_) => ErrorClass::Client,
            PredictionError::WeatherUnavailable(_)
            | PredictionError::DiagnosisServiceUnavailable(_)
            | PredictionError::DiagnosisParseFailed(_)
            | PredictionError::PredictionFailed(_) => ErrorClass::Server,
        }
    }

    pub fn status_code(&self) -> u16 {
        self.class().status_code()
    }

    /// Stable snake_case identifier used in the event log.
    pub fn kind(&self) -> &'static str {
        match self {
            PredictionError::Validation { .. } => "validation_error",
            PredictionError::UnsupportedCropType(_) => "unsupported_crop_type",
            PredictionError::InvalidImage(_) => "invalid_image",
            PredictionError::WeatherUnavailable(_) => "weather_unavailable",
            PredictionError::DiagnosisServiceUnavailable(_) => "diagnosis_service_unavailable",
            PredictionError::DiagnosisParseFailed(_) => "diagnosis_parse_failed",
            PredictionError::PredictionFailed(_) => "prediction_failed",
        }
    }

    /// Full cause chain, outermost first.
    pub fn chain_text(&self) -> Vec<String> {
        let mut parts = Vec::new();
        let mut current: Option<&(dyn std::error::Error + 'static)> = Some(self);
        while let Some(err) = current {
            let text = err.to_string();
            let trimmed = text.trim();
            if !trimmed.is_empty() && parts.last().map(String::as_str) != Some(trimmed) {
                parts.push(trimmed.to_string());
            }
            current = err.source();
        }
        parts
    }
}
