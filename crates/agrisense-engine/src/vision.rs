use std::time::Duration;

use agrisense_contracts::PredictionError;
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::config::EngineConfig;
use crate::http::response_text_or_error;

const FALLBACK_IMAGE_MIME: &str = "image/jpeg";

/// Image bytes in the text-safe form the vision endpoint accepts.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub mime_type: String,
    pub data: String,
    pub byte_len: usize,
    pub sha256: String,
}

pub fn encode_image(bytes: Option<&[u8]>) -> Result<EncodedImage, PredictionError> {
    let Some(bytes) = bytes else {
        return Err(PredictionError::InvalidImage("no image provided".to_string()));
    };
    if bytes.is_empty() {
        return Err(PredictionError::InvalidImage("image is empty".to_string()));
    }
    let mime_type = image::guess_format(bytes)
        .map(|format| format.to_mime_type().to_string())
        .unwrap_or_else(|_| FALLBACK_IMAGE_MIME.to_string());
    Ok(EncodedImage {
        mime_type,
        data: BASE64.encode(bytes),
        byte_len: bytes.len(),
        sha256: image_digest(bytes),
    })
}

/// Hex SHA-256 of the raw bytes; the only form in which an image reaches the log.
fn image_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[derive(Debug, Clone)]
pub struct VisionRequest {
    pub instruction: String,
    pub image: EncodedImage,
}

pub trait VisionProvider: Send + Sync {
    fn name(&self) -> &str;
    /// Returns the raw response body of a successful call.
    fn generate(&self, request: &VisionRequest) -> Result<String>;
}

pub struct GeminiVisionProvider {
    api_base: String,
    api_key: Option<String>,
    model: String,
    timeout: Duration,
    http: HttpClient,
}

impl GeminiVisionProvider {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            api_base: config.gemini_api_base.clone(),
            api_key: config.gemini_api_key.clone(),
            model: config.gemini_model.clone(),
            timeout: config.diagnosis_timeout,
            http: HttpClient::new(),
        }
    }

    fn endpoint_for_model(&self) -> String {
        let trimmed = self.model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    pub fn build_payload(request: &VisionRequest) -> Value {
        json!({
            "contents": [{
                "parts": [
                    {"text": request.instruction},
                    {
                        "inlineData": {
                            "mimeType": request.image.mime_type,
                            "data": request.image.data,
                        }
                    }
                ]
            }]
        })
    }
}

impl VisionProvider for GeminiVisionProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate(&self, request: &VisionRequest) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .context("GEMINI_API_KEY or GOOGLE_API_KEY not set")?;
        let endpoint = self.endpoint_for_model();
        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", api_key)])
            .timeout(self.timeout)
            .json(&Self::build_payload(request))
            .send()
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("Gemini request failed ({})", self.model))?;
        response_text_or_error("Gemini", response)
    }
}
