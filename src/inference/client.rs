use log::error;
use reqwest::multipart;
use serde_json::Value;

use crate::config::AppConfig;
use crate::error::PipelineError;
use crate::inference::model::{Detection, InferenceOutcome};

/// Client for the hosted detection endpoint:
/// `POST {base_url}/{model_id}?api_key=...&confidence=...&overlap=...` with a
/// multipart PNG body. Carries a bounded request timeout; no retries.
#[derive(Clone)]
pub struct InferenceClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    confidence: f32,
    overlap: f32,
}

impl InferenceClient {
    pub fn new(config: &AppConfig) -> Result<Self, PipelineError> {
        let http = reqwest::Client::builder()
            .timeout(config.inference_timeout)
            .build()
            .map_err(|e| PipelineError::Inference(e.to_string()))?;
        let endpoint = format!(
            "{}/{}",
            config.inference_base_url.trim_end_matches('/'),
            config.roboflow_model_id
        );
        Ok(Self {
            http,
            endpoint,
            api_key: config.roboflow_api_key.clone(),
            confidence: config.confidence_threshold,
            overlap: config.overlap_threshold,
        })
    }

    pub async fn detect(
        &self,
        file_name: &str,
        png_bytes: Vec<u8>,
    ) -> Result<InferenceOutcome, PipelineError> {
        let part = multipart::Part::bytes(png_bytes)
            .file_name(file_name.to_string())
            .mime_str("image/png")
            .map_err(|e| PipelineError::Inference(e.to_string()))?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(&self.endpoint)
            .query(&[
                ("api_key", self.api_key.clone()),
                ("confidence", self.confidence.to_string()),
                ("overlap", self.overlap.to_string()),
            ])
            .multipart(form)
            .send()
            .await
            .map_err(|e| PipelineError::Inference(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PipelineError::Inference(e.to_string()))?;
        if !status.is_success() {
            error!("inference API returned {status}: {body}");
            return Err(PipelineError::Inference(format!(
                "inference API returned {status}: {body}"
            )));
        }

        let raw: Value = serde_json::from_str(&body)
            .map_err(|e| PipelineError::Inference(format!("unparseable response: {e}")))?;
        let detections = parse_detections(&raw)?;
        Ok(InferenceOutcome { raw, detections })
    }
}

/// A missing `predictions` key means "no detections", not an error; a present
/// but malformed one is a remote-contract violation and surfaces as such.
fn parse_detections(raw: &Value) -> Result<Vec<Detection>, PipelineError> {
    match raw.get("predictions") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(preds) => serde_json::from_value::<Vec<Detection>>(preds.clone())
            .map_err(|e| PipelineError::Inference(format!("bad predictions payload: {e}"))),
    }
}
