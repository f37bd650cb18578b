use serde::{Deserialize, Serialize};

/// One bounding box from the detection model. `x`/`y` are the box center;
/// `confidence` is in [0, 1]. Unknown fields in the remote payload are
/// ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(rename = "class")]
    pub label: String,
    pub confidence: f32,
}

/// The inference response, kept both raw (returned verbatim to the caller)
/// and as typed detections (used for drawing and the report).
#[derive(Debug, Clone)]
pub struct InferenceOutcome {
    pub raw: serde_json::Value,
    pub detections: Vec<Detection>,
}
