use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde_json::json;

/// Everything that can go wrong between upload and response, kept as distinct
/// variants so callers can tell a bad upload from a decoder failure from a
/// remote inference outage.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("only .dcm or .rvg files are allowed (got {0:?})")]
    UnsupportedExtension(String),
    #[error("no file field found in the upload")]
    MissingFile,
    #[error("failed to decode DICOM: {0}")]
    Decode(String),
    #[error("generated PNG image is empty (0 bytes)")]
    EmptyImage,
    #[error("inference service error: {0}")]
    Inference(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::UnsupportedExtension(_) => "unsupported-extension",
            PipelineError::MissingFile => "missing-file",
            PipelineError::Decode(_) => "decode-error",
            PipelineError::EmptyImage => "empty-image",
            PipelineError::Inference(_) => "inference-error",
            PipelineError::Io(_) => "io-error",
        }
    }
}

impl actix_web::ResponseError for PipelineError {
    fn status_code(&self) -> StatusCode {
        match self {
            PipelineError::UnsupportedExtension(_) | PipelineError::MissingFile => {
                StatusCode::BAD_REQUEST
            }
            PipelineError::Inference(_) => StatusCode::BAD_GATEWAY,
            PipelineError::Decode(_)
            | PipelineError::EmptyImage
            | PipelineError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": {
                "kind": self.kind(),
                "message": self.to_string(),
            }
        }))
    }
}

// web::block wraps the closure's error in a BlockingError.
impl From<actix_web::error::BlockingError> for PipelineError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        PipelineError::Io(std::io::Error::other(err.to_string()))
    }
}
