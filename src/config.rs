use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
    #[error("invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}

/// Runtime configuration, collected once at startup from the environment
/// (`.env` supported via dotenv). Inference credentials and CORS origins are
/// deployment-scoped values, never compiled-in constants.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub roboflow_api_key: String,
    pub roboflow_model_id: String,
    pub inference_base_url: String,
    pub confidence_threshold: f32,
    pub overlap_threshold: f32,
    pub inference_timeout: Duration,
    pub upload_dir: PathBuf,
    pub converted_dir: PathBuf,
    pub allowed_origins: Vec<String>,
    /// TTL for files under the artifact directories; zero disables the sweep.
    pub artifact_ttl: Duration,
    pub sweep_interval: Duration,
    pub label_font_path: Option<PathBuf>,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let roboflow_api_key = require("ROBOFLOW_API_KEY")?;
        let roboflow_model_id = require("ROBOFLOW_MODEL_ID")?;

        let inference_base_url = env::var("INFERENCE_BASE_URL")
            .unwrap_or_else(|_| "https://detect.roboflow.com".to_string());

        let confidence_threshold = parse_var("INFERENCE_CONFIDENCE", 0.3f32)?;
        let overlap_threshold = parse_var("INFERENCE_OVERLAP", 0.5f32)?;
        let inference_timeout =
            Duration::from_secs(parse_var("INFERENCE_TIMEOUT_SECS", 30u64)?);

        let upload_dir =
            PathBuf::from(env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()));
        let converted_dir =
            PathBuf::from(env::var("CONVERTED_DIR").unwrap_or_else(|_| "converted".to_string()));

        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000,http://127.0.0.1:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let artifact_ttl =
            Duration::from_secs(parse_var("ARTIFACT_TTL_HOURS", 24u64)? * 3600);
        let sweep_interval =
            Duration::from_secs(parse_var("SWEEP_INTERVAL_SECS", 3600u64)?);

        let label_font_path = env::var("LABEL_FONT_PATH").ok().map(PathBuf::from);
        let port = parse_var("PORT", 8000u16)?;

        Ok(Self {
            roboflow_api_key,
            roboflow_model_id,
            inference_base_url,
            confidence_threshold,
            overlap_threshold,
            inference_timeout,
            upload_dir,
            converted_dir,
            allowed_origins,
            artifact_ttl,
            sweep_interval,
            label_font_path,
            port,
        })
    }
}

fn require(var: &'static str) -> Result<String, ConfigError> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingVar(var)),
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { var, value: raw }),
        Err(_) => Ok(default),
    }
}
