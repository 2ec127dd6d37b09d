pub mod gemini;
pub mod ollama;

use std::sync::Arc;
use std::time::Duration;

use appeal_core::config::{Backend, Config};
use appeal_core::{GenerationService, ServiceError};
use reqwest::StatusCode;
use tracing::{info, warn};

pub use gemini::GeminiBackend;
pub use ollama::OllamaBackend;

/// Build the backend named by `GENERATION_BACKEND`.
pub fn from_config(config: &Config) -> Arc<dyn GenerationService> {
    match config.backend {
        Backend::Gemini => {
            if config.api_key.is_empty() {
                warn!("GOOGLE_GENERATIVE_AI_API_KEY not set, generation will run degraded");
            }
            info!(model = %config.model, "using gemini backend");
            Arc::new(
                GeminiBackend::new(config.api_key.clone(), config.model.clone())
                    .with_base_url(config.gemini_base_url.clone())
                    .with_timeout(config.timeout_s),
            )
        },
        Backend::Ollama => {
            info!(
                model = %config.model,
                base_url = %config.ollama_base_url,
                "using ollama backend"
            );
            Arc::new(
                OllamaBackend::new(config.ollama_base_url.clone(), config.model.clone())
                    .with_timeout(config.timeout_s),
            )
        },
    }
}

/// 429 means quota; every other failure status is treated as an outage.
pub(crate) fn classify_status(status: StatusCode, body: &str) -> ServiceError {
    let detail = format!("{status}: {}", truncate(body, 200));
    if status == StatusCode::TOO_MANY_REQUESTS {
        ServiceError::QuotaExceeded(detail)
    } else {
        ServiceError::Unavailable(detail)
    }
}

pub(crate) fn classify_send_error(e: &reqwest::Error, timeout_secs: u64) -> ServiceError {
    if e.is_timeout() {
        ServiceError::Timeout(Duration::from_secs(timeout_secs))
    } else {
        ServiceError::Unavailable(e.to_string())
    }
}

pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client, ServiceError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ServiceError::Unavailable(format!("http client: {e}")))
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
