use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use tracing::warn;

use crate::service::{GenerationParams, RetryPolicy};

/// Which generation backend the binary wires up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Gemini,
    Ollama,
}

impl Backend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gemini" => Some(Self::Gemini),
            "ollama" => Some(Self::Ollama),
            _ => None,
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Self::Gemini => "gemini-2.0-flash",
            Self::Ollama => "llama3.1",
        }
    }
}

/// Full application configuration. Process env wins over `.env`.
#[derive(Debug, Clone)]
pub struct Config {
    pub backend: Backend,
    pub model: String,
    /// Gemini only. Empty means every call reports the service unavailable.
    pub api_key: String,
    pub gemini_base_url: String,
    pub ollama_base_url: String,

    // Retry / timeouts
    pub timeout_s: u64,
    pub max_attempts: u32,
    pub backoff_ms: u64,
    pub max_backoff_ms: u64,

    // Generation
    pub concurrency: usize,
    pub temperature: f32,
    pub max_tokens: u32,

    // Web API
    pub web_bind: String,
    pub web_port: u16,
}

fn parse_dotenv(path: &Path) -> HashMap<String, String> {
    let mut map = HashMap::new();
    let Ok(contents) = std::fs::read_to_string(path) else {
        return map;
    };
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            let v = v.trim().trim_matches('"');
            map.insert(k.trim().to_string(), v.to_string());
        }
    }
    map
}

fn get(key: &str, dotenv: &HashMap<String, String>) -> Option<String> {
    std::env::var(key)
        .ok()
        .or_else(|| dotenv.get(key).cloned())
        .filter(|v| !v.trim().is_empty())
}

fn get_str(key: &str, dotenv: &HashMap<String, String>, default: &str) -> String {
    get(key, dotenv).unwrap_or_else(|| default.to_string())
}

fn get_u32(key: &str, dotenv: &HashMap<String, String>, default: u32) -> u32 {
    get(key, dotenv)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn get_u64(key: &str, dotenv: &HashMap<String, String>, default: u64) -> u64 {
    get(key, dotenv)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn get_u16(key: &str, dotenv: &HashMap<String, String>, default: u16) -> u16 {
    get(key, dotenv)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn get_f32(key: &str, dotenv: &HashMap<String, String>, default: f32) -> f32 {
    get(key, dotenv)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load from the process environment and `./.env`.
    pub fn from_env() -> Self {
        Self::from_dotenv_file(Path::new(".env"))
    }

    /// Load from the process environment and the given dotenv file. A missing
    /// file is the same as an empty one.
    pub fn from_dotenv_file(path: &Path) -> Self {
        let dotenv = parse_dotenv(path);

        let backend = match get("GENERATION_BACKEND", &dotenv) {
            None => Backend::Gemini,
            Some(raw) => Backend::parse(&raw).unwrap_or_else(|| {
                warn!(value = %raw, "unknown GENERATION_BACKEND, using gemini");
                Backend::Gemini
            }),
        };

        Self {
            backend,
            model: get_str("GENERATION_MODEL", &dotenv, backend.default_model()),
            api_key: get_str("GOOGLE_GENERATIVE_AI_API_KEY", &dotenv, ""),
            gemini_base_url: get_str(
                "GEMINI_BASE_URL",
                &dotenv,
                "https://generativelanguage.googleapis.com",
            ),
            ollama_base_url: get_str("OLLAMA_BASE_URL", &dotenv, "http://localhost:11434"),
            timeout_s: get_u64("GENERATION_TIMEOUT_S", &dotenv, 60),
            max_attempts: get_u32("GENERATION_MAX_ATTEMPTS", &dotenv, 3),
            backoff_ms: get_u64("GENERATION_BACKOFF_MS", &dotenv, 500),
            max_backoff_ms: get_u64("GENERATION_MAX_BACKOFF_MS", &dotenv, 8_000),
            concurrency: get_u32("GENERATION_CONCURRENCY", &dotenv, 4).max(1) as usize,
            temperature: get_f32("GENERATION_TEMPERATURE", &dotenv, 0.7),
            max_tokens: get_u32("GENERATION_MAX_TOKENS", &dotenv, 2048),
            web_bind: get_str("WEB_BIND", &dotenv, "127.0.0.1"),
            web_port: get_u16("WEB_PORT", &dotenv, 3131),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            initial_backoff: Duration::from_millis(self.backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms.max(self.backoff_ms)),
            call_timeout: Duration::from_secs(self.timeout_s.max(1)),
        }
    }

    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.web_bind, self.web_port)
    }
}
