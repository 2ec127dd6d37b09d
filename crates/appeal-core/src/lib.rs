pub mod analyzer;
pub mod angles;
pub mod config;
pub mod error;
pub mod generator;
pub mod jurisdictions;
pub mod prompt;
pub mod service;
pub mod types;
pub mod workflow;

pub use error::{AppealError, ServiceError};
pub use service::{GenerationParams, GenerationService, RetryPolicy};
pub use types::*;
pub use workflow::{AppealRun, Orchestrator};
