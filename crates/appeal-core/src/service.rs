use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, warn};

use crate::error::ServiceError;

/// Sampling knobs forwarded to the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2048,
        }
    }
}

/// Request/response contract with an external text-generation model.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Model identifier recorded in document metadata.
    fn model(&self) -> &str;

    async fn complete(&self, prompt: &str, params: &GenerationParams)
        -> Result<String, ServiceError>;
}

/// Bounded exponential backoff with jitter, plus a per-call timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            call_timeout: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after the `failed_attempt`-th failure (1-based).
    /// Half of the capped exponential delay is fixed, the other half is random.
    pub fn backoff(&self, failed_attempt: u32) -> Duration {
        let exp = failed_attempt.saturating_sub(1).min(16);
        let base = self
            .initial_backoff
            .saturating_mul(1u32 << exp)
            .min(self.max_backoff);
        let half_ms = (base.as_millis() / 2) as u64;
        let jitter = if half_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=half_ms)
        };
        Duration::from_millis(half_ms + jitter)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionFailure {
    pub error: ServiceError,
    pub attempts: u32,
}

/// Call the service until it succeeds, a non-retryable error comes back, or
/// the policy's attempts run out. `label` only tags log lines.
pub async fn complete_with_retry(
    service: &dyn GenerationService,
    prompt: &str,
    params: &GenerationParams,
    policy: &RetryPolicy,
    label: &str,
) -> Result<Completion, CompletionFailure> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        let outcome = match tokio::time::timeout(
            policy.call_timeout,
            service.complete(prompt, params),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ServiceError::Timeout(policy.call_timeout)),
        };

        match outcome {
            Ok(text) => {
                debug!(label, attempt, model = service.model(), "generation call succeeded");
                return Ok(Completion {
                    text,
                    attempts: attempt,
                });
            },
            Err(error) if !error.is_retryable() || attempt >= max_attempts => {
                warn!(label, attempt, model = service.model(), "generation call gave up: {error}");
                return Err(CompletionFailure {
                    error,
                    attempts: attempt,
                });
            },
            Err(error) => {
                let delay = policy.backoff(attempt);
                warn!(
                    label,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "generation call failed, retrying: {error}"
                );
                tokio::time::sleep(delay).await;
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(400),
            call_timeout: Duration::from_secs(1),
        };
        for attempt in 1..=10 {
            assert!(policy.backoff(attempt) <= Duration::from_millis(400));
        }
    }

    #[test]
    fn backoff_grows_with_attempts() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            call_timeout: Duration::from_secs(1),
        };
        // Lower bound is half the exponential step.
        assert!(policy.backoff(1) >= Duration::from_millis(50));
        assert!(policy.backoff(3) >= Duration::from_millis(200));
        assert!(policy.backoff(3) <= Duration::from_millis(400));
    }

    #[test]
    fn zero_backoff_has_no_jitter() {
        let policy = RetryPolicy {
            initial_backoff: Duration::ZERO,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff(4), Duration::ZERO);
    }
}
