#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use appeal_core::{CitationCase, GenerationParams, GenerationService, RetryPolicy, ServiceError};
use async_trait::async_trait;

/// How the stub answers a prompt.
pub enum Script {
    /// Always succeed.
    Echo,
    /// Always fail with this error.
    Fail(ServiceError),
    /// Fail the first `n` calls, then succeed.
    FailFirst(u32, ServiceError),
    /// Never return for prompts containing the marker.
    HangOn(&'static str),
    /// Fail prompts containing the marker.
    FailOn(&'static str, ServiceError),
    /// Succeed after sleeping.
    Slow(Duration),
}

pub struct StubService {
    script: Script,
    calls: AtomicU32,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl StubService {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicU32::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// The prompt that asked for the comprehensive letter, if any.
    pub fn comprehensive_prompt(&self) -> Option<String> {
        self.prompts()
            .into_iter()
            .find(|p| p.contains("comprehensive appeal letter"))
    }
}

#[async_trait]
impl GenerationService for StubService {
    fn model(&self) -> &str {
        "stub-model"
    }

    async fn complete(&self, prompt: &str, _params: &GenerationParams) -> Result<String, ServiceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.prompts.lock().unwrap().push(prompt.to_string());
        match &self.script {
            Script::Echo => Ok(format!("generated text #{call}")),
            Script::Fail(e) => Err(e.clone()),
            Script::FailFirst(n, e) => {
                if call <= *n {
                    Err(e.clone())
                } else {
                    Ok(format!("generated text #{call}"))
                }
            },
            Script::HangOn(marker) => {
                if prompt.contains(marker) {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                }
                Ok(format!("generated text #{call}"))
            },
            Script::FailOn(marker, e) => {
                if prompt.contains(marker) {
                    Err(e.clone())
                } else {
                    Ok(format!("generated text #{call}"))
                }
            },
            Script::Slow(delay) => {
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_in_flight.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(*delay).await;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(format!("generated text #{call}"))
            },
        }
    }
}

pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(4),
        call_timeout: Duration::from_millis(200),
    }
}

/// A valid case with no flags set.
pub fn case(state: &str, city: Option<&str>) -> CitationCase {
    CitationCase {
        citation_number: "C-1001".into(),
        citation_date: "2024-05-01".into(),
        location: "400 Main St".into(),
        violation_type: "Expired meter".into(),
        state: state.into(),
        city: city.map(Into::into),
        ..Default::default()
    }
}
