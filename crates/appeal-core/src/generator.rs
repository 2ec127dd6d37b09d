use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::prompt;
use crate::service::{
    complete_with_retry, Completion, CompletionFailure, GenerationParams, GenerationService,
    RetryPolicy,
};
use crate::types::{
    AppealAngle, AppealDocument, CitationCase, DocumentStatus, FollowUpAnswer,
    GenerationMetadata, GenerationScope, JurisdictionRule, COMPREHENSIVE_KEY,
};

pub const COMPREHENSIVE_NAME: &str = "Comprehensive Appeal";

/// Turns an analyzed case into appeal letters. Per-angle calls run on a
/// bounded `JoinSet`; the comprehensive letter is always written last.
pub struct Generator {
    service: Arc<dyn GenerationService>,
    policy: RetryPolicy,
    params: GenerationParams,
    concurrency: usize,
}

impl Generator {
    pub fn new(
        service: Arc<dyn GenerationService>,
        policy: RetryPolicy,
        params: GenerationParams,
    ) -> Self {
        Self {
            service,
            policy,
            params,
            concurrency: 4,
        }
    }

    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }

    /// Documents in `angles` order followed by the comprehensive document.
    /// Failures become `failed` documents and never abort siblings.
    pub async fn generate(
        &self,
        case: &CitationCase,
        angles: &[&'static AppealAngle],
        jurisdiction: &JurisdictionRule,
        answers: &[FollowUpAnswer],
        scope: GenerationScope,
    ) -> Vec<AppealDocument> {
        let mut documents = match scope {
            GenerationScope::Full => {
                self.generate_individual(case, angles, jurisdiction, answers).await
            },
            GenerationScope::ComprehensiveOnly => Vec::new(),
        };

        let drafts: Vec<(&str, &str)> = documents
            .iter()
            .filter(|d| d.is_generated())
            .map(|d| (d.name.as_str(), d.text.as_str()))
            .collect();
        let prompt = prompt::comprehensive_prompt(case, jurisdiction, angles, answers, &drafts);
        let outcome = complete_with_retry(
            self.service.as_ref(),
            &prompt,
            &self.params,
            &self.policy,
            COMPREHENSIVE_KEY,
        )
        .await;
        let comprehensive =
            to_document(COMPREHENSIVE_KEY, COMPREHENSIVE_NAME, outcome, self.service.model());
        info!(
            citation = %case.citation_number,
            status = ?comprehensive.status,
            attempts = comprehensive.metadata.attempts,
            "comprehensive appeal finished"
        );
        documents.push(comprehensive);
        documents
    }

    async fn generate_individual(
        &self,
        case: &CitationCase,
        angles: &[&'static AppealAngle],
        jurisdiction: &JurisdictionRule,
        answers: &[FollowUpAnswer],
    ) -> Vec<AppealDocument> {
        let case = Arc::new(case.clone());
        let rule = Arc::new(jurisdiction.clone());
        let answers: Arc<[FollowUpAnswer]> = answers.into();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));

        let mut set = JoinSet::new();
        for (idx, angle) in angles.iter().copied().enumerate() {
            let service = Arc::clone(&self.service);
            let semaphore = Arc::clone(&semaphore);
            let case = Arc::clone(&case);
            let rule = Arc::clone(&rule);
            let answers = Arc::clone(&answers);
            let params = self.params.clone();
            let policy = self.policy.clone();
            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let prompt = prompt::angle_prompt(&case, &rule, angle, &answers);
                let outcome =
                    complete_with_retry(service.as_ref(), &prompt, &params, &policy, angle.key)
                        .await;
                (idx, outcome)
            });
        }

        let model = self.service.model().to_string();
        let mut slots: Vec<Option<AppealDocument>> = vec![None; angles.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, outcome)) => {
                    if let (Some(slot), Some(angle)) = (slots.get_mut(idx), angles.get(idx)) {
                        let doc = to_document(angle.key, angle.name, outcome, &model);
                        info!(
                            angle = %angle.key,
                            status = ?doc.status,
                            attempts = doc.metadata.attempts,
                            "angle appeal finished"
                        );
                        *slot = Some(doc);
                    }
                },
                Err(e) => warn!("angle generation task failed: {e}"),
            }
        }

        slots
            .into_iter()
            .zip(angles)
            .map(|(slot, angle)| {
                slot.unwrap_or_else(|| {
                    failed_document(
                        angle.key,
                        angle.name,
                        "generation task did not complete",
                        0,
                        &model,
                    )
                })
            })
            .collect()
    }
}

fn to_document(
    key: &str,
    name: &str,
    outcome: Result<Completion, CompletionFailure>,
    model: &str,
) -> AppealDocument {
    match outcome {
        Ok(done) => AppealDocument {
            key: key.to_string(),
            name: name.to_string(),
            text: done.text,
            status: DocumentStatus::Generated,
            error: None,
            metadata: GenerationMetadata {
                model: model.to_string(),
                generated_at: Utc::now(),
                attempts: done.attempts,
            },
        },
        Err(failure) => {
            failed_document(key, name, &failure.error.to_string(), failure.attempts, model)
        },
    }
}

fn failed_document(
    key: &str,
    name: &str,
    error: &str,
    attempts: u32,
    model: &str,
) -> AppealDocument {
    AppealDocument {
        key: key.to_string(),
        name: name.to_string(),
        text: format!("[{name} unavailable: {error}]"),
        status: DocumentStatus::Failed,
        error: Some(error.to_string()),
        metadata: GenerationMetadata {
            model: model.to_string(),
            generated_at: Utc::now(),
            attempts,
        },
    }
}
