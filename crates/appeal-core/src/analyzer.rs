use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};

use crate::angles;
use crate::error::Result;
use crate::jurisdictions;
use crate::prompt;
use crate::service::{complete_with_retry, GenerationParams, GenerationService, RetryPolicy};
use crate::types::{
    AnalysisResult, AnalysisStatus, AngleStrength, AppealAngle, CitationCase, FollowUpQuestion,
};

/// Most questions kept from a follow-up suggestion response.
pub const MAX_SUGGESTED_QUESTIONS: usize = 5;

/// Produces the analysis for one case: angles, jurisdiction, strength text
/// and follow-up questions.
pub struct Analyzer {
    service: Arc<dyn GenerationService>,
    policy: RetryPolicy,
    params: GenerationParams,
}

impl Analyzer {
    pub fn new(
        service: Arc<dyn GenerationService>,
        policy: RetryPolicy,
        params: GenerationParams,
    ) -> Self {
        Self {
            service,
            policy,
            params,
        }
    }

    /// Validates first; a service failure degrades the analysis text only.
    pub async fn analyze(&self, case: &CitationCase) -> Result<AnalysisResult> {
        case.validate()?;

        let jurisdiction = jurisdictions::resolve(&case.state, case.city.as_deref()).clone();
        let matched = angles::match_angles(case);
        info!(
            citation = %case.citation_number,
            jurisdiction = %jurisdiction.display_name(),
            angles = matched.len(),
            "analyzing case"
        );

        let prompt = prompt::analysis_prompt(case, &jurisdiction, &matched);
        let (analysis, status) = match complete_with_retry(
            self.service.as_ref(),
            &prompt,
            &self.params,
            &self.policy,
            "analysis",
        )
        .await
        {
            Ok(done) => (done.text, AnalysisStatus::Generated),
            Err(failure) => {
                warn!(
                    citation = %case.citation_number,
                    attempts = failure.attempts,
                    "analysis degraded: {}",
                    failure.error
                );
                (
                    format!("[analysis unavailable: {}]", failure.error),
                    AnalysisStatus::Degraded,
                )
            },
        };

        Ok(AnalysisResult {
            angle_keys: matched.iter().map(|a| a.key.to_string()).collect(),
            strengths: strengths(case, &matched),
            questions: merge_questions(case, &matched),
            jurisdiction,
            analysis,
            status,
        })
    }

    /// Ask the service for extra questions for one angle. Empty when the
    /// service cannot answer.
    pub async fn suggest_questions(&self, case: &CitationCase, angle: &AppealAngle) -> Vec<String> {
        let prompt = prompt::follow_up_prompt(case, angle);
        let label = format!("questions:{}", angle.key);
        let outcome =
            complete_with_retry(self.service.as_ref(), &prompt, &self.params, &self.policy, &label)
                .await;
        match outcome {
            Ok(done) => parse_numbered_questions(&done.text),
            Err(failure) => {
                warn!(angle = %angle.key, "no follow-up suggestions: {}", failure.error);
                Vec::new()
            },
        }
    }
}

pub fn strengths(case: &CitationCase, matched: &[&AppealAngle]) -> Vec<AngleStrength> {
    matched
        .iter()
        .map(|a| AngleStrength {
            angle: a.key.to_string(),
            strength: angles::evidence_strength(a, &case.evidence),
        })
        .collect()
}

/// Rendered questions of every matched angle, angle order then template
/// order, first occurrence wins.
pub fn merge_questions(case: &CitationCase, matched: &[&AppealAngle]) -> Vec<FollowUpQuestion> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for angle in matched {
        for question in angle.render_questions(case) {
            if seen.insert(question.to_lowercase()) {
                out.push(FollowUpQuestion {
                    angle: angle.key.to_string(),
                    question,
                });
            }
        }
    }
    out
}

/// "1. Foo?\n2) Bar?" → ["Foo?", "Bar?"], at most five.
pub fn parse_numbered_questions(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            line.trim_start_matches(|c: char| c.is_ascii_digit() || ".-)*• ".contains(c))
                .trim()
                .to_string()
        })
        .filter(|q| !q.is_empty())
        .take(MAX_SUGGESTED_QUESTIONS)
        .collect()
}
