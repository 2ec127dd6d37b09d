use std::sync::Arc;

use tracing::info;

use crate::analyzer::{self, Analyzer};
use crate::angles;
use crate::config::Config;
use crate::error::{AppealError, Result};
use crate::generator::Generator;
use crate::service::{GenerationParams, GenerationService, RetryPolicy};
use crate::types::{
    AnalysisResult, AppealAngle, AppealDocument, CitationCase, FollowUpAnswer, FollowUpResponse,
    GenerationScope, ResultPackage, RunStatus, SituationFlags, Stage, COMPREHENSIVE_KEY,
};

/// Shared entry point: holds the analyzer and generator and starts runs.
/// Safe to share behind an `Arc` across concurrent requests.
pub struct Orchestrator {
    analyzer: Analyzer,
    generator: Generator,
}

impl Orchestrator {
    pub fn new(
        service: Arc<dyn GenerationService>,
        policy: RetryPolicy,
        params: GenerationParams,
        concurrency: usize,
    ) -> Self {
        Self {
            analyzer: Analyzer::new(Arc::clone(&service), policy.clone(), params.clone()),
            generator: Generator::new(service, policy, params).with_concurrency(concurrency),
        }
    }

    pub fn from_config(service: Arc<dyn GenerationService>, config: &Config) -> Self {
        Self::new(
            service,
            config.retry_policy(),
            config.generation_params(),
            config.concurrency,
        )
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    pub fn start(&self, case: CitationCase) -> AppealRun<'_> {
        AppealRun {
            orchestrator: self,
            stage: Stage::Gathering,
            case,
            analysis: None,
            angles: Vec::new(),
            answers: Vec::new(),
            documents: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Drive one case from analysis to a finished package.
    pub async fn run(
        &self,
        case: CitationCase,
        response: Option<FollowUpResponse>,
        scope: GenerationScope,
    ) -> Result<ResultPackage> {
        let mut run = self.start(case);
        run.analyze().await?;
        if let Some(response) = response {
            run.answer(response)?;
        }
        run.generate(scope).await?;
        run.finish()
    }
}

/// One case moving through `Gathering → Analyzed → FollowedUp → Generated → Done`.
/// A call made in the wrong stage fails with `InvalidStage` and changes nothing.
pub struct AppealRun<'a> {
    orchestrator: &'a Orchestrator,
    stage: Stage,
    case: CitationCase,
    analysis: Option<AnalysisResult>,
    angles: Vec<&'static AppealAngle>,
    answers: Vec<FollowUpAnswer>,
    documents: Vec<AppealDocument>,
    warnings: Vec<String>,
}

impl AppealRun<'_> {
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn case(&self) -> &CitationCase {
        &self.case
    }

    pub fn analysis(&self) -> Option<&AnalysisResult> {
        self.analysis.as_ref()
    }

    /// Angles that generation will pursue.
    pub fn angles(&self) -> &[&'static AppealAngle] {
        &self.angles
    }

    pub fn documents(&self) -> &[AppealDocument] {
        &self.documents
    }

    fn expect_stage(&self, action: &'static str, allowed: &[Stage]) -> Result<()> {
        if allowed.contains(&self.stage) {
            Ok(())
        } else {
            Err(AppealError::InvalidStage {
                action,
                stage: self.stage,
            })
        }
    }

    /// Case facts are only editable before analysis.
    pub fn case_mut(&mut self) -> Result<&mut CitationCase> {
        self.expect_stage("edit case", &[Stage::Gathering])?;
        Ok(&mut self.case)
    }

    /// An invalid case leaves the run in `Gathering` so it can be corrected.
    pub async fn analyze(&mut self) -> Result<&AnalysisResult> {
        self.expect_stage("analyze", &[Stage::Gathering])?;
        let result = self.orchestrator.analyzer.analyze(&self.case).await?;
        if result.is_degraded() {
            self.warnings.push(result.analysis.clone());
        }
        self.angles = result.angles();
        self.stage = Stage::Analyzed;
        Ok(self.analysis.insert(result))
    }

    /// Replace the pursued angles with `keys`, kept in catalog order.
    pub fn select_angles<S: AsRef<str>>(&mut self, keys: &[S]) -> Result<()> {
        self.expect_stage("select angles", &[Stage::Analyzed])?;
        let mut selected = Vec::with_capacity(keys.len());
        for key in keys {
            let key = key.as_ref();
            let angle =
                angles::angle(key).ok_or_else(|| AppealError::UnknownAngle(key.to_string()))?;
            selected.push(angle.key);
        }
        self.angles = angles::all_angles()
            .iter()
            .filter(|a| selected.contains(&a.key))
            .collect();
        info!(citation = %self.case.citation_number, angles = ?selected, "angles selected");
        Ok(())
    }

    /// Record follow-up answers and any newly revealed flags. Angles the new
    /// flags trigger join the pursued set in catalog order; nothing already
    /// chosen is dropped.
    pub fn answer(&mut self, response: FollowUpResponse) -> Result<()> {
        self.expect_stage("answer follow-up", &[Stage::Analyzed])?;

        if let Some(bad) = response
            .flags
            .iter()
            .find(|f| !SituationFlags::NAMES.contains(&f.as_str()))
        {
            return Err(AppealError::UnknownFlag(bad.clone()));
        }
        if let Some(bad) = response
            .answers
            .iter()
            .filter_map(|a| a.angle.as_deref())
            .find(|key| angles::angle(key).is_none())
        {
            return Err(AppealError::UnknownAngle(bad.to_string()));
        }

        let before = angles::match_angles(&self.case);
        for flag in &response.flags {
            self.case.flags.set(flag);
        }
        self.answers.extend(response.answers);

        let added: Vec<&'static AppealAngle> = angles::match_angles(&self.case)
            .into_iter()
            .filter(|a| !before.iter().any(|b| b.key == a.key))
            .filter(|a| !self.angles.iter().any(|have| have.key == a.key))
            .collect();
        if !added.is_empty() {
            info!(
                citation = %self.case.citation_number,
                added = ?added.iter().map(|a| a.key).collect::<Vec<_>>(),
                "follow-up triggered new angles"
            );
            if let Some(analysis) = self.analysis.as_mut() {
                let fresh: Vec<&'static AppealAngle> = added
                    .iter()
                    .copied()
                    .filter(|a| !analysis.angle_keys.iter().any(|k| k == a.key))
                    .collect();
                analysis
                    .angle_keys
                    .extend(fresh.iter().map(|a| a.key.to_string()));
                analysis
                    .strengths
                    .extend(analyzer::strengths(&self.case, &fresh));
                let new_questions: Vec<_> = analyzer::merge_questions(&self.case, &fresh)
                    .into_iter()
                    .filter(|q| {
                        !analysis
                            .questions
                            .iter()
                            .any(|k| k.question.eq_ignore_ascii_case(&q.question))
                    })
                    .collect();
                analysis.questions.extend(new_questions);
                analysis.angle_keys.sort_by_key(|k| angles::catalog_index(k));
                analysis.strengths.sort_by_key(|s| angles::catalog_index(&s.angle));
                analysis.questions.sort_by_key(|q| angles::catalog_index(&q.angle));
            }
            self.angles.extend(added);
            self.angles.sort_by_key(|a| angles::catalog_index(a.key));
        }

        self.stage = Stage::FollowedUp;
        Ok(())
    }

    /// Runs generation exactly once.
    pub async fn generate(&mut self, scope: GenerationScope) -> Result<&[AppealDocument]> {
        self.expect_stage("generate", &[Stage::Analyzed, Stage::FollowedUp])?;
        let Some(analysis) = self.analysis.as_ref() else {
            return Err(AppealError::InvalidStage {
                action: "generate",
                stage: self.stage,
            });
        };

        let documents = self
            .orchestrator
            .generator
            .generate(&self.case, &self.angles, &analysis.jurisdiction, &self.answers, scope)
            .await;

        for doc in documents.iter().filter(|d| !d.is_generated()) {
            let what = if doc.key == COMPREHENSIVE_KEY {
                "comprehensive appeal".to_string()
            } else {
                format!("{} appeal", doc.name)
            };
            self.warnings.push(format!(
                "{what} could not be generated: {}",
                doc.error.as_deref().unwrap_or("unknown error")
            ));
        }

        self.documents = documents;
        self.stage = Stage::Generated;
        Ok(&self.documents)
    }

    /// Hand out the package and close the run.
    pub fn finish(&mut self) -> Result<ResultPackage> {
        self.expect_stage("finish", &[Stage::Generated])?;
        let Some(analysis) = self.analysis.take() else {
            return Err(AppealError::InvalidStage {
                action: "finish",
                stage: self.stage,
            });
        };

        let status = if self.warnings.is_empty() {
            RunStatus::Complete
        } else {
            RunStatus::Degraded
        };
        let package = ResultPackage {
            citation_number: self.case.citation_number.clone(),
            status,
            analysis,
            documents: std::mem::take(&mut self.documents),
            angles_used: self.angles.iter().map(|a| a.name.to_string()).collect(),
            warnings: std::mem::take(&mut self.warnings),
        };
        info!(
            citation = %package.citation_number,
            status = ?package.status,
            documents = package.documents.len(),
            "appeal run finished"
        );
        self.stage = Stage::Done;
        Ok(package)
    }
}
