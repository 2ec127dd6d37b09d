mod common;

use std::sync::Arc;
use std::time::Duration;

use appeal_core::{
    AppealError, DocumentStatus, FollowUpAnswer, FollowUpResponse, GenerationParams,
    GenerationScope, Orchestrator, RetryPolicy, RuleLevel, RunStatus, ServiceError, Stage,
    COMPREHENSIVE_KEY,
};
use common::{fast_policy, Script, StubService};

fn orchestrator(service: Arc<StubService>) -> Orchestrator {
    Orchestrator::new(service, fast_policy(), GenerationParams::default(), 3)
}

fn angle_keys(run: &appeal_core::AppealRun<'_>) -> Vec<&'static str> {
    run.angles().iter().map(|a| a.key).collect()
}

// =============================================================================
// Stage transitions
// =============================================================================

#[tokio::test]
async fn test_full_run_walks_every_stage() {
    let service = StubService::new(Script::Echo);
    let orch = orchestrator(service);
    let mut run = orch.start(common::case("CA", None));
    assert_eq!(run.stage(), Stage::Gathering);

    run.case_mut().unwrap().flags.has_errors = true;
    run.analyze().await.unwrap();
    assert_eq!(run.stage(), Stage::Analyzed);

    run.answer(FollowUpResponse::default()).unwrap();
    assert_eq!(run.stage(), Stage::FollowedUp);

    run.generate(GenerationScope::Full).await.unwrap();
    assert_eq!(run.stage(), Stage::Generated);

    let package = run.finish().unwrap();
    assert_eq!(run.stage(), Stage::Done);
    assert_eq!(package.status, RunStatus::Complete);
    assert_eq!(package.angles_used, vec!["Procedural Error"]);
}

#[tokio::test]
async fn test_follow_up_is_optional() {
    let service = StubService::new(Script::Echo);
    let orch = orchestrator(service);
    let mut run = orch.start(common::case("NY", None));
    run.analyze().await.unwrap();
    run.generate(GenerationScope::Full).await.unwrap();
    assert!(run.finish().is_ok());
}

#[tokio::test]
async fn test_case_is_read_only_after_analysis() {
    let service = StubService::new(Script::Echo);
    let orch = orchestrator(service);
    let mut run = orch.start(common::case("CA", None));
    run.analyze().await.unwrap();

    let err = run.case_mut().unwrap_err();
    assert_eq!(
        err,
        AppealError::InvalidStage {
            action: "edit case",
            stage: Stage::Analyzed
        }
    );
}

#[tokio::test]
async fn test_out_of_order_calls_fail_without_changing_stage() {
    let service = StubService::new(Script::Echo);
    let orch = orchestrator(service.clone());
    let mut run = orch.start(common::case("CA", None));

    assert!(matches!(
        run.generate(GenerationScope::Full).await,
        Err(AppealError::InvalidStage { .. })
    ));
    assert!(matches!(run.answer(FollowUpResponse::default()), Err(AppealError::InvalidStage { .. })));
    assert!(matches!(run.finish(), Err(AppealError::InvalidStage { .. })));
    assert_eq!(run.stage(), Stage::Gathering);
    assert_eq!(service.calls(), 0);

    run.analyze().await.unwrap();
    assert!(matches!(run.analyze().await, Err(AppealError::InvalidStage { .. })));
    assert_eq!(run.stage(), Stage::Analyzed);

    run.generate(GenerationScope::Full).await.unwrap();
    let calls = service.calls();
    assert!(matches!(
        run.generate(GenerationScope::Full).await,
        Err(AppealError::InvalidStage { .. })
    ));
    assert!(matches!(run.select_angles(&["procedural_error"]), Err(AppealError::InvalidStage { .. })));
    assert_eq!(service.calls(), calls);
    assert_eq!(run.stage(), Stage::Generated);

    run.finish().unwrap();
    assert!(matches!(run.finish(), Err(AppealError::InvalidStage { stage: Stage::Done, .. })));
}

#[tokio::test]
async fn test_invalid_case_stays_in_gathering() {
    let service = StubService::new(Script::Echo);
    let orch = orchestrator(service);
    let mut run = orch.start(common::case("", None));

    let err = run.analyze().await.unwrap_err();
    assert!(matches!(err, AppealError::InvalidInput { .. }));
    assert_eq!(run.stage(), Stage::Gathering);

    run.case_mut().unwrap().state = "CA".into();
    assert!(run.analyze().await.is_ok());
}

// =============================================================================
// Follow-up re-matching
// =============================================================================

#[tokio::test]
async fn test_follow_up_flags_add_new_angles() {
    let service = StubService::new(Script::Echo);
    let orch = orchestrator(service);
    let mut case = common::case("CA", None);
    case.flags.time_incorrect = true;
    let mut run = orch.start(case);
    run.analyze().await.unwrap();
    assert_eq!(angle_keys(&run), vec!["time_discrepancy"]);

    run.answer(FollowUpResponse {
        answers: vec![FollowUpAnswer {
            question: "Was the meter working?".into(),
            answer: "It showed FAIL".into(),
            angle: Some("meter_malfunction".into()),
        }],
        flags: vec!["meter_malfunction".into(), "time_incorrect".into()],
    })
    .unwrap();

    // Nothing removed; the new angle takes its catalog position.
    assert_eq!(angle_keys(&run), vec!["meter_malfunction", "time_discrepancy"]);
    let analysis = run.analysis().unwrap();
    assert_eq!(analysis.angle_keys, vec!["meter_malfunction", "time_discrepancy"]);
    assert_eq!(analysis.strengths[0].angle, "meter_malfunction");
    assert_eq!(analysis.strengths[1].angle, "time_discrepancy");
    assert_eq!(analysis.questions[0].angle, "meter_malfunction");
    assert_eq!(analysis.questions.last().map(|q| q.angle.as_str()), Some("time_discrepancy"));
    assert!(run.case().flags.meter_malfunction);
}

#[tokio::test]
async fn test_follow_up_angles_generate_in_catalog_order() {
    let service = StubService::new(Script::Echo);
    let orch = orchestrator(service);
    let mut case = common::case("CA", Some("San Francisco"));
    case.flags.unclear_signage = true;
    case.flags.first_violation = true;
    let mut run = orch.start(case);
    run.analyze().await.unwrap();

    run.answer(FollowUpResponse {
        answers: vec![],
        flags: vec!["meter_malfunction".into()],
    })
    .unwrap();
    run.generate(GenerationScope::Full).await.unwrap();

    let keys: Vec<&str> = run.documents().iter().map(|d| d.key.as_str()).collect();
    assert_eq!(
        keys,
        vec!["signage_issues", "meter_malfunction", "first_violation", COMPREHENSIVE_KEY]
    );

    let package = run.finish().unwrap();
    assert_eq!(
        package.analysis.angle_keys,
        vec!["signage_issues", "meter_malfunction", "first_violation"]
    );
    assert_eq!(
        package.angles_used,
        vec![
            "Inadequate or Confusing Signage",
            "Meter or Payment System Malfunction",
            "First-Time Violation / Good Record"
        ]
    );
}

#[tokio::test]
async fn test_follow_up_rejects_unknown_flag_and_angle() {
    let service = StubService::new(Script::Echo);
    let orch = orchestrator(service);
    let mut run = orch.start(common::case("CA", None));
    run.analyze().await.unwrap();

    let err = run
        .answer(FollowUpResponse {
            answers: vec![],
            flags: vec!["towed".into()],
        })
        .unwrap_err();
    assert_eq!(err, AppealError::UnknownFlag("towed".into()));

    let err = run
        .answer(FollowUpResponse {
            answers: vec![FollowUpAnswer {
                question: "q".into(),
                answer: "a".into(),
                angle: Some("bribery".into()),
            }],
            flags: vec![],
        })
        .unwrap_err();
    assert_eq!(err, AppealError::UnknownAngle("bribery".into()));
    assert_eq!(run.stage(), Stage::Analyzed);
}

// =============================================================================
// Angle selection
// =============================================================================

#[tokio::test]
async fn test_select_angles_restricts_in_catalog_order() {
    let service = StubService::new(Script::Echo);
    let orch = orchestrator(service);
    let mut case = common::case("CA", None);
    case.flags.has_errors = true;
    case.flags.unclear_signage = true;
    case.flags.first_violation = true;
    let mut run = orch.start(case);
    run.analyze().await.unwrap();

    run.select_angles(&["first_violation", "procedural_error"]).unwrap();
    assert_eq!(angle_keys(&run), vec!["procedural_error", "first_violation"]);

    // A deselected angle that was already triggered stays out after follow-up.
    run.answer(FollowUpResponse::default()).unwrap();
    assert_eq!(angle_keys(&run), vec!["procedural_error", "first_violation"]);

    let docs = run.generate(GenerationScope::Full).await.unwrap();
    assert_eq!(docs.len(), 3);
}

#[tokio::test]
async fn test_select_unknown_angle_leaves_selection_unchanged() {
    let service = StubService::new(Script::Echo);
    let orch = orchestrator(service);
    let mut case = common::case("CA", None);
    case.flags.unclear_zone = true;
    let mut run = orch.start(case);
    run.analyze().await.unwrap();

    let err = run.select_angles(&["zone_confusion", "nope"]).unwrap_err();
    assert_eq!(err, AppealError::UnknownAngle("nope".into()));
    assert_eq!(angle_keys(&run), vec!["zone_confusion"]);
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_scenario_san_francisco_signage_first_violation() {
    let service = StubService::new(Script::Echo);
    let orch = orchestrator(service);
    let mut case = common::case("CA", Some("San Francisco"));
    case.flags.unclear_signage = true;
    case.flags.first_violation = true;

    let package = orch.run(case, None, GenerationScope::Full).await.unwrap();

    assert_eq!(package.analysis.angle_keys, vec!["signage_issues", "first_violation"]);
    assert_eq!(package.analysis.jurisdiction.level, RuleLevel::City);
    assert_eq!(package.analysis.jurisdiction.city.as_deref(), Some("San Francisco"));
    let keys: Vec<&str> = package.documents.iter().map(|d| d.key.as_str()).collect();
    assert_eq!(keys, vec!["signage_issues", "first_violation", COMPREHENSIVE_KEY]);
    assert_eq!(package.citation_number, "C-1001");
}

#[tokio::test]
async fn test_scenario_unregistered_state_without_flags() {
    let service = StubService::new(Script::Echo);
    let orch = orchestrator(service);

    let package = orch
        .run(common::case("WY", None), None, GenerationScope::Full)
        .await
        .unwrap();

    assert!(package.analysis.angle_keys.is_empty());
    assert_eq!(package.analysis.jurisdiction.level, RuleLevel::Generic);
    assert_eq!(package.documents.len(), 1);
    let comprehensive = package.comprehensive().unwrap();
    assert_eq!(comprehensive.status, DocumentStatus::Generated);
    assert!(!comprehensive.text.is_empty());
    assert_eq!(package.status, RunStatus::Complete);
}

#[tokio::test]
async fn test_scenario_one_angle_times_out() {
    let service = StubService::new(Script::HangOn("APPEAL STRATEGY: Emergency or Extenuating Circumstances"));
    let policy = RetryPolicy {
        max_attempts: 2,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(2),
        call_timeout: Duration::from_millis(50),
    };
    let orch = Orchestrator::new(service, policy, GenerationParams::default(), 3);
    let mut case = common::case("IL", Some("Chicago"));
    case.flags.has_errors = true;
    case.flags.emergency_situation = true;
    case.flags.first_violation = true;

    let package = orch.run(case, None, GenerationScope::Full).await.unwrap();

    assert_eq!(package.status, RunStatus::Degraded);
    let individual: Vec<_> = package.individual().collect();
    assert_eq!(individual.len(), 3);
    assert_eq!(individual.iter().filter(|d| d.is_generated()).count(), 2);
    assert_eq!(individual[1].key, "emergency_circumstances");
    assert_eq!(individual[1].status, DocumentStatus::Failed);
    assert!(package.comprehensive().unwrap().is_generated());
    assert_eq!(package.warnings.len(), 1);
    assert!(package.warnings[0].contains("Emergency or Extenuating Circumstances"));
}

#[tokio::test]
async fn test_total_outage_still_returns_degraded_package() {
    let service = StubService::new(Script::Fail(ServiceError::Unavailable("offline".into())));
    let orch = orchestrator(service);
    let mut case = common::case("FL", Some("Miami"));
    case.flags.paid_not_displayed = true;

    let package = orch.run(case, None, GenerationScope::Full).await.unwrap();

    assert_eq!(package.status, RunStatus::Degraded);
    assert!(package.analysis.is_degraded());
    assert_eq!(package.analysis.angle_keys, vec!["payment_display_issue"]);
    assert!(package.documents.iter().all(|d| d.status == DocumentStatus::Failed));
    // One warning for the analysis, one per failed document.
    assert_eq!(package.warnings.len(), 3);
}

#[tokio::test]
async fn test_run_with_follow_up_and_comprehensive_only() {
    let service = StubService::new(Script::Echo);
    let orch = orchestrator(service.clone());
    let response = FollowUpResponse {
        answers: vec![],
        flags: vec!["zone_boundary_unclear".into()],
    };

    let package = orch
        .run(common::case("TX", Some("Houston")), Some(response), GenerationScope::ComprehensiveOnly)
        .await
        .unwrap();

    assert_eq!(package.angles_used, vec!["Unclear Zone or Time Restrictions"]);
    assert_eq!(package.documents.len(), 1);
    // One analysis call plus the comprehensive letter.
    assert_eq!(service.calls(), 2);
}
