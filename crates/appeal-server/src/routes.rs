use std::sync::Arc;
use std::time::Instant;

use appeal_core::{
    angles, jurisdictions, AppealError, CitationCase, FollowUpAnswer, FollowUpResponse,
    GenerationScope, Orchestrator,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

// ── AppState ──────────────────────────────────────────────────────────────

pub struct AppState {
    pub orchestrator: Orchestrator,
    pub model: String,
    pub start_time: Instant,
}

pub(crate) fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        // Catalogs
        .route("/api/states", get(list_states))
        .route("/api/cities/:state", get(list_cities))
        .route("/api/jurisdiction", get(get_jurisdiction))
        .route("/api/appeal-angles", get(list_angles))
        // Workflow
        .route("/api/analyze", post(analyze))
        .route("/api/follow-up-questions", post(follow_up_questions))
        .route("/api/generate-appeal", post(generate_appeal))
        .with_state(state)
}

// ── Error helper ──────────────────────────────────────────────────────────

type ApiError = (StatusCode, Json<Value>);

fn appeal_error(e: AppealError) -> ApiError {
    let status = match e {
        AppealError::InvalidInput { .. }
        | AppealError::UnknownAngle(_)
        | AppealError::UnknownFlag(_) => StatusCode::BAD_REQUEST,
        AppealError::InvalidStage { .. } => {
            error!("workflow misuse: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        },
    };
    (status, Json(json!({ "error": e.to_string() })))
}

// ── Request body types ────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(crate) struct JurisdictionQuery {
    #[serde(default)]
    state: String,
    city: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct GenerateBody {
    case: CitationCase,
    #[serde(default)]
    answers: Vec<FollowUpAnswer>,
    #[serde(default)]
    flags: Vec<String>,
    selected_angles: Option<Vec<String>>,
    #[serde(default)]
    scope: GenerationScope,
}

#[derive(Deserialize)]
pub(crate) struct FollowUpBody {
    case: CitationCase,
    angle: String,
}

fn angle_json(angle: &appeal_core::AppealAngle, case: Option<&CitationCase>) -> Value {
    let questions: Vec<String> = match case {
        Some(case) => angle.render_questions(case),
        None => angle.questions.iter().map(|q| q.to_string()).collect(),
    };
    json!({
        "key": angle.key,
        "name": angle.name,
        "description": angle.description,
        "questions": questions,
    })
}

// ── Handlers ──────────────────────────────────────────────────────────────

pub(crate) async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "model": state.model,
        "catalog_version": angles::CATALOG_VERSION,
        "uptime_s": state.start_time.elapsed().as_secs(),
    }))
}

pub(crate) async fn list_states() -> Json<Value> {
    Json(json!({ "states": jurisdictions::states() }))
}

pub(crate) async fn list_cities(Path(state): Path<String>) -> Json<Value> {
    Json(json!({
        "state": state.trim().to_uppercase(),
        "cities": jurisdictions::cities_for_state(&state),
    }))
}

pub(crate) async fn get_jurisdiction(Query(q): Query<JurisdictionQuery>) -> Json<Value> {
    let rule = jurisdictions::resolve(&q.state, q.city.as_deref());
    Json(json!({
        "rule": rule,
        "common_grounds": jurisdictions::common_grounds(),
    }))
}

pub(crate) async fn list_angles() -> Json<Value> {
    let list: Vec<Value> = angles::all_angles().iter().map(|a| angle_json(a, None)).collect();
    Json(json!({
        "catalog_version": angles::CATALOG_VERSION,
        "angles": list,
    }))
}

pub(crate) async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(case): Json<CitationCase>,
) -> Result<Json<Value>, ApiError> {
    let result = state
        .orchestrator
        .analyzer()
        .analyze(&case)
        .await
        .map_err(appeal_error)?;
    let suggested: Vec<Value> = result
        .angles()
        .into_iter()
        .map(|a| angle_json(a, Some(&case)))
        .collect();
    Ok(Json(json!({
        "suggested_angles": suggested,
        "analysis": result,
    })))
}

/// Standard questions for one angle plus any the model suggests.
pub(crate) async fn follow_up_questions(
    State(state): State<Arc<AppState>>,
    Json(body): Json<FollowUpBody>,
) -> Result<Json<Value>, ApiError> {
    body.case.validate().map_err(appeal_error)?;
    let angle = angles::angle(&body.angle)
        .ok_or_else(|| appeal_error(AppealError::UnknownAngle(body.angle.clone())))?;
    let suggested = state
        .orchestrator
        .analyzer()
        .suggest_questions(&body.case, angle)
        .await;
    Ok(Json(json!({
        "angle": angle.key,
        "questions": angle.render_questions(&body.case),
        "suggested": suggested,
    })))
}

pub(crate) async fn generate_appeal(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GenerateBody>,
) -> Result<Json<Value>, ApiError> {
    let mut run = state.orchestrator.start(body.case);
    run.analyze().await.map_err(appeal_error)?;
    if let Some(selected) = body.selected_angles {
        run.select_angles(selected.as_slice()).map_err(appeal_error)?;
    }
    if !body.answers.is_empty() || !body.flags.is_empty() {
        run.answer(FollowUpResponse {
            answers: body.answers,
            flags: body.flags,
        })
        .map_err(appeal_error)?;
    }
    run.generate(body.scope).await.map_err(appeal_error)?;
    let package = run.finish().map_err(appeal_error)?;
    info!(
        citation = %package.citation_number,
        documents = package.documents.len(),
        "appeal package served"
    );
    Ok(Json(json!(package)))
}
