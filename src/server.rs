//! HTTP front end: runs a whole session per request, without checkpoints.

use crate::models::{GenerationContext, SessionRequest, SessionResponse, SessionState};
use crate::report::render_transcript;
use crate::session::SessionDriver;
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument};

#[derive(Clone)]
struct AppState {
    driver: Arc<SessionDriver>,
}

pub fn router(driver: Arc<SessionDriver>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sessions", post(create_session))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState { driver })
}

pub async fn serve(driver: Arc<SessionDriver>, bind: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("Sci-STORM server running on http://{}", listener.local_addr()?);
    axum::serve(listener, router(driver)).await?;
    Ok(())
}

async fn health() -> &'static str {
    "OK"
}

#[instrument(skip(state, req), fields(goal = %req.goal))]
async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<SessionRequest>,
) -> Result<Json<SessionResponse>, StatusCode> {
    if req.goal.trim().is_empty() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    let start_time = std::time::Instant::now();
    let mut ctx = GenerationContext::new(
        req.goal.clone(),
        req.document_style,
        req.structural_requirements,
    );
    ctx.outline_format_hint = req.outline_format_hint;
    ctx.output_language = req.output_language;

    let mut session_state = SessionState::new(ctx, req.dialogue_turns);
    session_state.human_feedback = req.human_feedback;
    session_state.experiment = req.experiment;

    let driver = &state.driver;
    let session_id = driver.start(session_state).await.map_err(internal)?;
    driver.run_to_end(&session_id).await.map_err(internal)?;

    let finished = driver.state(&session_id).await.map_err(internal)?;
    let task_times = driver.task_times(&session_id).await.map_err(internal)?;
    info!("Session {} completed in {:?}", session_id, start_time.elapsed());

    Ok(Json(SessionResponse {
        session_id,
        goal: req.goal,
        outline: finished.context.outline.clone().unwrap_or_default(),
        dialogue: finished.dialogue.clone(),
        tool_usage: finished.tool_usage.clone(),
        sections: finished.sections.clone(),
        transcript: render_transcript(&finished, chrono::Utc::now()),
        total_time_ms: start_time.elapsed().as_millis() as u64,
        task_times,
    }))
}

fn internal(err: anyhow::Error) -> StatusCode {
    error!("Session failed: {:#}", err);
    StatusCode::INTERNAL_SERVER_ERROR
}
