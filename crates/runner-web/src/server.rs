use axum::extract::State;
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use runner_core::config::DEFAULT_SESSION_IDLE_SECS;
use runner_core::{SessionState, Turn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, info};
use uuid::Uuid;

use crate::controller::{SubmitOutcome, UiController};
use crate::error::ApiError;
use crate::page::render_page;
use crate::state::{lock_session, SessionRegistry};

pub struct AppState {
    pub controller: Arc<UiController>,
    pub sessions: SessionRegistry,
    pub title: String,
    pub auto_refresh_secs: u64,
    /// Sessions unused this long are dropped; `None` keeps them until closed
    pub session_idle: Option<Duration>,
}

impl AppState {
    pub fn new(controller: UiController) -> Self {
        Self {
            controller: Arc::new(controller),
            sessions: SessionRegistry::new(),
            title: "Universal Multi-Agent Runner".to_string(),
            auto_refresh_secs: 5,
            session_idle: Some(Duration::from_secs(DEFAULT_SESSION_IDLE_SECS)),
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn with_auto_refresh_secs(mut self, secs: u64) -> Self {
        self.auto_refresh_secs = secs;
        self
    }

    /// Idle expiry for sessions; zero disables it
    pub fn with_session_idle(mut self, idle: Duration) -> Self {
        self.session_idle = (!idle.is_zero()).then_some(idle);
        self
    }
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub session_id: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    pub session_id: String,
    pub transcript: String,
    pub turns: Vec<Turn>,
    pub logs: String,
}

impl SessionView {
    fn new(id: Uuid, outcome: SubmitOutcome, session: &SessionState) -> Self {
        Self {
            session_id: id.to_string(),
            transcript: outcome.transcript,
            turns: session.turns().to_vec(),
            logs: outcome.logs,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsView {
    pub logs: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthView {
    pub status: String,
    pub agent_available: bool,
    pub adapter: String,
    pub sessions: usize,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/health", get(health_handler))
        .route("/api/logs", get(logs_handler))
        .route("/api/session", post(create_session_handler))
        .route("/api/session/close", post(close_session_handler))
        .route("/api/submit", post(submit_handler))
        .route("/api/clear", post(clear_handler))
        .with_state(state)
}

/// Serve until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> std::io::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("Agent runner listening on http://{}", addr);
    }
    let sweeper = state.session_idle.map(|idle| tokio::spawn(sweep_sessions(state.clone(), idle)));

    let result = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    result
}

async fn sweep_sessions(state: Arc<AppState>, idle: Duration) {
    let period = (idle / 2).max(Duration::from_millis(10));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let removed = state.sessions.sweep_idle(idle);
        if removed > 0 {
            debug!("Expired {} idle sessions, {} remain", removed, state.sessions.len());
        }
    }
}

fn parse_session_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::BadSession(raw.to_string()))
}

async fn index_handler(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(render_page(&state.title, state.auto_refresh_secs))
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthView> {
    let capability = state.controller.capability();
    Json(HealthView {
        status: "ok".to_string(),
        agent_available: capability.is_available(),
        adapter: capability.adapter_name().to_string(),
        sessions: state.sessions.len(),
    })
}

async fn logs_handler(State(state): State<Arc<AppState>>) -> Result<Json<LogsView>, ApiError> {
    let controller = state.controller.clone();
    let logs = tokio::task::spawn_blocking(move || controller.refresh_logs())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(LogsView { logs }))
}

async fn create_session_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SessionView>, ApiError> {
    let (id, session) = state.sessions.create();
    let controller = state.controller.clone();

    let view = tokio::task::spawn_blocking(move || {
        let mut session = lock_session(&session);
        let outcome = controller.clear(&mut session);
        SessionView::new(id, outcome, &session)
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(view))
}

async fn close_session_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SessionRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = parse_session_id(&payload.session_id)?;
    let removed = state.sessions.remove(&id);
    debug!("Closed session {} (known: {})", id, removed);
    Ok(Json(serde_json::json!({ "closed": removed })))
}

async fn submit_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SubmitRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let id = parse_session_id(&payload.session_id)?;
    let session = state.sessions.get_or_create(id);
    let controller = state.controller.clone();
    let text = payload.text;

    // The agent call blocks, so keep it off the async workers
    let view = tokio::task::spawn_blocking(move || {
        let mut session = lock_session(&session);
        let outcome = controller.submit(&text, &mut session);
        SessionView::new(id, outcome, &session)
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(view))
}

async fn clear_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SessionRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let id = parse_session_id(&payload.session_id)?;
    let session = state.sessions.get_or_create(id);
    let controller = state.controller.clone();

    let view = tokio::task::spawn_blocking(move || {
        let mut session = lock_session(&session);
        let outcome = controller.clear(&mut session);
        SessionView::new(id, outcome, &session)
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(view))
}
