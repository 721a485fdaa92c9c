use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{sse::Sse, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use rackview_core::Dimension;

use crate::events::{event_stream, keep_alive, parse_kind_list, EventFilter};
use crate::problem::ProblemResponse;
use crate::session::{RackSession, SearchOutcome, SessionRegistry, SessionSnapshot};
use crate::telemetry;

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    sessions: SessionRegistry,
    sse_heartbeat: Duration,
}

impl AppState {
    pub fn new(metrics: PrometheusHandle, sessions: SessionRegistry, sse_heartbeat: Duration) -> Self {
        Self {
            metrics,
            sessions,
            sse_heartbeat,
        }
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn sse_heartbeat(&self) -> Duration {
        self.sse_heartbeat
    }

    async fn session(&self, id: Uuid) -> Result<RackSession, ProblemResponse> {
        self.sessions
            .get(id)
            .await
            .ok_or_else(ProblemResponse::session_not_found)
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/sessions", post(create_session))
        .route("/sessions/:id", get(get_session).delete(delete_session))
        .route("/sessions/:id/search", post(search))
        .route("/sessions/:id/overlays/:dimension", post(activate_overlay))
        .route("/sessions/:id/events", get(session_events))
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = telemetry::render_metrics(state.metrics());
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    location: String,
    warehouse: String,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    outcome: &'static str,
    session: SessionSnapshot,
}

impl From<SearchOutcome> for SearchResponse {
    fn from(outcome: SearchOutcome) -> Self {
        Self {
            outcome: outcome.as_str(),
            session: outcome.into_snapshot(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ActivationResponse {
    activation: &'static str,
    session: SessionSnapshot,
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    #[serde(default)]
    kinds: Option<String>,
}

fn record_request(op: &'static str) {
    counter!("api_session_requests_total", "op" => op).increment(1);
}

async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Response, ProblemResponse> {
    record_request("create");
    let session = state.sessions().create().await;
    match session.search(&request.location, &request.warehouse).await {
        Ok(outcome) => {
            info!(stage = "app", session = %session.id(), outcome = outcome.as_str(), "session created");
            Ok((StatusCode::CREATED, Json(SearchResponse::from(outcome))).into_response())
        }
        Err(err) => {
            state.sessions().remove(session.id()).await;
            Err(err.into())
        }
    }
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, ProblemResponse> {
    record_request("get");
    let session = state.session(id).await?;
    Ok(Json(session.snapshot().await))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ProblemResponse> {
    record_request("delete");
    if state.sessions().remove(id).await {
        info!(stage = "app", session = %id, "session closed");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ProblemResponse::session_not_found())
    }
}

async fn search(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ProblemResponse> {
    record_request("search");
    let session = state.session(id).await?;
    let outcome = session.search(&request.location, &request.warehouse).await?;
    Ok(Json(outcome.into()))
}

async fn activate_overlay(
    State(state): State<AppState>,
    Path((id, dimension)): Path<(Uuid, String)>,
) -> Result<Response, ProblemResponse> {
    record_request("activate");
    let dimension = Dimension::parse(&dimension).ok_or_else(|| {
        ProblemResponse::new(
            StatusCode::BAD_REQUEST,
            "unknown_dimension",
            format!("'{dimension}' is not one of clases, inventario, quiebres"),
        )
    })?;
    let session = state.session(id).await?;
    let activated = session.activate(dimension).await?;
    let body = ActivationResponse {
        activation: activated.activation.as_str(),
        session: activated.snapshot,
    };
    Ok((StatusCode::ACCEPTED, Json(body)).into_response())
}

async fn session_events(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<EventsQuery>,
) -> Result<Response, ProblemResponse> {
    record_request("events");
    let kinds = parse_kind_list(query.kinds)
        .map_err(|err| ProblemResponse::new(StatusCode::BAD_REQUEST, "unknown_event_kind", err))?;
    let session = state.session(id).await?;
    let stream = event_stream(session.events(), EventFilter::from_kinds(kinds));
    Ok(Sse::new(stream)
        .keep_alive(keep_alive(state.sse_heartbeat()))
        .into_response())
}
