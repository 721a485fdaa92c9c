use std::{collections::HashMap, sync::Arc, time::Instant};

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde::Serialize;
use thiserror::Error;
use tokio::{
    sync::{Mutex, RwLock},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use rackview_api::{load_overlay, ApiError, LocationSource};
use rackview_core::location::rack_code_of;
use rackview_core::{
    Activation, Dimension, FetchTicket, OverlayData, RackBuilder, RackModel, ViewState,
};

use crate::events::{EventHub, EventKind, EventMetadata, SessionEvent};

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Parameters of the search that produced the current model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchQuery {
    pub location_prefix: String,
    pub warehouse_id: String,
}

/// Point-in-time copy of a session, safe to render while fetches continue.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<SearchQuery>,
    pub view: ViewState,
    pub rack: Arc<RackModel>,
}

/// Result of a search; an empty rack is not an error.
#[derive(Debug, Clone)]
pub enum SearchOutcome {
    Found(SessionSnapshot),
    Empty(SessionSnapshot),
}

impl SearchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Found(_) => "found",
            Self::Empty(_) => "empty",
        }
    }

    pub fn snapshot(&self) -> &SessionSnapshot {
        match self {
            Self::Found(snapshot) | Self::Empty(snapshot) => snapshot,
        }
    }

    pub fn into_snapshot(self) -> SessionSnapshot {
        match self {
            Self::Found(snapshot) | Self::Empty(snapshot) => snapshot,
        }
    }
}

/// Result of activating a dimension.
#[derive(Debug)]
pub struct Activated {
    pub activation: Activation,
    pub snapshot: SessionSnapshot,
    /// Background fetch started by this activation, if any.
    pub task: Option<JoinHandle<()>>,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("'{0}' does not name a rack")]
    InvalidLocation(String),
    #[error("location search failed: {0}")]
    Search(#[source] ApiError),
    #[error("a newer search replaced this one")]
    Superseded,
    #[error("no rack is loaded in this session")]
    NoRack,
}

struct SessionState {
    query: Option<SearchQuery>,
    model: Arc<RackModel>,
    view: ViewState,
    generation: u64,
    searches_started: u64,
    applied_search: u64,
}

/// One rack view: the current model, its [`ViewState`] and the overlay fetches
/// running against it.
///
/// The model is only ever replaced, never patched in place. Fetch results are
/// merged into whatever model is current when they land, provided the model
/// generation they were started for is still the current one.
#[derive(Clone)]
pub struct RackSession {
    id: Uuid,
    source: Arc<dyn LocationSource>,
    state: Arc<Mutex<SessionState>>,
    events: EventHub,
    clock: Clock,
}

impl RackSession {
    pub fn new(id: Uuid, source: Arc<dyn LocationSource>, clock: Clock) -> Self {
        Self {
            id,
            source,
            state: Arc::new(Mutex::new(SessionState {
                query: None,
                model: Arc::new(RackModel::empty("")),
                view: ViewState::new(0),
                generation: 0,
                searches_started: 0,
                applied_search: 0,
            })),
            events: EventHub::new(),
            clock,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn events(&self) -> &EventHub {
        &self.events
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock().await;
        self.snapshot_of(&state)
    }

    fn snapshot_of(&self, state: &SessionState) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            query: state.query.clone(),
            view: state.view.clone(),
            rack: state.model.clone(),
        }
    }

    /// Runs a location search and replaces the model with a freshly built one.
    ///
    /// Load flags are reset and fetches still running for the previous model
    /// will be discarded when they complete. On a transport error the previous
    /// model stays in place.
    ///
    /// When searches overlap, a result is applied unless a search started
    /// after it has already been applied; a newer search that fails does not
    /// cancel an older one.
    pub async fn search(
        &self,
        location_prefix: &str,
        warehouse_id: &str,
    ) -> Result<SearchOutcome, SessionError> {
        let rack_code = rack_code_of(location_prefix)
            .ok_or_else(|| SessionError::InvalidLocation(location_prefix.to_string()))?;
        let warehouse_id = warehouse_id.trim().to_string();

        let search_id = {
            let mut state = self.state.lock().await;
            state.searches_started += 1;
            state.searches_started
        };

        let started = Instant::now();
        let result = self
            .source
            .search_by_location(location_prefix.trim(), &warehouse_id)
            .await;
        let found = match result {
            Ok(found) => found,
            Err(err) => {
                counter!("rack_builds_total", "result" => "error").increment(1);
                warn!(stage = "session", session = %self.id, rack = %rack_code, error = %err, "location search failed");
                return Err(SessionError::Search(err));
            }
        };

        let model = RackBuilder::build(&rack_code, &found.articles, &found.known_locations);
        for rejected in &model.rejected {
            counter!("rack_locations_rejected_total", "source" => rejected.source.as_str())
                .increment(1);
        }

        let mut state = self.state.lock().await;
        if state.applied_search > search_id {
            debug!(stage = "session", session = %self.id, rack = %rack_code, "search superseded by a newer one");
            return Err(SessionError::Superseded);
        }

        state.applied_search = search_id;
        state.generation += 1;
        let generation = state.generation;
        state.view.reset(generation);
        state.model = Arc::new(model);
        state.query = Some(SearchQuery {
            location_prefix: location_prefix.trim().to_string(),
            warehouse_id,
        });
        let snapshot = self.snapshot_of(&state);
        drop(state);

        let result_label = if snapshot.rack.is_empty() {
            "empty"
        } else {
            "ok"
        };
        counter!("rack_builds_total", "result" => result_label).increment(1);
        info!(
            stage = "session",
            session = %self.id,
            rack = %rack_code,
            generation,
            levels = snapshot.rack.levels.len(),
            bins = snapshot.rack.total_bins,
            records = snapshot.rack.total_article_records,
            rejected = snapshot.rack.rejected.len(),
            "rack model built"
        );
        self.events.publish(SessionEvent::new(
            self.now(),
            EventKind::Search,
            self.id,
            generation,
            None,
            EventMetadata {
                rack: Some(rack_code),
                total_bins: Some(snapshot.rack.total_bins),
                total_article_records: Some(snapshot.rack.total_article_records),
                rejected: Some(snapshot.rack.rejected.len()),
                latency_ms: Some(started.elapsed().as_secs_f64() * 1000.0),
                ..EventMetadata::default()
            },
        ));

        if snapshot.rack.is_empty() {
            Ok(SearchOutcome::Empty(snapshot))
        } else {
            Ok(SearchOutcome::Found(snapshot))
        }
    }

    /// Makes `dimension` the active one, starting a background fetch when it
    /// has neither loaded nor started loading for the current model.
    pub async fn activate(&self, dimension: Dimension) -> Result<Activated, SessionError> {
        let mut state = self.state.lock().await;
        let Some(query) = state.query.clone() else {
            return Err(SessionError::NoRack);
        };
        if state.model.is_empty() {
            return Err(SessionError::NoRack);
        }

        let activation = state.view.activate(dimension);
        let task = match activation {
            Activation::Fetch(ticket) => {
                Some(self.spawn_fetch(ticket, state.model.code.clone(), query.warehouse_id))
            }
            Activation::Switched | Activation::Pending => None,
        };
        debug!(
            stage = "session",
            session = %self.id,
            dimension = dimension.as_str(),
            activation = activation.as_str(),
            "dimension activated"
        );
        let snapshot = self.snapshot_of(&state);

        Ok(Activated {
            activation,
            snapshot,
            task,
        })
    }

    fn spawn_fetch(
        &self,
        ticket: FetchTicket,
        rack_code: String,
        warehouse_id: String,
    ) -> JoinHandle<()> {
        let session = self.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            let result = load_overlay(
                session.source.as_ref(),
                ticket.dimension,
                &rack_code,
                &warehouse_id,
            )
            .await;
            let elapsed = started.elapsed().as_secs_f64();
            histogram!("overlay_fetch_seconds", "dimension" => ticket.dimension.as_str())
                .record(elapsed);
            session.finish_fetch(ticket, result, elapsed).await;
        })
    }

    async fn finish_fetch(
        &self,
        ticket: FetchTicket,
        result: Result<OverlayData, ApiError>,
        elapsed: f64,
    ) {
        let dimension = ticket.dimension.as_str();
        let mut state = self.state.lock().await;

        if !state.view.accepts(ticket) {
            drop(state);
            counter!("overlay_stale_discarded_total", "dimension" => dimension).increment(1);
            debug!(stage = "overlay", session = %self.id, dimension, generation = ticket.generation, "discarding result for a replaced model");
            self.publish_overlay(EventKind::OverlayDiscarded, ticket, EventMetadata::default());
            return;
        }

        let (kind, meta) = match result {
            Ok(data) => {
                let merged = data.merge(&state.model);
                state.model = Arc::new(merged);
                state.view.complete(ticket);
                drop(state);
                counter!("overlay_fetch_total", "dimension" => dimension, "result" => "ok")
                    .increment(1);
                info!(stage = "overlay", session = %self.id, dimension, entries = data.len(), "overlay merged");
                (
                    EventKind::OverlayLoaded,
                    EventMetadata {
                        entries: Some(data.len()),
                        latency_ms: Some(elapsed * 1000.0),
                        ..EventMetadata::default()
                    },
                )
            }
            Err(err) => {
                state.view.fail(ticket, err.to_string());
                drop(state);
                counter!("overlay_fetch_total", "dimension" => dimension, "result" => "error")
                    .increment(1);
                warn!(stage = "overlay", session = %self.id, dimension, error = %err, "overlay fetch failed");
                (
                    EventKind::OverlayFailed,
                    EventMetadata {
                        latency_ms: Some(elapsed * 1000.0),
                        message: Some(err.to_string()),
                        ..EventMetadata::default()
                    },
                )
            }
        };

        self.publish_overlay(kind, ticket, meta);
    }

    fn publish_overlay(&self, kind: EventKind, ticket: FetchTicket, meta: EventMetadata) {
        self.events.publish(SessionEvent::new(
            self.now(),
            kind,
            self.id,
            ticket.generation,
            Some(ticket.dimension),
            meta,
        ));
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}

struct RegistryEntry {
    session: RackSession,
    last_seen: DateTime<Utc>,
}

/// Open rack sessions, one per screen.
///
/// Every lookup refreshes a session's `last_seen`; [`SessionRegistry::evict_idle`]
/// drops sessions nobody has touched or subscribed to within the TTL.
#[derive(Clone)]
pub struct SessionRegistry {
    source: Arc<dyn LocationSource>,
    sessions: Arc<RwLock<HashMap<Uuid, RegistryEntry>>>,
    clock: Clock,
}

impl SessionRegistry {
    pub fn new(source: Arc<dyn LocationSource>) -> Self {
        Self {
            source,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            clock: Arc::new(Utc::now),
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub async fn create(&self) -> RackSession {
        let session = RackSession::new(Uuid::new_v4(), self.source.clone(), self.clock.clone());
        let entry = RegistryEntry {
            session: session.clone(),
            last_seen: (self.clock)(),
        };
        self.sessions.write().await.insert(session.id(), entry);
        session
    }

    pub async fn get(&self, id: Uuid) -> Option<RackSession> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(&id)?;
        entry.last_seen = (self.clock)();
        Some(entry.session.clone())
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Removes sessions idle for longer than `ttl` that have no event
    /// subscribers. Returns the number removed.
    pub async fn evict_idle(&self, ttl: chrono::Duration) -> usize {
        let threshold = (self.clock)() - ttl;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, entry| {
            let keep =
                entry.last_seen >= threshold || entry.session.events().subscriber_count() > 0;
            if !keep {
                debug!(stage = "session", session = %id, last_seen = %entry.last_seen, "evicting idle session");
            }
            keep
        });
        before - sessions.len()
    }
}
