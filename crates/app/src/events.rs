use std::{collections::HashSet, time::Duration};

use axum::response::sse::{Event, KeepAlive};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tracing::debug;
use uuid::Uuid;

use rackview_core::Dimension;

const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventKind {
    #[serde(rename = "search")]
    Search,
    #[serde(rename = "overlay.loaded")]
    OverlayLoaded,
    #[serde(rename = "overlay.failed")]
    OverlayFailed,
    #[serde(rename = "overlay.discarded")]
    OverlayDiscarded,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Search => "search",
            EventKind::OverlayLoaded => "overlay.loaded",
            EventKind::OverlayFailed => "overlay.failed",
            EventKind::OverlayDiscarded => "overlay.discarded",
        }
    }
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct EventMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rack: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_bins: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_article_records: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl EventMetadata {
    fn is_empty(&self) -> bool {
        self.rack.is_none()
            && self.total_bins.is_none()
            && self.total_article_records.is_none()
            && self.rejected.is_none()
            && self.entries.is_none()
            && self.latency_ms.is_none()
            && self.message.is_none()
    }
}

/// Notification that a session's model or view changed.
#[derive(Debug, Clone, Serialize)]
pub struct SessionEvent {
    pub ts: DateTime<Utc>,
    pub kind: EventKind,
    pub session_id: Uuid,
    pub generation: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<Dimension>,
    #[serde(default, skip_serializing_if = "EventMetadata::is_empty")]
    pub meta: EventMetadata,
}

impl SessionEvent {
    pub fn new(
        ts: DateTime<Utc>,
        kind: EventKind,
        session_id: Uuid,
        generation: u64,
        dimension: Option<Dimension>,
        meta: EventMetadata,
    ) -> Self {
        Self {
            ts,
            kind,
            session_id,
            generation,
            dimension,
            meta,
        }
    }

    pub fn into_sse_event(self) -> Result<Event, serde_json::Error> {
        let data = serde_json::to_string(&self)?;
        Ok(Event::default()
            .event(self.kind.as_str())
            .id(self.generation.to_string())
            .data(data))
    }
}

/// Fan-out of session events to SSE subscribers.
#[derive(Clone)]
pub struct EventHub {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUFFER);
        Self { sender }
    }

    pub fn publish(&self, event: SessionEvent) {
        if self.sender.send(event).is_err() {
            debug!(stage = "session", "no subscribers for session event");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    kinds: Option<HashSet<EventKind>>,
}

impl EventFilter {
    pub fn from_kinds(kinds: Option<HashSet<EventKind>>) -> Self {
        Self { kinds }
    }

    pub fn matches(&self, event: &SessionEvent) -> bool {
        match &self.kinds {
            Some(kinds) => kinds.contains(&event.kind),
            None => true,
        }
    }
}

pub fn event_stream(
    hub: &EventHub,
    filter: EventFilter,
) -> impl Stream<Item = Result<Event, serde_json::Error>> + Send + 'static {
    BroadcastStream::new(hub.subscribe()).filter_map(move |result| match result {
        Ok(event) if filter.matches(&event) => Some(event.into_sse_event()),
        Ok(_) => None,
        Err(_) => None,
    })
}

pub fn keep_alive(interval: Duration) -> KeepAlive {
    KeepAlive::new().interval(interval).text("heartbeat")
}

pub fn parse_kind_list(value: Option<String>) -> Result<Option<HashSet<EventKind>>, String> {
    let Some(raw) = value else {
        return Ok(None);
    };
    let mut set = HashSet::new();
    for item in raw.split(',').filter(|s| !s.trim().is_empty()) {
        let kind = match item.trim().to_lowercase().as_str() {
            "search" => EventKind::Search,
            "overlay.loaded" => EventKind::OverlayLoaded,
            "overlay.failed" => EventKind::OverlayFailed,
            "overlay.discarded" => EventKind::OverlayDiscarded,
            other => {
                return Err(format!("unknown event kind '{other}'"));
            }
        };
        set.insert(kind);
    }

    if set.is_empty() {
        Ok(None)
    } else {
        Ok(Some(set))
    }
}
