//! Realtime push messages that patch cached entities.
//!
//! Library-only: the `kami` server builds its [`Collections`] per request and
//! drops them with the response, so it never holds a live cache to patch.
//! Embedders that keep a long-lived [`Collections`] feed push messages to it
//! through [`run_event_loop`].

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::infra::api::RequestError;

use super::{Collection, Collections, Entity, EntityKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
    Create,
    Update,
    Delete,
}

/// A push message addressed to one of the entity collections.
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeEvent {
    pub kind: EntityKind,
    pub action: EventAction,
    pub data: Value,
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: Value,
}

impl RealtimeEvent {
    /// Decode `{"type": "POST_UPDATE", "data": {...}}`.
    ///
    /// Events for anything other than a cached entity kind (comments,
    /// visitor counts, ...) decode to `None`.
    pub fn parse(raw: &str) -> Result<Option<Self>, serde_json::Error> {
        let RawEvent { event_type, data } = serde_json::from_str(raw)?;

        let Some((prefix, action)) = event_type.rsplit_once('_') else {
            return Ok(None);
        };
        let action = match action {
            "CREATE" => EventAction::Create,
            "UPDATE" => EventAction::Update,
            "DELETE" => EventAction::Delete,
            _ => return Ok(None),
        };
        Ok(EntityKind::from_event_prefix(prefix).map(|kind| Self { kind, action, data }))
    }

    /// ID of the entity the event concerns; deletes may carry a bare string.
    pub fn entity_id(&self) -> Option<&str> {
        match &self.data {
            Value::String(id) => Some(id),
            other => other.get("id").and_then(Value::as_str),
        }
    }
}

impl Collections {
    /// Apply a realtime event. Returns `true` when a collection changed.
    pub fn apply_event(&self, event: &RealtimeEvent) -> Result<bool, RequestError> {
        match event.kind {
            EntityKind::Post => apply_to(&*self.posts, event),
            EntityKind::Note => apply_to(&*self.notes, event),
            EntityKind::Page => apply_to(&*self.pages, event),
            EntityKind::Project => apply_to(&*self.projects, event),
            EntityKind::Topic => apply_to(&*self.topics, event),
        }
    }
}

fn apply_to<T: Entity>(collection: &Collection<T>, event: &RealtimeEvent) -> Result<bool, RequestError> {
    let Some(id) = event.entity_id() else {
        return Ok(false);
    };

    match event.action {
        EventAction::Create => collection.merge_raw(event.data.clone()).map(|_| true),
        EventAction::Update if collection.contains(id) => {
            collection.merge_raw(event.data.clone()).map(|_| true)
        }
        EventAction::Update => Ok(false),
        EventAction::Delete if collection.contains(id) => collection
            .merge_raw(json!({"id": id, "isDeleted": true}))
            .map(|_| true),
        EventAction::Delete => Ok(false),
    }
}

/// Drain raw push messages into `collections` until the sender closes.
pub async fn run_event_loop(collections: Arc<Collections>, mut messages: mpsc::Receiver<String>) {
    info!(target = "kami::collections::events", "realtime event loop started");

    while let Some(message) = messages.recv().await {
        let event = match RealtimeEvent::parse(&message) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(err) => {
                warn!(
                    target = "kami::collections::events",
                    error = %err,
                    "discarding malformed realtime message"
                );
                continue;
            }
        };

        match collections.apply_event(&event) {
            Ok(changed) => debug!(
                target = "kami::collections::events",
                kind = event.kind.as_str(),
                action = ?event.action,
                changed,
                "realtime event applied"
            ),
            Err(err) => warn!(
                target = "kami::collections::events",
                kind = event.kind.as_str(),
                error = %err,
                "realtime event could not be merged"
            ),
        }
    }

    info!(target = "kami::collections::events", "realtime event loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_entity_events_and_ignores_others() {
        let event = RealtimeEvent::parse(r#"{"type":"NOTE_UPDATE","data":{"id":"n1"}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(event.kind, EntityKind::Note);
        assert_eq!(event.action, EventAction::Update);
        assert_eq!(event.entity_id(), Some("n1"));

        assert!(
            RealtimeEvent::parse(r#"{"type":"COMMENT_CREATE","data":{}}"#)
                .unwrap()
                .is_none()
        );
        assert!(
            RealtimeEvent::parse(r#"{"type":"VISITOR_ONLINE","data":{}}"#)
                .unwrap()
                .is_none()
        );
        assert!(RealtimeEvent::parse("not json").is_err());
    }

    #[test]
    fn delete_may_carry_a_bare_id() {
        let event = RealtimeEvent::parse(r#"{"type":"POST_DELETE","data":"p1"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(event.entity_id(), Some("p1"));
    }
}
