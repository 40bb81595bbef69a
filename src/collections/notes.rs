use std::{
    collections::HashMap,
    ops::Deref,
    sync::{Arc, RwLock},
};

use kami_api_types::{LatestNote, Note};
use serde::Serialize;
use serde_json::Value;

use crate::infra::api::{ApiClient, RequestError, unwrap_data};

use super::{
    Collection, FetchOptions, LookupKey,
    lock::{rw_read, rw_write},
};

const SOURCE: &str = "collections::notes";

/// How a note is addressed in a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteRef {
    Id(String),
    Nid(u64),
}

impl NoteRef {
    /// Numeric segments are nids, anything else an object ID.
    pub fn parse(segment: &str) -> Self {
        match segment.parse::<u64>() {
            Ok(nid) => Self::Nid(nid),
            Err(_) => Self::Id(segment.to_string()),
        }
    }

    fn lookup_key(&self) -> LookupKey {
        match self {
            Self::Id(id) => LookupKey::id(id.clone()),
            Self::Nid(nid) => LookupKey::Nid(*nid),
        }
    }
}

/// Summaries of the notes before and after one note.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NoteNeighbours {
    pub prev: Option<Value>,
    pub next: Option<Value>,
}

type Neighbours = Arc<RwLock<HashMap<u64, NoteNeighbours>>>;

/// Note collection plus neighbour links keyed by nid.
#[derive(Clone)]
pub struct NoteCollection {
    collection: Collection<Note>,
    neighbours: Neighbours,
    api: ApiClient,
}

impl NoteCollection {
    pub(crate) fn new(api: ApiClient) -> Self {
        Self {
            collection: Collection::new(),
            neighbours: Arc::new(RwLock::new(HashMap::new())),
            api,
        }
    }

    /// Fetch a note; protected notes answer 403 until `password` is right.
    pub async fn fetch_by_id(
        &self,
        note: NoteRef,
        password: Option<&str>,
        options: &FetchOptions,
    ) -> Result<Note, RequestError> {
        let api = self.api.clone();
        let password = password.map(str::to_string);
        let key = note.lookup_key();

        match note {
            NoteRef::Nid(nid) => {
                let neighbours = Arc::clone(&self.neighbours);
                let lang = options.lang.clone();
                self.collection
                    .fetch_with(key, options, move || async move {
                        let envelope = api
                            .note_by_nid(nid, password.as_deref(), lang.as_deref())
                            .await?;
                        Ok(split_envelope(envelope, &neighbours))
                    })
                    .await
            }
            NoteRef::Id(id) => {
                self.collection
                    .fetch_with(key, options, move || async move {
                        api.note_by_id(&id, password.as_deref()).await.map(unwrap_data)
                    })
                    .await
            }
        }
    }

    pub async fn fetch_latest(&self) -> Result<LatestNote, RequestError> {
        let api = self.api.clone();
        let neighbours = Arc::clone(&self.neighbours);
        let note = self
            .collection
            .fetch_with(LookupKey::Latest, &FetchOptions::default(), move || async move {
                let envelope = api.latest_note().await?;
                Ok(split_envelope(envelope, &neighbours))
            })
            .await?;

        self.collection.relate(LookupKey::Latest, note.id.clone());
        let next = self.relation(note.nid).and_then(|links| links.next);
        Ok(LatestNote { data: note, next })
    }

    /// Count a like locally. Returns `false` when the note is not cached.
    pub fn like(&self, id: &str) -> bool {
        self.collection.mutate(id, |note| note.count.like += 1)
    }

    /// Neighbours recorded when the note was fetched by nid.
    pub fn relation(&self, nid: u64) -> Option<NoteNeighbours> {
        rw_read(&self.neighbours, SOURCE, "relation").get(&nid).cloned()
    }
}

impl Deref for NoteCollection {
    type Target = Collection<Note>;

    fn deref(&self) -> &Self::Target {
        &self.collection
    }
}

/// Take the note out of a `{ data, prev, next }` envelope, recording the
/// neighbours under the note's nid.
fn split_envelope(envelope: Value, neighbours: &Neighbours) -> Value {
    let Value::Object(mut map) = envelope else {
        return envelope;
    };
    let Some(data) = map.remove("data").filter(Value::is_object) else {
        return Value::Object(map);
    };

    if let Some(nid) = data.get("nid").and_then(Value::as_u64) {
        let links = NoteNeighbours {
            prev: map.remove("prev").filter(|value| !value.is_null()),
            next: map.remove("next").filter(|value| !value.is_null()),
        };
        rw_write(neighbours, SOURCE, "split_envelope").insert(nid, links);
    }
    data
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn note_ref_parses_numeric_segments_as_nid() {
        assert_eq!(NoteRef::parse("42"), NoteRef::Nid(42));
        assert_eq!(
            NoteRef::parse("64a1f0c2"),
            NoteRef::Id("64a1f0c2".to_string())
        );
    }

    #[test]
    fn envelope_is_split_into_note_and_neighbours() {
        let neighbours: Neighbours = Arc::default();
        let note = split_envelope(
            json!({
                "data": {"id": "n1", "nid": 7, "title": "t"},
                "prev": {"nid": 6},
                "next": null
            }),
            &neighbours,
        );

        assert_eq!(note["id"], "n1");
        let links = neighbours.read().unwrap().get(&7).cloned().unwrap();
        assert_eq!(links.prev, Some(json!({"nid": 6})));
        assert_eq!(links.next, None);
    }

    #[test]
    fn bare_note_passes_through() {
        let neighbours: Neighbours = Arc::default();
        let note = split_envelope(json!({"id": "n1", "nid": 7}), &neighbours);
        assert_eq!(note, json!({"id": "n1", "nid": 7}));
        assert!(neighbours.read().unwrap().is_empty());
    }
}
