//! Per-request entity collections backed by the content API.
//!
//! Each entity kind gets a [`Collection`]: a map of the latest snapshot per
//! ID, a relation map from secondary keys (`nid:5`, `slug:tech/hello`) to
//! IDs, and at most one in-flight request per lookup key. A [`Collections`]
//! context is built for every request and dropped with it.

mod collection;
mod events;
mod keys;
mod lock;
mod merge;
mod notes;
mod posts;
mod site;

pub use collection::Collection;
pub use events::{EventAction, RealtimeEvent, run_event_loop};
pub use keys::{Entity, EntityKind, LookupKey};
pub use notes::{NoteCollection, NoteNeighbours, NoteRef};
pub use posts::PostCollection;
pub use site::{PageCollection, ProjectCollection, TopicCollection};

use crate::infra::api::ApiClient;

/// Per-call fetch behavior.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Skip the cached snapshot and ask the API again.
    pub force: bool,
    /// Content language; `original` asks for the untranslated text.
    pub lang: Option<String>,
}

impl FetchOptions {
    pub fn forced() -> Self {
        Self {
            force: true,
            ..Self::default()
        }
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }
}

/// Every entity collection of one request, sharing a locale-bound client.
#[derive(Clone)]
pub struct Collections {
    api: ApiClient,
    pub posts: PostCollection,
    pub notes: NoteCollection,
    pub pages: PageCollection,
    pub projects: ProjectCollection,
    pub topics: TopicCollection,
}

impl Collections {
    pub fn new(api: ApiClient) -> Self {
        Self {
            posts: PostCollection::new(api.clone()),
            notes: NoteCollection::new(api.clone()),
            pages: PageCollection::new(api.clone()),
            projects: ProjectCollection::new(api.clone()),
            topics: TopicCollection::new(api.clone()),
            api,
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Empty every collection.
    pub fn reset(&self) {
        self.posts.reset();
        self.notes.reset();
        self.pages.reset();
        self.projects.reset();
        self.topics.reset();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use url::Url;

    use super::*;
    use crate::config::ApiSettings;

    fn collections() -> Collections {
        let api = ApiClient::new(&ApiSettings {
            base_url: Url::parse("http://127.0.0.1:9/api/v2/").unwrap(),
            token: None,
            timeout: Duration::from_millis(200),
        })
        .unwrap();
        Collections::new(api)
    }

    #[test]
    fn up_increments_cached_like_count() {
        let collections = collections();
        collections
            .posts
            .merge_raw(json!({
                "id": "p1",
                "title": "t",
                "slug": "s",
                "count": {"read": 0, "like": 3}
            }))
            .unwrap();

        assert!(collections.posts.up("p1"));
        assert_eq!(collections.posts.get("p1").unwrap().count.like, 4);
        assert!(!collections.posts.up("missing"));
    }

    #[test]
    fn like_increments_cached_note() {
        let collections = collections();
        collections
            .notes
            .merge_raw(json!({"id": "n1", "nid": 3, "title": "t", "count": {"like": 1}}))
            .unwrap();
        assert!(collections.notes.like("n1"));
        assert_eq!(collections.notes.get("n1").unwrap().count.like, 2);
    }

    #[test]
    fn realtime_events_patch_only_cached_entities() {
        let collections = collections();

        let update = RealtimeEvent::parse(r#"{"type":"POST_UPDATE","data":{"id":"p1","title":"x"}}"#)
            .unwrap()
            .unwrap();
        assert!(!collections.apply_event(&update).unwrap());
        assert!(collections.posts.is_empty());

        let create = RealtimeEvent::parse(
            r#"{"type":"POST_CREATE","data":{"id":"p1","title":"a","slug":"a","text":"body"}}"#,
        )
        .unwrap()
        .unwrap();
        assert!(collections.apply_event(&create).unwrap());
        assert!(collections.apply_event(&update).unwrap());
        let post = collections.posts.get("p1").unwrap();
        assert_eq!(post.title, "x");
        assert_eq!(post.text, "body");

        let delete = RealtimeEvent::parse(r#"{"type":"POST_DELETE","data":{"id":"p1"}}"#)
            .unwrap()
            .unwrap();
        assert!(collections.apply_event(&delete).unwrap());
        assert!(collections.posts.get("p1").unwrap().is_deleted);
    }

    #[tokio::test]
    async fn event_loop_drains_channel() {
        let collections = std::sync::Arc::new(collections());
        let (tx, rx) = tokio::sync::mpsc::channel(4);
        let worker = tokio::spawn(run_event_loop(std::sync::Arc::clone(&collections), rx));

        tx.send(r#"{"type":"TOPIC_CREATE","data":{"id":"t1","name":"Life","slug":"life"}}"#.into())
            .await
            .unwrap();
        tx.send("garbage".into()).await.unwrap();
        drop(tx);
        worker.await.unwrap();

        assert_eq!(
            collections.topics.lookup(&LookupKey::slug("life")).unwrap().id,
            "t1"
        );
    }

    #[test]
    fn reset_empties_every_collection() {
        let collections = collections();
        collections
            .pages
            .merge_raw(json!({"id": "pg", "title": "About", "slug": "about"}))
            .unwrap();
        collections.reset();
        assert!(collections.pages.is_empty());
    }
}
