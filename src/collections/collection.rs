//! Generic single-flight entity store.

use std::{
    collections::HashMap,
    future::Future,
    sync::{
        Arc, RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::{BoxFuture, FutureExt, Shared};
use metrics::counter;
use serde_json::Value;
use tracing::{debug, warn};

use crate::infra::api::{RequestError, decode};

use super::{
    Entity, FetchOptions, LookupKey,
    lock::{rw_read, rw_write},
    merge::deep_merge,
};

const SOURCE: &str = "collections::collection";

type SharedFetch<T> = Shared<BoxFuture<'static, Result<T, RequestError>>>;

struct InFlight<T: Entity> {
    generation: u64,
    fetch: SharedFetch<T>,
}

struct Store<T: Entity> {
    data: RwLock<HashMap<String, T>>,
    relations: RwLock<HashMap<LookupKey, String>>,
    in_flight: DashMap<LookupKey, InFlight<T>>,
    generation: AtomicU64,
}

/// Latest known snapshot of every fetched entity of one kind.
///
/// Clones share the same store.
pub struct Collection<T: Entity> {
    store: Arc<Store<T>>,
}

impl<T: Entity> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<T: Entity> Default for Collection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> Collection<T> {
    pub fn new() -> Self {
        Self {
            store: Arc::new(Store {
                data: RwLock::new(HashMap::new()),
                relations: RwLock::new(HashMap::new()),
                in_flight: DashMap::new(),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Return the cached entity for `key`, or run `fetch` once for every
    /// concurrent caller asking for the same key.
    ///
    /// `fetch` yields the raw JSON entity, which is merged over any cached
    /// snapshot. The request runs on its own task; dropping every waiter
    /// does not cancel it. On failure the cache is left untouched and every
    /// waiter receives the same error.
    pub async fn fetch_with<F, Fut>(
        &self,
        key: LookupKey,
        options: &FetchOptions,
        fetch: F,
    ) -> Result<T, RequestError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, RequestError>> + Send + 'static,
    {
        let kind = T::KIND.as_str();

        if !options.force
            && let Some(hit) = self.lookup(&key)
        {
            counter!("kami_collection_hit_total", "kind" => kind).increment(1);
            return Ok(hit);
        }

        let pending = match self.store.in_flight.entry(key.clone()) {
            Entry::Occupied(entry) => {
                counter!("kami_collection_shared_total", "kind" => kind).increment(1);
                debug!(
                    target = "kami::collections",
                    kind,
                    key = %key,
                    "joining in-flight fetch"
                );
                entry.get().fetch.clone()
            }
            Entry::Vacant(entry) => {
                counter!("kami_collection_miss_total", "kind" => kind).increment(1);
                let generation = self.store.generation.fetch_add(1, Ordering::Relaxed);
                let store = Arc::clone(&self.store);
                let task_key = key.clone();
                let request = fetch();

                let task = tokio::spawn(async move {
                    let outcome = match request.await {
                        Ok(raw) => store.merge_raw(raw),
                        Err(err) => Err(err),
                    };
                    if let Err(err) = &outcome {
                        counter!("kami_collection_fetch_failed_total", "kind" => T::KIND.as_str())
                            .increment(1);
                        debug!(
                            target = "kami::collections",
                            kind = T::KIND.as_str(),
                            key = %task_key,
                            error = %err,
                            "fetch failed; cache unchanged"
                        );
                    }
                    store
                        .in_flight
                        .remove_if(&task_key, |_, entry| entry.generation == generation);
                    outcome
                });

                let fetch = async move {
                    task.await
                        .unwrap_or_else(|err| Err(RequestError::Aborted(err.to_string())))
                }
                .boxed()
                .shared();

                entry.insert(InFlight {
                    generation,
                    fetch: fetch.clone(),
                });
                fetch
            }
        };

        pending.await
    }

    /// Insert or overwrite an entity, e.g. when seeding from a list response.
    pub fn add(&self, entity: T) {
        self.store.store(entity);
    }

    pub fn add_all(&self, entities: impl IntoIterator<Item = T>) {
        for entity in entities {
            self.add(entity);
        }
    }

    /// Update a cached entity in place. Returns `false` when `id` is unknown.
    pub fn mutate(&self, id: &str, update: impl FnOnce(&mut T)) -> bool {
        let mut data = rw_write(&self.store.data, SOURCE, "mutate");
        match data.get_mut(id) {
            Some(entity) => {
                update(entity);
                true
            }
            None => false,
        }
    }

    /// Merge a raw, possibly partial, entity over the cached snapshot.
    pub fn merge_raw(&self, raw: Value) -> Result<T, RequestError> {
        self.store.merge_raw(raw)
    }

    pub fn get(&self, id: &str) -> Option<T> {
        rw_read(&self.store.data, SOURCE, "get").get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        rw_read(&self.store.data, SOURCE, "contains").contains_key(id)
    }

    /// Resolve `key` through the relation map.
    pub fn lookup(&self, key: &LookupKey) -> Option<T> {
        let id = match key {
            LookupKey::Id(id) => id.clone(),
            other => rw_read(&self.store.relations, SOURCE, "lookup")
                .get(other)
                .cloned()?,
        };
        self.get(&id)
    }

    /// Point a secondary key at an entity ID.
    pub fn relate(&self, key: LookupKey, id: impl Into<String>) {
        rw_write(&self.store.relations, SOURCE, "relate").insert(key, id.into());
    }

    /// Drop every entity and relation. In-flight fetches still complete.
    pub fn reset(&self) {
        rw_write(&self.store.data, SOURCE, "reset.data").clear();
        rw_write(&self.store.relations, SOURCE, "reset.relations").clear();
    }

    pub fn len(&self) -> usize {
        rw_read(&self.store.data, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn in_flight(&self) -> usize {
        self.store.in_flight.len()
    }
}

impl<T: Entity> Store<T> {
    fn store(&self, entity: T) {
        let aliases = entity.aliases();
        let id = entity.id().to_string();
        rw_write(&self.data, SOURCE, "store.data").insert(id.clone(), entity);

        if !aliases.is_empty() {
            let mut relations = rw_write(&self.relations, SOURCE, "store.relations");
            for alias in aliases {
                relations.insert(alias, id.clone());
            }
        }
    }

    fn merge_raw(&self, raw: Value) -> Result<T, RequestError> {
        let id = raw
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                RequestError::Decode(format!("{} payload has no `id`", T::KIND.as_str()))
            })?;

        let merged = {
            let mut data = rw_write(&self.data, SOURCE, "merge_raw");
            let merged = match data.get(&id) {
                Some(existing) => {
                    let mut base = match serde_json::to_value(existing) {
                        Ok(value) => value,
                        Err(err) => {
                            warn!(
                                target = "kami::collections",
                                kind = T::KIND.as_str(),
                                id = %id,
                                error = %err,
                                "cached entity could not be re-encoded; replacing it"
                            );
                            Value::Object(Default::default())
                        }
                    };
                    deep_merge(&mut base, raw);
                    decode::<T>(base)?
                }
                None => decode::<T>(raw)?,
            };
            data.insert(id.clone(), merged.clone());
            merged
        };

        let aliases = merged.aliases();
        if !aliases.is_empty() {
            let mut relations = rw_write(&self.relations, SOURCE, "merge_raw.relations");
            for alias in aliases {
                relations.insert(alias, id.clone());
            }
        }

        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use kami_api_types::{Note, Post};
    use serde_json::json;
    use tokio::sync::oneshot;

    use super::*;

    fn post_json(id: &str, like: u64) -> Value {
        json!({
            "id": id,
            "title": "Hello",
            "slug": "hello",
            "text": "body",
            "category": {"id": "c1", "name": "Tech", "slug": "tech"},
            "count": {"read": 1, "like": like},
            "copyright": true
        })
    }

    #[tokio::test]
    async fn concurrent_fetches_share_one_request() {
        let posts: Collection<Post> = Collection::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let (release, gate) = oneshot::channel::<()>();
        let opts = FetchOptions::default();

        let first = {
            let calls = Arc::clone(&calls);
            posts.fetch_with(LookupKey::id("abc"), &opts, move || {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    let _ = gate.await;
                    Ok(post_json("abc", 3))
                }
            })
        };
        let second = {
            let calls = Arc::clone(&calls);
            posts.fetch_with(LookupKey::id("abc"), &opts, move || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(post_json("abc", 99)) }
            })
        };

        let releaser = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = release.send(());
        };
        let (a, b, ()) = tokio::join!(first, second, releaser);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a, b);
        assert_eq!(a.count.like, 3);
        assert_eq!(posts.in_flight(), 0);
    }

    #[tokio::test]
    async fn cached_values_skip_the_network_unless_forced() {
        let posts: Collection<Post> = Collection::new();
        posts.merge_raw(post_json("p1", 3)).unwrap();

        let cached = posts
            .fetch_with(LookupKey::id("p1"), &FetchOptions::default(), || async {
                Err(RequestError::Aborted("cached entity was fetched".into()))
            })
            .await
            .unwrap();
        assert_eq!(cached.count.like, 3);

        let forced = posts
            .fetch_with(LookupKey::id("p1"), &FetchOptions::forced(), || async {
                Ok(json!({"id": "p1", "title": "Fresh", "slug": "hello"}))
            })
            .await
            .unwrap();
        assert_eq!(forced.title, "Fresh");
        assert_eq!(forced.text, "body");
        assert_eq!(forced.count.like, 3);
        assert_eq!(forced.extra.get("copyright"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn failures_reach_every_waiter_and_leave_cache_unchanged() {
        let posts: Collection<Post> = Collection::new();
        let err = posts
            .fetch_with(LookupKey::id("gone"), &FetchOptions::default(), || async {
                Err(RequestError::Status {
                    status: 404,
                    message: Some("not found".into()),
                })
            })
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert!(posts.is_empty());
        assert_eq!(posts.in_flight(), 0);
    }

    #[tokio::test]
    async fn dropped_waiters_do_not_cancel_the_fetch() {
        let posts: Collection<Post> = Collection::new();
        let (done_tx, done_rx) = oneshot::channel::<()>();

        let opts = FetchOptions::default();
        let waiter = posts.fetch_with(LookupKey::id("p9"), &opts, move || {
            async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                let _ = done_tx.send(());
                Ok(post_json("p9", 0))
            }
        });
        let _ = tokio::time::timeout(Duration::from_millis(1), waiter).await;

        done_rx.await.expect("fetch ran to completion");
        for _ in 0..50 {
            if posts.contains("p9") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(posts.contains("p9"));
    }

    #[test]
    fn aliases_resolve_through_relations() {
        let notes: Collection<Note> = Collection::new();
        notes
            .merge_raw(json!({"id": "n1", "nid": 5, "title": "Day", "text": ""}))
            .unwrap();

        assert_eq!(notes.lookup(&LookupKey::Nid(5)).unwrap().id, "n1");
        assert!(notes.lookup(&LookupKey::Nid(6)).is_none());

        let posts: Collection<Post> = Collection::new();
        posts.merge_raw(post_json("p1", 0)).unwrap();
        assert!(posts.lookup(&LookupKey::post_slug("tech", "hello")).is_some());
    }

    #[test]
    fn mutate_is_a_no_op_for_unknown_ids() {
        let posts: Collection<Post> = Collection::new();
        assert!(!posts.mutate("nope", |post| post.count.like += 1));
        posts.merge_raw(post_json("p1", 3)).unwrap();
        assert!(posts.mutate("p1", |post| post.count.like += 1));
        assert_eq!(posts.get("p1").unwrap().count.like, 4);
    }

    #[test]
    fn reset_clears_data_and_relations() {
        let posts: Collection<Post> = Collection::new();
        posts.merge_raw(post_json("p1", 0)).unwrap();
        posts.reset();
        assert!(posts.is_empty());
        assert!(posts.lookup(&LookupKey::post_slug("tech", "hello")).is_none());
    }

    #[test]
    fn payload_without_id_is_a_decode_error() {
        let posts: Collection<Post> = Collection::new();
        let err = posts.merge_raw(json!({"title": "x"})).unwrap_err();
        assert!(matches!(err, RequestError::Decode(_)));
    }
}
