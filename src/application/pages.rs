//! Page loaders: one per public route, each producing a JSON render model.

use std::sync::Arc;

use kami_api_types::{
    Aggregate, AggregateTop, CategoryDetail, LatestNote, Link, Note, Page, Paginated, Post,
    Project, Timeline, Topic,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    collections::{Collections, FetchOptions, NoteNeighbours, NoteRef},
    i18n::{Locale, LocaleSet},
    infra::api::{ApiClient, RequestError, TimelineKind},
};

use super::error::AppError;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 50;
const HOME_FEED_SIZE: u32 = 6;
const TOPIC_NOTES_SIZE: u32 = 20;

/// Data every page renders with, loaded before the page itself.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialData {
    pub aggregate: Aggregate,
}

/// Load the site aggregate. Failure is fatal for the whole page.
pub async fn bootstrap(api: &ApiClient) -> Result<InitialData, AppError> {
    match api.aggregate().await {
        Ok(aggregate) => Ok(InitialData { aggregate }),
        Err(err) => {
            warn!(
                target = "kami::application::pages",
                error = %err,
                "bootstrap aggregate unavailable"
            );
            Err(AppError::NoData(err))
        }
    }
}

/// Outcome of a page loader.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PageState<T> {
    Ready { data: T },
    /// The note exists but needs a password.
    PasswordRequired { id: String },
}

impl<T> PageState<T> {
    pub fn ready(data: T) -> Self {
        Self::Ready { data }
    }
}

/// Link to the current page in another locale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alternate {
    pub locale: Locale,
    pub href: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEnvelope<T> {
    pub locale: Locale,
    pub canonical: String,
    pub alternates: Vec<Alternate>,
    pub messages: Arc<Value>,
    pub initial: Arc<InitialData>,
    pub state: PageState<T>,
}

impl<T> PageEnvelope<T> {
    /// `path` is the locale-free path of the page.
    pub fn new(
        locales: &LocaleSet,
        locale: Locale,
        path: &str,
        messages: Arc<Value>,
        initial: Arc<InitialData>,
        state: PageState<T>,
    ) -> Self {
        let canonical = locales.build_link(path, &locale);
        let alternates = locales
            .iter()
            .map(|alternate| Alternate {
                locale: alternate.clone(),
                href: locales.build_link(path, alternate),
            })
            .collect();
        Self {
            locale,
            canonical,
            alternates,
            messages,
            initial,
            state,
        }
    }
}

/// Clamp user-supplied paging to what the API accepts.
pub fn paging(page: Option<u32>, size: Option<u32>) -> (u32, u32) {
    let page = page.unwrap_or(1).max(1);
    let size = size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    (page, size)
}

fn lang_of(collections: &Collections) -> Option<String> {
    collections.api().locale().map(|locale| locale.to_string())
}

pub async fn home(collections: &Collections) -> Result<PageState<AggregateTop>, AppError> {
    let mut top = collections.api().aggregate_top(Some(HOME_FEED_SIZE)).await?;
    top.extra.remove("says");
    collections.posts.add_all(top.posts.iter().cloned());
    collections.notes.add_all(top.notes.iter().cloned());
    Ok(PageState::ready(top))
}

pub async fn post_list(
    collections: &Collections,
    page: Option<u32>,
    size: Option<u32>,
    year: Option<i32>,
) -> Result<PageState<Paginated<Post>>, AppError> {
    let (page, size) = paging(page, size);
    let lang = lang_of(collections);
    let list = collections
        .api()
        .posts(page, size, year, lang.as_deref())
        .await?;
    collections.posts.add_all(list.data.iter().cloned());
    Ok(PageState::ready(list))
}

pub async fn post_detail(
    collections: &Collections,
    category: &str,
    slug: &str,
) -> Result<PageState<Post>, AppError> {
    let options = FetchOptions {
        lang: lang_of(collections),
        ..FetchOptions::default()
    };
    let post = collections
        .posts
        .fetch_by_slug(category, slug, &options)
        .await?;
    Ok(PageState::ready(post))
}

pub async fn note_list(
    collections: &Collections,
    page: Option<u32>,
    size: Option<u32>,
) -> Result<PageState<Paginated<Note>>, AppError> {
    let (page, size) = paging(page, size);
    let list = collections.api().notes(page, size).await?;
    collections.notes.add_all(list.data.iter().cloned());
    Ok(PageState::ready(list))
}

pub async fn latest_note(collections: &Collections) -> Result<PageState<LatestNote>, AppError> {
    let latest = collections.notes.fetch_latest().await?;
    Ok(PageState::ready(latest))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteDetail {
    pub note: Note,
    #[serde(flatten)]
    pub neighbours: NoteNeighbours,
}

/// A note by nid or ID. Always asks the API again so password checks and
/// translations are current.
pub async fn note_detail(
    collections: &Collections,
    segment: &str,
    password: Option<&str>,
) -> Result<PageState<NoteDetail>, AppError> {
    let options = FetchOptions {
        force: true,
        lang: lang_of(collections),
    };
    let note_ref = NoteRef::parse(segment);

    match collections
        .notes
        .fetch_by_id(note_ref, password.filter(|p| !p.is_empty()), &options)
        .await
    {
        Ok(note) => {
            let neighbours = collections.notes.relation(note.nid).unwrap_or_default();
            Ok(PageState::ready(NoteDetail { note, neighbours }))
        }
        Err(err) if err.is_password_required() => {
            debug!(
                target = "kami::application::pages",
                note = segment,
                "note requires a password"
            );
            Ok(PageState::PasswordRequired {
                id: segment.to_string(),
            })
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn topic_list(collections: &Collections) -> Result<PageState<Vec<Topic>>, AppError> {
    let topics = collections.api().topics().await?;
    collections.topics.add_all(topics.iter().cloned());
    Ok(PageState::ready(topics))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicDetail {
    pub topic: Topic,
    pub notes: Paginated<Note>,
}

pub async fn topic_detail(
    collections: &Collections,
    slug: &str,
    page: Option<u32>,
) -> Result<PageState<TopicDetail>, AppError> {
    let topic = collections
        .topics
        .fetch_by_slug(slug, &FetchOptions::default())
        .await?;
    let (page, size) = paging(page, Some(TOPIC_NOTES_SIZE));
    let lang = lang_of(collections);
    let notes = collections
        .api()
        .notes_by_topic(&topic.id, page, size, lang.as_deref())
        .await?;
    collections.notes.add_all(notes.data.iter().cloned());
    Ok(PageState::ready(TopicDetail { topic, notes }))
}

pub async fn category(
    collections: &Collections,
    slug: &str,
) -> Result<PageState<CategoryDetail>, AppError> {
    let detail = collections.api().category(slug).await?;
    collections.posts.add_all(detail.children.iter().cloned());
    Ok(PageState::ready(detail))
}

pub async fn timeline(
    collections: &Collections,
    kind: Option<TimelineKind>,
    year: Option<i32>,
) -> Result<PageState<Timeline>, AppError> {
    let timeline = collections.api().timeline(kind, year).await?;
    Ok(PageState::ready(timeline))
}

/// Friend links grouped the way the friends page shows them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FriendLinks {
    pub friends: Vec<Link>,
    pub collections: Vec<Link>,
    pub outdated: Vec<Link>,
    pub banned: Vec<Link>,
}

impl FriendLinks {
    pub fn group(links: impl IntoIterator<Item = Link>) -> Self {
        let mut grouped = Self::default();
        for link in links.into_iter().filter(|link| !link.hide) {
            match link.state {
                Link::STATE_BANNED => grouped.banned.push(link),
                Link::STATE_OUTDATED => grouped.outdated.push(link),
                _ if link.link_type == Link::TYPE_COLLECTION => grouped.collections.push(link),
                _ if link.link_type == Link::TYPE_FRIEND => grouped.friends.push(link),
                _ => {}
            }
        }
        grouped
    }
}

pub async fn friends(collections: &Collections) -> Result<PageState<FriendLinks>, AppError> {
    let links = collections.api().links(1, MAX_PAGE_SIZE).await?;
    Ok(PageState::ready(FriendLinks::group(links.data)))
}

pub async fn project(collections: &Collections, id: &str) -> Result<PageState<Project>, AppError> {
    let project = collections
        .projects
        .fetch_by_id(id, &FetchOptions::default())
        .await?;
    Ok(PageState::ready(project))
}

pub async fn page(collections: &Collections, slug: &str) -> Result<PageState<Page>, AppError> {
    let page = collections
        .pages
        .fetch_by_slug(slug, &FetchOptions::default())
        .await
        .map_err(|err: RequestError| {
            if err.is_not_found() {
                AppError::NotFound
            } else {
                AppError::Request(err)
            }
        })?;
    Ok(PageState::ready(page))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::i18n::test_locales;

    fn link(name: &str, state: u8, link_type: u8, hide: bool) -> Link {
        serde_json::from_value(json!({
            "id": name,
            "name": name,
            "url": format!("https://{name}.example"),
            "state": state,
            "type": link_type,
            "hide": hide
        }))
        .unwrap()
    }

    #[test]
    fn paging_is_clamped() {
        assert_eq!(paging(None, None), (1, DEFAULT_PAGE_SIZE));
        assert_eq!(paging(Some(0), Some(500)), (1, MAX_PAGE_SIZE));
        assert_eq!(paging(Some(3), Some(0)), (3, 1));
    }

    #[test]
    fn friend_links_are_grouped_and_hidden_ones_dropped() {
        let grouped = FriendLinks::group([
            link("a", 0, 0, false),
            link("b", 0, 1, false),
            link("c", 2, 0, false),
            link("d", 3, 0, false),
            link("e", 0, 0, true),
        ]);
        assert_eq!(grouped.friends.len(), 1);
        assert_eq!(grouped.collections.len(), 1);
        assert_eq!(grouped.outdated.len(), 1);
        assert_eq!(grouped.banned.len(), 1);
    }

    #[test]
    fn envelope_links_every_locale() {
        let locales = test_locales();
        let en = locales.recognize("en").unwrap();
        let envelope = PageEnvelope::new(
            &locales,
            en,
            "/posts?page=2",
            Arc::new(json!({})),
            Arc::new(InitialData {
                aggregate: Aggregate::default(),
            }),
            PageState::ready(json!({"ok": true})),
        );

        assert_eq!(envelope.canonical, "/en/posts?page=2");
        let hrefs: Vec<_> = envelope.alternates.iter().map(|a| a.href.as_str()).collect();
        assert_eq!(hrefs, ["/posts?page=2", "/en/posts?page=2", "/ja/posts?page=2"]);

        let body = serde_json::to_value(&envelope).unwrap();
        assert_eq!(body["state"], json!({"status": "ready", "data": {"ok": true}}));
        assert_eq!(body["locale"], "en");
    }

    #[test]
    fn password_state_serializes_with_id() {
        let state: PageState<Note> = PageState::PasswordRequired { id: "12".into() };
        assert_eq!(
            serde_json::to_value(state).unwrap(),
            json!({"status": "password_required", "id": "12"})
        );
    }
}
