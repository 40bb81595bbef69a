use std::fmt;

use kami_api_types::{Note, Page, Post, Project, Topic};
use serde::{Serialize, de::DeserializeOwned};

/// The entity kinds that get their own collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Post,
    Note,
    Page,
    Project,
    Topic,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Note => "note",
            Self::Page => "page",
            Self::Project => "project",
            Self::Topic => "topic",
        }
    }

    /// Kind named by a realtime event prefix such as `POST` in `POST_UPDATE`.
    pub fn from_event_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "POST" => Some(Self::Post),
            "NOTE" => Some(Self::Note),
            "PAGE" => Some(Self::Page),
            "PROJECT" => Some(Self::Project),
            "TOPIC" => Some(Self::Topic),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a caller names an entity: by primary ID or by a secondary key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LookupKey {
    Id(String),
    /// Numeric note ID.
    Nid(u64),
    /// Posts use `{category}/{slug}`; pages and topics use the bare slug.
    Slug(String),
    /// Whatever note is currently the most recent.
    Latest,
}

impl LookupKey {
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    pub fn slug(slug: impl Into<String>) -> Self {
        Self::Slug(slug.into())
    }

    pub fn post_slug(category: &str, slug: &str) -> Self {
        Self::Slug(format!("{category}/{slug}"))
    }
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id:{id}"),
            Self::Nid(nid) => write!(f, "nid:{nid}"),
            Self::Slug(slug) => write!(f, "slug:{slug}"),
            Self::Latest => f.write_str("latest"),
        }
    }
}

/// An API model that can live in a [`Collection`](super::Collection).
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id(&self) -> &str;

    /// Secondary keys registered in the relation map on every store.
    fn aliases(&self) -> Vec<LookupKey> {
        Vec::new()
    }
}

impl Entity for Post {
    const KIND: EntityKind = EntityKind::Post;

    fn id(&self) -> &str {
        &self.id
    }

    fn aliases(&self) -> Vec<LookupKey> {
        self.category_slug()
            .map(|category| LookupKey::post_slug(category, &self.slug))
            .into_iter()
            .collect()
    }
}

impl Entity for Note {
    const KIND: EntityKind = EntityKind::Note;

    fn id(&self) -> &str {
        &self.id
    }

    fn aliases(&self) -> Vec<LookupKey> {
        vec![LookupKey::Nid(self.nid)]
    }
}

impl Entity for Page {
    const KIND: EntityKind = EntityKind::Page;

    fn id(&self) -> &str {
        &self.id
    }

    fn aliases(&self) -> Vec<LookupKey> {
        vec![LookupKey::slug(self.slug.clone())]
    }
}

impl Entity for Project {
    const KIND: EntityKind = EntityKind::Project;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for Topic {
    const KIND: EntityKind = EntityKind::Topic;

    fn id(&self) -> &str {
        &self.id
    }

    fn aliases(&self) -> Vec<LookupKey> {
        vec![LookupKey::slug(self.slug.clone())]
    }
}
