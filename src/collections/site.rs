//! Pages, projects and topics: slug or ID lookups with no extra behavior.

use std::ops::Deref;

use kami_api_types::{Page, Project, Topic};

use crate::infra::api::{ApiClient, RequestError};

use super::{Collection, FetchOptions, LookupKey};

#[derive(Clone)]
pub struct PageCollection {
    collection: Collection<Page>,
    api: ApiClient,
}

impl PageCollection {
    pub(crate) fn new(api: ApiClient) -> Self {
        Self {
            collection: Collection::new(),
            api,
        }
    }

    pub async fn fetch_by_slug(&self, slug: &str, options: &FetchOptions) -> Result<Page, RequestError> {
        let api = self.api.clone();
        let slug_owned = slug.to_string();
        self.collection
            .fetch_with(LookupKey::slug(slug), options, move || async move {
                api.page_by_slug(&slug_owned).await
            })
            .await
    }
}

impl Deref for PageCollection {
    type Target = Collection<Page>;

    fn deref(&self) -> &Self::Target {
        &self.collection
    }
}

#[derive(Clone)]
pub struct ProjectCollection {
    collection: Collection<Project>,
    api: ApiClient,
}

impl ProjectCollection {
    pub(crate) fn new(api: ApiClient) -> Self {
        Self {
            collection: Collection::new(),
            api,
        }
    }

    pub async fn fetch_by_id(&self, id: &str, options: &FetchOptions) -> Result<Project, RequestError> {
        let api = self.api.clone();
        let id_owned = id.to_string();
        self.collection
            .fetch_with(LookupKey::id(id), options, move || async move {
                api.project(&id_owned).await
            })
            .await
    }
}

impl Deref for ProjectCollection {
    type Target = Collection<Project>;

    fn deref(&self) -> &Self::Target {
        &self.collection
    }
}

#[derive(Clone)]
pub struct TopicCollection {
    collection: Collection<Topic>,
    api: ApiClient,
}

impl TopicCollection {
    pub(crate) fn new(api: ApiClient) -> Self {
        Self {
            collection: Collection::new(),
            api,
        }
    }

    pub async fn fetch_by_slug(&self, slug: &str, options: &FetchOptions) -> Result<Topic, RequestError> {
        let api = self.api.clone();
        let slug_owned = slug.to_string();
        self.collection
            .fetch_with(LookupKey::slug(slug), options, move || async move {
                api.topic_by_slug(&slug_owned).await
            })
            .await
    }
}

impl Deref for TopicCollection {
    type Target = Collection<Topic>;

    fn deref(&self) -> &Self::Target {
        &self.collection
    }
}
