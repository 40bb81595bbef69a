use std::ops::Deref;

use kami_api_types::Post;

use crate::infra::api::{ApiClient, RequestError};

use super::{Collection, FetchOptions, LookupKey};

/// Post collection plus the post-specific fetchers.
#[derive(Clone)]
pub struct PostCollection {
    collection: Collection<Post>,
    api: ApiClient,
}

impl PostCollection {
    pub(crate) fn new(api: ApiClient) -> Self {
        Self {
            collection: Collection::new(),
            api,
        }
    }

    pub async fn fetch_by_slug(
        &self,
        category: &str,
        slug: &str,
        options: &FetchOptions,
    ) -> Result<Post, RequestError> {
        let api = self.api.clone();
        let (category_owned, slug_owned) = (category.to_string(), slug.to_string());
        let lang = options.lang.clone();
        self.collection
            .fetch_with(LookupKey::post_slug(category, slug), options, move || async move {
                api.post_by_slug(&category_owned, &slug_owned, lang.as_deref())
                    .await
            })
            .await
    }

    pub async fn fetch_by_id(&self, id: &str, options: &FetchOptions) -> Result<Post, RequestError> {
        let api = self.api.clone();
        let id_owned = id.to_string();
        self.collection
            .fetch_with(LookupKey::id(id), options, move || async move {
                api.post_by_id(&id_owned).await
            })
            .await
    }

    /// Count a like locally. Returns `false` when the post is not cached.
    pub fn up(&self, id: &str) -> bool {
        self.collection.mutate(id, |post| post.count.like += 1)
    }
}

impl Deref for PostCollection {
    type Target = Collection<Post>;

    fn deref(&self) -> &Self::Target {
        &self.collection
    }
}
