use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::Extra;

/// Read and like counters shared by posts and notes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Count {
    #[serde(default)]
    pub read: u64,
    #[serde(default)]
    pub like: u64,
}

/// Category summary embedded in a post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: String,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub category: Option<CategoryRef>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub count: Count,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub modified: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_deleted: bool,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Post {
    /// Slug of the embedded category, when the API expanded it.
    pub fn category_slug(&self) -> Option<&str> {
        self.category.as_ref().map(|category| category.slug.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_post_and_keeps_unknown_fields() {
        let post: Post = serde_json::from_value(serde_json::json!({
            "id": "6420",
            "title": "Hello",
            "slug": "hello",
            "text": "# Hello",
            "categoryId": "c1",
            "category": { "id": "c1", "name": "Notes", "slug": "notes" },
            "count": { "read": 10, "like": 3 },
            "created": "2023-04-01T08:00:00Z",
            "copyright": true
        }))
        .expect("post decodes");

        assert_eq!(post.category_slug(), Some("notes"));
        assert_eq!(post.count.like, 3);
        assert!(post.created.is_some());
        assert_eq!(post.extra.get("copyright"), Some(&serde_json::json!(true)));

        let encoded = serde_json::to_value(&post).expect("post encodes");
        assert_eq!(encoded["copyright"], serde_json::json!(true));
        assert_eq!(encoded["categoryId"], serde_json::json!("c1"));
        assert!(encoded.get("isDeleted").is_none());
    }

    #[test]
    fn missing_count_defaults_to_zero() {
        let post: Post = serde_json::from_value(serde_json::json!({
            "id": "1",
            "title": "t",
            "slug": "s"
        }))
        .expect("post decodes");
        assert_eq!(post.count, Count::default());
        assert!(post.category_slug().is_none());
    }
}
