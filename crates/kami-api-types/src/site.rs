use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::Extra;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: String,
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub order: i64,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub modified: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_deleted: bool,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub doc_url: Option<String>,
    #[serde(default)]
    pub project_url: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(flatten)]
    pub extra: Extra,
}

/// A note topic (series).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub introduce: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// A friend link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// 0 = pass, 1 = audit, 2 = outdated, 3 = banned, 4 = reject.
    #[serde(default)]
    pub state: u8,
    /// 0 = friend, 1 = collection.
    #[serde(default, rename = "type")]
    pub link_type: u8,
    #[serde(default)]
    pub hide: bool,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Link {
    pub const STATE_PASS: u8 = 0;
    pub const STATE_OUTDATED: u8 = 2;
    pub const STATE_BANNED: u8 = 3;
    pub const TYPE_FRIEND: u8 = 0;
    pub const TYPE_COLLECTION: u8 = 1;

    pub fn is_passed(&self) -> bool {
        self.state == Self::STATE_PASS
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// A category together with its posts (`GET /categories/{slug}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDetail {
    #[serde(flatten)]
    pub category: Category,
    #[serde(default)]
    pub children: Vec<crate::Post>,
}
