use serde::{Deserialize, Serialize};

use crate::{Category, Extra, Note, Post};

/// Site bootstrap payload (`GET /aggregate`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregate {
    #[serde(default)]
    pub user: serde_json::Value,
    #[serde(default)]
    pub seo: serde_json::Value,
    #[serde(default)]
    pub url: serde_json::Value,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub page_meta: Vec<serde_json::Value>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Home feed (`GET /aggregate/top`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateTop {
    #[serde(default)]
    pub posts: Vec<Post>,
    #[serde(default)]
    pub notes: Vec<Note>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Timeline (`GET /aggregate/timeline`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    #[serde(default)]
    pub posts: Vec<serde_json::Value>,
    #[serde(default)]
    pub notes: Vec<serde_json::Value>,
}
