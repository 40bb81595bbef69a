use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Count, Extra};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    /// Public numeric identifier used in note URLs.
    pub nid: u64,
    pub title: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub weather: Option<String>,
    #[serde(default)]
    pub hide: bool,
    #[serde(default)]
    pub topic_id: Option<String>,
    #[serde(default)]
    pub count: Count,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub modified: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub public_at: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_deleted: bool,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Response of `notes/latest`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestNote {
    pub data: Note,
    #[serde(default)]
    pub next: Option<serde_json::Value>,
}
