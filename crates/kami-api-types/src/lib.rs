//! Request and response models of the mx-space content API.
//!
//! Every entity keeps the fields it does not model in `extra`, so a value
//! decoded from one response and re-encoded later loses nothing.

mod aggregate;
mod notes;
mod pagination;
mod posts;
mod site;

pub use aggregate::{Aggregate, AggregateTop, Timeline};
pub use notes::{LatestNote, Note};
pub use pagination::{Paginated, Pagination};
pub use posts::{CategoryRef, Count, Post};
pub use site::{Category, CategoryDetail, Link, Page, Project, Topic};

/// Unmodelled fields carried alongside a typed entity.
pub type Extra = serde_json::Map<String, serde_json::Value>;
