//! Client for the remote mx-space content API.

mod client;
mod error;

pub use client::{ApiClient, TimelineKind};
pub(crate) use client::{decode, unwrap_data};
pub use error::{
    GENERIC_REQUEST_MESSAGE, Notice, NoticeLevel, RequestError, TIMEOUT_NOTICE, notices_for,
};
