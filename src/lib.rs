//! kami: locale-aware edge server and entity cache for mx-space front-ends.

pub mod application;
pub mod collections;
pub mod config;
pub mod i18n;
pub mod infra;
