//! Page loading on top of the entity collections.

pub mod error;
pub mod pages;
