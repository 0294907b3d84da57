//! Core primitives shared by the tollgate client library and services.
//!
//! This crate provides the error handling foundation and the process-scoped
//! cache cell used for operationally static configuration.

pub mod cache;
pub mod error;

pub use cache::RacyOnceCell;
pub use error::Result;
