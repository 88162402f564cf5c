//! # Meili Sync Repository
//!
//! This crate provides the boundary to the search engine. It includes the
//! error types, the abstract `SearchEngineClient` interface, the catalogue of
//! updatable index settings, and a concrete implementation for Meilisearch.

pub mod config;
pub mod errors;
pub mod interfaces;
pub mod meilisearch;
pub mod settings;

pub use config::ClientConfig;
pub use errors::SearchError;
pub use interfaces::SearchEngineClient;
pub use meilisearch::MeilisearchClient;
pub use settings::SettingKind;
