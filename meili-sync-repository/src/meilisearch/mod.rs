//! Meilisearch implementation of the search engine client.

mod client;

pub use client::MeilisearchClient;
