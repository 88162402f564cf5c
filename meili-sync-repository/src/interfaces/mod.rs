//! The search engine boundary.
//!
//! Everything above this crate talks to the engine through
//! [`SearchEngineClient`], so tests can substitute a recording client.

mod search_engine_client;

pub use search_engine_client::SearchEngineClient;
