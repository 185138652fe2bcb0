// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod config;
pub mod document;
pub mod fetch;
pub mod freshness;
pub mod sources;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::config::Settings;
pub use crate::fetch::{Fetch, HttpFetcher};
pub use crate::telemetry::packet::{Location, Packet};
