//! Data models and structures for the latency tester

pub mod catalog;
pub mod config;
pub mod target;

// Re-export main model types
pub use config::{CarrierUrls, Config, SourceEndpoints};
pub use target::{normalize_region, ProbeOutcome, Target};
