pub mod aggregation;
pub mod config;
pub mod decoder;
pub mod error;
pub mod ingest;
pub mod interfaces;
pub mod observability;
pub mod orchestrator;
pub mod persistence;
pub mod types;
pub mod utils;

// Profile layered over config/default.toml
pub const PROFILE_ENV: &str = "ARB_INGEST_PROFILE";
pub const DEFAULT_PROFILE: &str = "development";
