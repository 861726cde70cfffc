//! Shared types, error model, and configuration for noticescore.
//!
//! This crate is the foundation depended on by all other noticescore crates.
//! It provides:
//! - [`NoticeScoreError`]: the unified error type
//! - Domain types ([`PreScoringRecord`], [`ScoredRecord`], [`RunManifest`], [`RunId`])
//! - Configuration ([`AppConfig`], [`ScoringConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, MissingTextPolicy, OutputFormat, ScoringConfig,
    ScoringSection, StorageConfig, config_dir, config_file_path, init_config, load_config,
    load_config_from,
};
pub use error::{NoticeScoreError, Result};
pub use types::{
    CURRENT_SCHEMA_VERSION, CorrelationStats, IDENTIFIER_KEYS, PreScoringRecord, RunId,
    RunManifest, ScoredRecord, sha256_hex,
};
