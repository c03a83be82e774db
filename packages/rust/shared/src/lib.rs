//! Shared types, error model, and configuration for the Rosetta Code extractor.
//!
//! This crate is the foundation depended on by all other workspace crates.
//! It provides:
//! - [`RosettaError`]: the unified error type
//! - [`PageKind`] and name canonicalization
//! - Configuration ([`AppConfig`], [`ExtractionConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CacheConfig, ExtractionConfig, SourceConfig, cache_db_path, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{Result, RosettaError};
pub use types::{PageKind, canonical_name};
