//! Shared types, error model, and configuration for IssuePress.
//!
//! This crate is the foundation depended on by all other IssuePress crates.
//! It provides:
//! - [`IssuePressError`]: the unified error type
//! - Domain types ([`RunContext`], [`IssueReference`], [`OutputArtifact`], [`RunManifest`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CoverConfig, NewsletterConfig, PathsConfig, SiteConfig, config_dir,
    config_file_path, expand_path, init_config, init_config_in, load_config, load_config_from,
    validate_config,
};
pub use error::{IssuePressError, Result};
pub use types::{
    ArtifactMeta, CURRENT_SCHEMA_VERSION, EbookFormat, EbookMetadata, IssueReference,
    OutputArtifact, PublishOutcome, RunContext, RunId, RunManifest, Stage,
};
