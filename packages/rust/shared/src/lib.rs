//! Shared types, error model, and configuration for meshmaker.
//!
//! This crate is the foundation depended on by all other meshmaker crates.
//! It provides:
//! - [`MeshmakerError`] the unified error type
//! - Domain types ([`OutputFormat`], [`StageKind`])
//! - The defaults file ([`AppConfig`], config loading)
//! - The Configuration Builder ([`ConfigBuilder`], [`Configuration`])

pub mod config;
pub mod error;
pub mod options;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CONFIG_ENV_VAR, DefaultsConfig, LogFormat, LoggingConfig, config_dir,
    config_file_path, load_config, load_config_from,
};
pub use error::{ConfigIssue, ConfigWarning, ConfigurationError, MeshmakerError, Result};
pub use options::{BuildOutcome, ConfigBuilder, Configuration, USAGE, build, requests_help};
pub use types::{OutputFormat, StageKind};
