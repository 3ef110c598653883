//! Shared types, errors, and configuration for ConceptScribe.
//!
//! Every other crate in the workspace depends on this one; it must stay
//! dependency-light and free of I/O beyond config file loading.

mod config;
mod error;
mod types;

pub use config::{
    AnthropicConfig, AppConfig, DefaultsConfig, LimitsConfig, RunLimits, config_dir,
    config_file_path, init_config, load_config, load_config_from, validate_api_key,
};
pub use error::{Result, ScribeError};
pub use types::{Concept, PageText, RunPhase, RunResult, SearchHit, Topic};
