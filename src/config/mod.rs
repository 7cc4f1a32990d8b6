//! Configuration module for auditgate
//!
//! This module handles:
//! - Project-level configuration (auditgate.toml)
//! - Layered analyzer option snapshots

mod engine_options;
mod project_config;

pub use engine_options::{EngineOptions, EngineOptionsBuilder, OptionsLayer};
pub use project_config::{
    load_project_config, CacheConfig, ProjectConfig, RatchetConfig, CONFIG_FILE,
    DEFAULT_BUDGET_FILE,
};
