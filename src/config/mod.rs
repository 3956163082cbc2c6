//! Configuration module for Snapkeep
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! All sections are optional and fall back to defaults.
//!
//! # Example
//!
//! ```no_run
//! use snapkeep::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("snapkeep.toml")).unwrap();
//! println!("Archives are written to: {}", config.output.data_dir);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ClassifierConfig, Config, CrawlerConfig, OutputConfig, SkipRuleEntry, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
