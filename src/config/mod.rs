//! Configuration module for Blog-Sweep
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use blog_sweep::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("blog.toml")).unwrap();
//! println!("Scanning with {} lanes", config.scan.parallel_scans);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BlogConfig, Config, ConnectionConfig, DownloadConfig, MediaConfig, OutputConfig, PageSource,
    ScanConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
