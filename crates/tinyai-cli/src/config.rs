//! CLI configuration via environment variables
//!
//! Project settings live in tinyai.toml; these only change how the CLI
//! presents results.

use std::env;

/// CLI configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Default to JSON output (TINYAI_OUTPUT_FORMAT=json)
    pub default_json: bool,
    /// Disable colored output (TINYAI_NO_COLOR=1 or NO_COLOR=1)
    pub no_color: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            default_json: env::var("TINYAI_OUTPUT_FORMAT")
                .map(|v| v.to_lowercase() == "json")
                .unwrap_or(false),
            no_color: env::var("TINYAI_NO_COLOR").is_ok() || env::var("NO_COLOR").is_ok(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
