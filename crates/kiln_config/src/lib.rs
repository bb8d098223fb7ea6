//! Parsing and validation of `kiln.toml` site configuration and `rules.toml`
//! rule files.
//!
//! The site configuration is a flat table whose entries become a
//! [`kiln_model::Configuration`]. The rules file describes compile rules and
//! layout rules as plain data; the compiler turns them into a rule set.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{
    load_rules, load_rules_from_str, load_site_config, load_site_config_from_str, CONFIG_FILE,
    RULES_FILE,
};
pub use types::*;
