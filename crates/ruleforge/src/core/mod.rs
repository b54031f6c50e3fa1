//! Core configuration and identity handling shared by every rule.

pub mod config;
pub mod identity;

pub use config::{PreloaderConfig, RuleforgeConfig};
pub use identity::{ConfigIdentity, expand_path_tags};
