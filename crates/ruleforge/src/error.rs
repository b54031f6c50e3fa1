//! Error types for Ruleforge.
//!
//! Every fallible operation in the crate returns [`RuleError`]. The enum follows a
//! simple split:
//!
//! **System errors bubble up unchanged:**
//! - `RuleError::Io` (from `std::io::Error`) - file system and permission errors
//!
//! **Application errors carry context:**
//! - `Validation` - invalid configuration, plugin names, or path templates
//! - `Preload` - the preload engine failed to construct or to load a request
//! - `Suppressed` - the engine reported errors through its side channel
//! - `WorkerNotReady` / `WorkerUnresponsive` - worker lifecycle failures
//! - `Rule` - a rule object wrapping any of the above with the configuration it tried
//!
//! # Example
//!
//! ```rust
//! use ruleforge::{Result, RuleError};
//!
//! fn read_template(path: &str) -> Result<String> {
//!     let content = std::fs::read_to_string(path)?;
//!
//!     if content.trim().is_empty() {
//!         return Err(RuleError::validation(format!("Template is empty: {}", path)));
//!     }
//!
//!     Ok(content)
//! }
//! ```
use thiserror::Error;

/// Result type alias using `RuleError`.
pub type Result<T> = std::result::Result<T, RuleError>;

/// Main error type for all Ruleforge operations.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Preload error: {message}")]
    Preload {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The engine routed one or more errors through its blocked-failure side channel.
    /// The operation that produced them is treated as failed.
    #[error("Preload engine reported {} suppressed error(s): {}", .messages.len(), .messages.join("; "))]
    Suppressed { messages: Vec<String> },

    #[error("Preload worker not ready: {0}")]
    WorkerNotReady(String),

    #[error("Preload worker did not respond: {0}")]
    WorkerUnresponsive(String),

    #[error("Client handle has not acquired the preload worker: {0}")]
    NotAcquired(String),

    #[error("Rule '{rule_name}' failed: {message}")]
    Rule {
        rule_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for RuleError {
    fn from(err: serde_json::Error) -> Self {
        RuleError::Serialization {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

macro_rules! error_constructor {
    ($name:ident, $variant:ident) => {
        pastey::paste! {
            #[doc = "Create a " $variant " error"]
            pub fn $name<S: Into<String>>(message: S) -> Self {
                Self::$variant {
                    message: message.into(),
                    source: None,
                }
            }

            #[doc = "Create a " $variant " error with source"]
            pub fn [<$name _with_source>]<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
                message: S,
                source: E,
            ) -> Self {
                Self::$variant {
                    message: message.into(),
                    source: Some(Box::new(source)),
                }
            }
        }
    };
}

impl RuleError {
    error_constructor!(validation, Validation);
    error_constructor!(serialization, Serialization);
    error_constructor!(preload, Preload);

    /// Wrap `source` as a failure of the rule named `rule_name`.
    ///
    /// `context` is prepended to the source message, e.g. the configuration
    /// identity the rule attempted to load.
    pub fn rule<S: Into<String>>(rule_name: S, context: &str, source: RuleError) -> Self {
        Self::Rule {
            rule_name: rule_name.into(),
            message: format!("{}: {}", context, source),
            source: Some(Box::new(source)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: RuleError = io_err.into();
        assert!(matches!(err, RuleError::Io(_)));
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_validation_error() {
        let err = RuleError::validation("invalid input");
        assert_eq!(err.to_string(), "Validation error: invalid input");
    }

    #[test]
    fn test_preload_error_with_source() {
        let source = std::io::Error::other("engine crashed");
        let err = RuleError::preload_with_source("load failed", source);
        assert_eq!(err.to_string(), "Preload error: load failed");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_suppressed_error_lists_messages() {
        let err = RuleError::Suppressed {
            messages: vec!["bad field".to_string(), "missing list".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Preload engine reported 2 suppressed error(s): bad field; missing list"
        );
    }

    #[test]
    fn test_worker_errors() {
        let err = RuleError::WorkerUnresponsive("stop timed out".to_string());
        assert_eq!(err.to_string(), "Preload worker did not respond: stop timed out");

        let err = RuleError::WorkerNotReady("ended during startup".to_string());
        assert_eq!(err.to_string(), "Preload worker not ready: ended during startup");
    }

    #[test]
    fn test_rule_error_carries_context_and_source() {
        let err = RuleError::rule("verification-preloader", "/cfg/a.vcfg", RuleError::preload("boom"));
        assert_eq!(
            err.to_string(),
            "Rule 'verification-preloader' failed: /cfg/a.vcfg: Preload error: boom"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: RuleError = json_err.into();
        assert!(matches!(err, RuleError::Serialization { .. }));
    }

    #[test]
    fn test_io_error_bubbles_unchanged() {
        fn read_file() -> Result<String> {
            let content = std::fs::read_to_string("/nonexistent/ruleforge/file.txt")?;
            Ok(content)
        }

        assert!(matches!(read_file().unwrap_err(), RuleError::Io(_)));
    }
}
