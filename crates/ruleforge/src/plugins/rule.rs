//! Rule plugin trait.

use crate::Result;
use crate::plugins::Plugin;
use crate::types::{AttributeSet, DocumentContext};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The component category a rule is registered under.
///
/// The rule-execution host discovers rules by category and runs them in the
/// order the host's rule set dictates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleCategory {
    /// Builds attributes from document text.
    Parser,
    /// Rewrites, reorders, or defaults existing attributes.
    Modifier,
    /// Assigns confidence scores to attributes.
    Scorer,
    /// Picks a subset of candidate attributes.
    Selector,
    /// Tags attributes or documents for downstream routing.
    Tagger,
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Parser => "parser",
            Self::Modifier => "modifier",
            Self::Scorer => "scorer",
            Self::Selector => "selector",
            Self::Tagger => "tagger",
        };
        f.write_str(name)
    }
}

/// Trait for rule plugins.
///
/// A rule receives the attributes found so far for one document and transforms
/// them in place.
///
/// # Example
///
/// ```rust
/// use ruleforge::plugins::{Plugin, Rule, RuleCategory};
/// use ruleforge::types::{AttributeSet, DocumentContext};
/// use ruleforge::Result;
/// use async_trait::async_trait;
///
/// struct TrimValues;
///
/// impl Plugin for TrimValues {
///     fn name(&self) -> &str { "trim-values" }
///     fn version(&self) -> String { "1.0.0".to_string() }
///     fn initialize(&self) -> Result<()> { Ok(()) }
///     fn shutdown(&self) -> Result<()> { Ok(()) }
/// }
///
/// #[async_trait]
/// impl Rule for TrimValues {
///     fn category(&self) -> RuleCategory {
///         RuleCategory::Modifier
///     }
///
///     async fn process(&self, attributes: &mut AttributeSet, _document: &DocumentContext) -> Result<()> {
///         for attribute in attributes.iter_mut() {
///             attribute.value = attribute.value.trim().to_string();
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Rule: Plugin {
    fn category(&self) -> RuleCategory;

    /// Ordering within a category; higher runs first. Defaults to 50.
    fn priority(&self) -> i32 {
        50
    }

    /// Transform `attributes` for the document described by `document`.
    ///
    /// # Errors
    ///
    /// Errors abort the rule for this document. Rules add their own context
    /// (such as the configuration they tried to load) before returning.
    async fn process(&self, attributes: &mut AttributeSet, document: &DocumentContext) -> Result<()>;
}
