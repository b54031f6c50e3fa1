//! Rule plugin system.
//!
//! Rules are the units a rule-execution host runs over the attributes of each
//! document. They are trait objects registered by name and category.
//!
//! # Plugin Types
//!
//! - [`Plugin`] - Base trait carrying name, version, and lifecycle hooks
//! - [`Rule`] - Attribute transformation, grouped by [`RuleCategory`]
//! - [`VerificationPreloader`] - Built-in `Modifier` rule backed by the shared preload worker
//!
//! # Lifecycle Pattern
//!
//! Rules are stored in `Arc<dyn Rule>` for shared access across host threads:
//!
//! ```rust
//! use ruleforge::plugins::{Plugin, Rule, RuleCategory};
//! use ruleforge::plugins::registry::get_rule_registry;
//! use ruleforge::types::{AttributeSet, DocumentContext};
//! use std::sync::Arc;
//!
//! # struct Noop;
//! # impl Plugin for Noop {
//! #     fn name(&self) -> &str { "noop" }
//! #     fn version(&self) -> String { "1.0.0".to_string() }
//! #     fn initialize(&self) -> ruleforge::Result<()> { Ok(()) }
//! #     fn shutdown(&self) -> ruleforge::Result<()> { Ok(()) }
//! # }
//! # #[async_trait::async_trait]
//! # impl Rule for Noop {
//! #     fn category(&self) -> RuleCategory { RuleCategory::Tagger }
//! #     async fn process(&self, _: &mut AttributeSet, _: &DocumentContext) -> ruleforge::Result<()> { Ok(()) }
//! # }
//! let registry = get_rule_registry();
//! let mut registry = registry.write().unwrap();
//!
//! // Calls initialize internally
//! registry.register(Arc::new(Noop))?;
//! assert_eq!(registry.get_for_category(RuleCategory::Tagger).len(), 1);
//!
//! // Calls shutdown
//! registry.remove("noop")?;
//! # Ok::<(), ruleforge::RuleError>(())
//! ```

mod preloader;
pub mod registry;
mod rule;
mod traits;

pub use preloader::VerificationPreloader;
pub use registry::{clear_rules, list_rules, register_rule, unregister_rule};
pub use rule::{Rule, RuleCategory};
pub use traits::Plugin;
