//! Base plugin trait definition.
//!
//! Every rule component implements [`Plugin`], which carries identification and
//! the register/unregister lifecycle.

use crate::Result;

/// Base trait for all rule components.
///
/// # Thread Safety
///
/// Plugins are stored as `Arc<dyn Rule>` and invoked from any thread the host
/// executes rules on, so they must be `Send + Sync`. Mutable state goes behind
/// interior mutability (`Mutex`, atomics, `OnceCell`).
///
/// # Example
///
/// ```rust
/// use ruleforge::plugins::Plugin;
/// use ruleforge::Result;
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// struct TrimValues {
///     initialized: AtomicBool,
/// }
///
/// impl Plugin for TrimValues {
///     fn name(&self) -> &str {
///         "trim-values"
///     }
///
///     fn version(&self) -> String {
///         "1.0.0".to_string()
///     }
///
///     fn initialize(&self) -> Result<()> {
///         self.initialized.store(true, Ordering::Release);
///         Ok(())
///     }
///
///     fn shutdown(&self) -> Result<()> {
///         self.initialized.store(false, Ordering::Release);
///         Ok(())
///     }
/// }
/// ```
pub trait Plugin: Send + Sync {
    /// Unique, kebab-case name used for registration and lookup.
    fn name(&self) -> &str;

    /// Semantic version of this plugin.
    fn version(&self) -> String;

    /// Called once when the plugin is registered.
    ///
    /// # Errors
    ///
    /// The plugin is not registered if this returns an error.
    fn initialize(&self) -> Result<()>;

    /// Called when the plugin is unregistered or the host shuts down.
    ///
    /// Rules holding shared resources (such as a preload client handle) release
    /// them here.
    fn shutdown(&self) -> Result<()>;

    /// Optional description for logging and diagnostics.
    fn description(&self) -> &str {
        ""
    }
}
