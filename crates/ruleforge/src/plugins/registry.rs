//! Rule registration and discovery.
//!
//! The rule-execution host finds rules through a [`RuleRegistry`], indexed by
//! [`RuleCategory`] and priority. A process-wide instance is available through
//! [`get_rule_registry`].

use crate::plugins::{Rule, RuleCategory};
use crate::{Result, RuleError};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

/// Validate a rule name before registration.
///
/// # Rules
///
/// - Name cannot be empty
/// - Name cannot contain whitespace
fn validate_rule_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(RuleError::validation("Rule name cannot be empty"));
    }

    if name.contains(char::is_whitespace) {
        return Err(RuleError::validation(format!(
            "Rule name '{}' cannot contain whitespace",
            name
        )));
    }

    Ok(())
}

/// Registry of rule plugins, grouped by category.
///
/// Within a category rules are ordered by priority (highest first), then by
/// registration order.
pub struct RuleRegistry {
    rules: HashMap<RuleCategory, BTreeMap<i32, IndexMap<String, Arc<dyn Rule>>>>,
    name_index: HashMap<String, (RuleCategory, i32)>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self {
            rules: HashMap::new(),
            name_index: HashMap::new(),
        }
    }

    /// Register a rule, calling its `initialize` first.
    ///
    /// A rule registered under an existing name replaces the old one, which is
    /// shut down.
    pub fn register(&mut self, rule: Arc<dyn Rule>) -> Result<()> {
        let name = rule.name().to_string();
        let category = rule.category();
        let priority = rule.priority();

        validate_rule_name(&name)?;

        rule.initialize()?;

        if self.name_index.contains_key(&name) {
            self.remove(&name)?;
        }

        self.rules
            .entry(category)
            .or_default()
            .entry(priority)
            .or_default()
            .insert(name.clone(), rule);

        tracing::debug!("Registered {} rule '{}' (priority {})", category, name, priority);
        self.name_index.insert(name, (category, priority));

        Ok(())
    }

    /// Get a rule by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Rule>> {
        self.name_index
            .get(name)
            .and_then(|(category, priority)| self.rules.get(category)?.get(priority)?.get(name))
            .cloned()
            .ok_or_else(|| RuleError::Rule {
                rule_name: name.to_string(),
                message: "rule not registered".to_string(),
                source: None,
            })
    }

    /// All rules in `category`, highest priority first.
    pub fn get_for_category(&self, category: RuleCategory) -> Vec<Arc<dyn Rule>> {
        self.rules
            .get(&category)
            .map(|by_priority| {
                by_priority
                    .values()
                    .rev()
                    .flat_map(|rules| rules.values().cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn list(&self) -> Vec<String> {
        self.name_index.keys().cloned().collect()
    }

    /// Remove a rule, calling its `shutdown`. Unknown names are ignored.
    pub fn remove(&mut self, name: &str) -> Result<()> {
        let Some((category, priority)) = self.name_index.remove(name) else {
            return Ok(());
        };

        let mut removed = None;
        if let Some(by_priority) = self.rules.get_mut(&category) {
            if let Some(rules) = by_priority.get_mut(&priority) {
                removed = rules.shift_remove(name);
                if rules.is_empty() {
                    by_priority.remove(&priority);
                }
            }
            if by_priority.is_empty() {
                self.rules.remove(&category);
            }
        }

        if let Some(rule) = removed {
            rule.shutdown()?;
        }

        Ok(())
    }

    /// Shut down every rule and clear the registry.
    pub fn shutdown_all(&mut self) -> Result<()> {
        for name in self.list() {
            self.remove(&name)?;
        }
        Ok(())
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Global rule registry singleton.
pub static RULE_REGISTRY: Lazy<Arc<RwLock<RuleRegistry>>> = Lazy::new(|| Arc::new(RwLock::new(RuleRegistry::new())));

/// Get the global rule registry.
pub fn get_rule_registry() -> Arc<RwLock<RuleRegistry>> {
    RULE_REGISTRY.clone()
}

/// Register a rule with the global registry.
pub fn register_rule(rule: Arc<dyn Rule>) -> Result<()> {
    let registry = get_rule_registry();
    let mut registry = registry
        .write()
        .map_err(|e| RuleError::LockPoisoned(format!("Rule registry write lock poisoned: {}", e)))?;
    registry.register(rule)
}

/// Unregister a rule from the global registry by name.
pub fn unregister_rule(name: &str) -> Result<()> {
    let registry = get_rule_registry();
    let mut registry = registry
        .write()
        .map_err(|e| RuleError::LockPoisoned(format!("Rule registry write lock poisoned: {}", e)))?;
    registry.remove(name)
}

/// Names of all rules in the global registry.
pub fn list_rules() -> Result<Vec<String>> {
    let registry = get_rule_registry();
    let registry = registry
        .read()
        .map_err(|e| RuleError::LockPoisoned(format!("Rule registry read lock poisoned: {}", e)))?;
    Ok(registry.list())
}

/// Shut down and remove every rule in the global registry.
pub fn clear_rules() -> Result<()> {
    let registry = get_rule_registry();
    let mut registry = registry
        .write()
        .map_err(|e| RuleError::LockPoisoned(format!("Rule registry write lock poisoned: {}", e)))?;
    registry.shutdown_all()
}
