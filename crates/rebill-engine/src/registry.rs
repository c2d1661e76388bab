//! Rule registry
//!
//! Pure in-memory rule storage, indexed by id and by type. Per-type buckets
//! are kept sorted by descending priority; ties keep insertion order (the
//! sort is stable).
//!
//! The registry is shared mutable state. Register/unregister mutate the id
//! map and the type bucket non-atomically, so writers must be serialized
//! against each other. Wrap the registry in the [`SharedRegistry`] alias
//! (`Arc<RwLock<..>>`) when sharing it across policies.

use rebill_core::{Rule, RuleType};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Shared handle to a registry; the composition root constructs one registry
/// and hands clones of this to every policy that needs it
pub type SharedRegistry = Arc<RwLock<RuleRegistry>>;

/// Read-lock a shared registry, recovering from a poisoned lock
pub fn read_locked(registry: &SharedRegistry) -> std::sync::RwLockReadGuard<'_, RuleRegistry> {
    match registry.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Write-lock a shared registry, recovering from a poisoned lock
pub fn write_locked(registry: &SharedRegistry) -> std::sync::RwLockWriteGuard<'_, RuleRegistry> {
    match registry.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// In-memory rule store
#[derive(Debug, Default)]
pub struct RuleRegistry {
    /// All rules by id
    rules: HashMap<String, Rule>,

    /// Rule ids per type, sorted by descending priority
    by_type: HashMap<RuleType, Vec<String>>,
}

/// Registry statistics snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryStatistics {
    pub total: usize,
    pub enabled: usize,
    pub disabled: usize,
    /// Counts per rule type, zero-filled for types with no rules
    pub by_type: HashMap<RuleType, usize>,
}

impl RuleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap this registry for sharing across policies
    pub fn into_shared(self) -> SharedRegistry {
        Arc::new(RwLock::new(self))
    }

    /// Register a rule, replacing any existing rule with the same id.
    ///
    /// The rule is validated first; on failure the registry is unchanged.
    pub fn register_rule(&mut self, rule: Rule) -> rebill_core::error::Result<()> {
        rule.validate()?;

        if self.rules.contains_key(&rule.id) {
            self.unregister_rule(&rule.id);
        }

        tracing::debug!(
            rule_id = %rule.id,
            rule_type = ?rule.rule_type,
            priority = rule.priority,
            "registering rule"
        );

        let rule_type = rule.rule_type;
        self.by_type
            .entry(rule_type)
            .or_default()
            .push(rule.id.clone());
        self.rules.insert(rule.id.clone(), rule);
        self.resort_bucket(rule_type);

        Ok(())
    }

    /// Remove a rule by id; unknown ids are a no-op
    pub fn unregister_rule(&mut self, id: &str) {
        let Some(rule) = self.rules.remove(id) else {
            return;
        };
        if let Some(bucket) = self.by_type.get_mut(&rule.rule_type) {
            bucket.retain(|rule_id| rule_id != id);
        }
    }

    /// Bulk-register a list of rules.
    ///
    /// Every rule is validated up front; on any failure nothing is
    /// registered.
    pub fn load_rules(&mut self, rules: Vec<Rule>) -> rebill_core::error::Result<()> {
        for rule in &rules {
            rule.validate()?;
        }
        for rule in rules {
            self.register_rule(rule)?;
        }
        Ok(())
    }

    /// Clear the registry, then bulk-register a fresh rule list
    pub fn reload_rules(&mut self, rules: Vec<Rule>) -> rebill_core::error::Result<()> {
        for rule in &rules {
            rule.validate()?;
        }
        self.clear();
        self.load_rules(rules)
    }

    /// Look up a rule by id
    pub fn get_rule(&self, id: &str) -> Option<&Rule> {
        self.rules.get(id)
    }

    /// All rules of a type, sorted by descending priority
    pub fn get_rules_by_type(&self, rule_type: RuleType) -> Vec<&Rule> {
        self.by_type
            .get(&rule_type)
            .map(|bucket| {
                bucket
                    .iter()
                    .filter_map(|id| self.rules.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Enabled rules of a type, sorted by descending priority
    pub fn get_enabled_rules_by_type(&self, rule_type: RuleType) -> Vec<&Rule> {
        self.get_rules_by_type(rule_type)
            .into_iter()
            .filter(|rule| rule.enabled)
            .collect()
    }

    /// Enabled rules of a type whose validity window contains `at`
    pub fn get_valid_rules_at(&self, rule_type: RuleType, at: DateTime<Utc>) -> Vec<&Rule> {
        self.get_enabled_rules_by_type(rule_type)
            .into_iter()
            .filter(|rule| rule.is_valid_at(at))
            .collect()
    }

    /// Every registered rule, in no particular order
    pub fn get_all_rules(&self) -> Vec<&Rule> {
        self.rules.values().collect()
    }

    /// Total number of registered rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if no rules are registered
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Snapshot counts, zero-filled for every known type
    pub fn statistics(&self) -> RegistryStatistics {
        let enabled = self.rules.values().filter(|rule| rule.enabled).count();
        let mut by_type: HashMap<RuleType, usize> =
            RuleType::ALL.iter().map(|t| (*t, 0)).collect();
        for rule in self.rules.values() {
            *by_type.entry(rule.rule_type).or_default() += 1;
        }

        RegistryStatistics {
            total: self.rules.len(),
            enabled,
            disabled: self.rules.len() - enabled,
            by_type,
        }
    }

    /// Empty all registry state
    pub fn clear(&mut self) {
        self.rules.clear();
        self.by_type.clear();
    }

    fn resort_bucket(&mut self, rule_type: RuleType) {
        let rules = &self.rules;
        if let Some(bucket) = self.by_type.get_mut(&rule_type) {
            // Stable sort: equal priorities keep insertion order
            bucket.sort_by(|a, b| {
                let pa = rules.get(a).map(|r| r.priority).unwrap_or(0);
                let pb = rules.get(b).map(|r| r.priority).unwrap_or(0);
                pb.cmp(&pa)
            });
        }
    }
}
