//! Rules engine orchestrator
//!
//! Drives batched evaluation of all valid rules of a type against a context.
//! Iteration is strictly sequential: later rules can be short-circuited by a
//! terminal rule, and the merged running result depends on application order.

use crate::context::ExecutionContext;
use crate::error::EngineError;
use crate::evaluator;
use crate::executor;
use crate::registry::{RuleRegistry, SharedRegistry};
use crate::result::{codes, ExecutionResult, RuleError};
use rebill_core::{RuleType, Value};
use std::collections::HashMap;
use std::sync::RwLockReadGuard;
use std::time::Instant;

/// Batch rule executor over a shared registry
#[derive(Clone)]
pub struct RulesEngine {
    registry: SharedRegistry,
}

impl RulesEngine {
    /// Create an engine over a shared registry
    pub fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }

    /// Handle to the underlying registry
    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    fn read_registry(&self) -> RwLockReadGuard<'_, RuleRegistry> {
        crate::registry::read_locked(&self.registry)
    }

    /// Execute all valid rules of `rule_type` against `ctx`.
    ///
    /// Rules run in descending-priority order. Matched rules have their
    /// actions executed and results merged into a running accumulator;
    /// a terminal rule stops the batch. Per-rule action failures are
    /// recorded and evaluation continues, unless the rule's metadata has a
    /// truthy `fail_fast`, which aborts the whole batch.
    pub fn execute(&self, rule_type: RuleType, ctx: &ExecutionContext) -> ExecutionResult {
        let started = Instant::now();
        let registry = self.read_registry();
        let rules = registry.get_valid_rules_at(rule_type, ctx.timestamp);

        tracing::debug!(
            trace_id = %ctx.trace_id,
            ?rule_type,
            candidates = rules.len(),
            "executing rule batch"
        );

        if rules.is_empty() {
            let mut result = ExecutionResult::empty(elapsed_ms(started));
            result.metadata = batch_metadata(0, 0);
            return result;
        }

        let mut accumulator: Option<Value> = None;
        let mut applied_rules = Vec::new();
        let mut errors = Vec::new();
        let mut rules_evaluated = 0usize;

        for rule in rules {
            rules_evaluated += 1;

            if !evaluator::matches_conditions(rule, ctx) {
                continue;
            }

            match executor::execute_actions(rule, ctx) {
                Ok(outcome) => {
                    applied_rules.push(rule.id.clone());
                    merge_result(&mut accumulator, outcome);

                    if rule.terminal {
                        tracing::debug!(rule_id = %rule.id, "terminal rule applied, stopping batch");
                        break;
                    }
                }
                Err(err) => {
                    let fail_fast = rule
                        .metadata
                        .get("fail_fast")
                        .map(Value::is_truthy)
                        .unwrap_or(false);

                    if fail_fast {
                        tracing::warn!(rule_id = %rule.id, %err, "fail-fast rule errored, aborting batch");
                        let mut result = ExecutionResult::failed(
                            RuleError::new(
                                rule.id.clone(),
                                codes::ENGINE_ERROR,
                                format!("batch aborted by fail-fast rule: {}", err),
                            ),
                            elapsed_ms(started),
                        );
                        result.applied_rules = applied_rules;
                        result.result = accumulator;
                        result.metadata =
                            batch_metadata(rules_evaluated, result.applied_rules.len());
                        return result;
                    }

                    tracing::warn!(rule_id = %rule.id, %err, "rule action failed, continuing batch");
                    errors.push(rule_error(rule.id.clone(), err));
                }
            }
        }

        let rules_applied = applied_rules.len();
        ExecutionResult {
            success: errors.is_empty(),
            result: accumulator,
            applied_rules,
            errors,
            duration_ms: elapsed_ms(started),
            metadata: batch_metadata(rules_evaluated, rules_applied),
        }
    }

    /// Execute exactly one rule by id, bypassing the type scan.
    ///
    /// Only the enabled flag is checked here; validity window and terminal
    /// semantics belong to the batch path.
    pub fn execute_rule(&self, id: &str, ctx: &ExecutionContext) -> ExecutionResult {
        let started = Instant::now();
        let registry = self.read_registry();

        let Some(rule) = registry.get_rule(id) else {
            return ExecutionResult::failed(
                RuleError::new(id, codes::RULE_NOT_FOUND, format!("rule '{}' not found", id)),
                elapsed_ms(started),
            );
        };

        if !rule.enabled {
            return ExecutionResult::failed(
                RuleError::new(id, codes::RULE_DISABLED, format!("rule '{}' is disabled", id)),
                elapsed_ms(started),
            );
        }

        if !evaluator::matches_conditions(rule, ctx) {
            let mut result = ExecutionResult::empty(elapsed_ms(started));
            result.metadata = batch_metadata(1, 0);
            return result;
        }

        match executor::execute_actions(rule, ctx) {
            Ok(outcome) => {
                let mut result = ExecutionResult::empty(elapsed_ms(started));
                result.result = Some(outcome);
                result.applied_rules = vec![rule.id.clone()];
                result.metadata = batch_metadata(1, 1);
                result
            }
            Err(err) => ExecutionResult::failed(rule_error(rule.id.clone(), err), elapsed_ms(started)),
        }
    }
}

/// Merge one action outcome into the running accumulator.
///
/// Objects shallow-merge with new keys winning, arrays concatenate, and
/// scalars overwrite.
fn merge_result(accumulator: &mut Option<Value>, outcome: Value) {
    let merged = match (accumulator.take(), outcome) {
        (None, new) => new,
        (Some(Value::Object(mut acc)), Value::Object(new)) => {
            for (k, v) in new {
                acc.insert(k, v);
            }
            Value::Object(acc)
        }
        (Some(Value::Array(mut acc)), Value::Array(new)) => {
            acc.extend(new);
            Value::Array(acc)
        }
        (Some(_), new) => new,
    };
    *accumulator = Some(merged);
}

fn rule_error(rule_id: String, err: EngineError) -> RuleError {
    RuleError::new(rule_id, codes::RULE_EXECUTION_ERROR, err.to_string())
}

fn batch_metadata(evaluated: usize, applied: usize) -> HashMap<String, Value> {
    let mut metadata = HashMap::new();
    metadata.insert("rules_evaluated".to_string(), Value::from(evaluated as i64));
    metadata.insert("rules_applied".to_string(), Value::from(applied as i64));
    metadata
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
