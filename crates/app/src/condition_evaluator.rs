//! Condition evaluator: runs every condition of a rule and folds the results.
//!
//! Evaluation never short-circuits: each condition is resolved and recorded
//! in the trace even once the overall verdict is known.

use autorule_domain::change::EventKind;
use autorule_domain::context::TriggerContext;
use autorule_domain::execution::ConditionResult;
use autorule_domain::rule::{Condition, Operator, PATH_SEPARATOR, Rule};
use autorule_domain::value::Value;

use crate::field_resolver::FieldResolver;
use crate::ports::EntityLookup;

/// Verdict of a rule's conditions plus the per-condition trace.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub passed: bool,
    pub trace: Vec<ConditionResult>,
}

/// Evaluates rule conditions against trigger contexts.
pub struct ConditionEvaluator<E> {
    resolver: FieldResolver<E>,
}

impl<E: EntityLookup> ConditionEvaluator<E> {
    pub fn new(lookup: E) -> Self {
        Self {
            resolver: FieldResolver::new(lookup),
        }
    }

    /// Evaluate all of `rule`'s conditions and combine them.
    #[tracing::instrument(skip_all, fields(rule_id = %rule.id))]
    pub async fn evaluate(&self, rule: &Rule, context: &TriggerContext) -> Evaluation {
        let mut trace = Vec::with_capacity(rule.conditions.len());
        for condition in &rule.conditions {
            trace.push(self.evaluate_condition(condition, context).await);
        }
        let passed = rule.combination.combine(trace.iter().map(|r| r.passed));
        tracing::debug!(passed, conditions = trace.len(), "conditions evaluated");
        Evaluation { passed, trace }
    }

    async fn evaluate_condition(
        &self,
        condition: &Condition,
        context: &TriggerContext,
    ) -> ConditionResult {
        if condition.operator.is_change() {
            return evaluate_change(condition, context);
        }

        let mut result = ConditionResult {
            field: condition.field.clone(),
            operator: condition.operator,
            expected: condition.value.clone(),
            resolved: None,
            previous: None,
            passed: false,
            note: None,
        };
        match self.resolver.resolve(&condition.field, context).await {
            Some(actual) => {
                let verdict = condition.operator.apply(&actual, &condition.value);
                result.passed = verdict.passed;
                result.note = verdict.note;
                result.resolved = Some(actual);
            }
            None => {
                result.passed = condition.operator == Operator::IsNull;
                result.note = Some("field not found".to_string());
            }
        }
        result
    }
}

/// `changed_to` / `changed_from` read both snapshots of an update; a field
/// missing on one side counts as null there.
fn evaluate_change(condition: &Condition, context: &TriggerContext) -> ConditionResult {
    let mut result = ConditionResult {
        field: condition.field.clone(),
        operator: condition.operator,
        expected: condition.value.clone(),
        resolved: None,
        previous: None,
        passed: false,
        note: None,
    };

    let Some(change) = context
        .change()
        .filter(|n| n.event_kind == EventKind::Updated)
    else {
        result.note = Some(format!(
            "{} only applies to updated events",
            condition.operator
        ));
        return result;
    };
    let (Some(before), Some(after)) = (&change.before, &change.after) else {
        result.note = Some("update carries no before/after snapshots".to_string());
        return result;
    };
    if condition.field.contains(PATH_SEPARATOR) {
        result.note = Some("change operators only read direct fields".to_string());
        return result;
    }

    let previous = before.get(&condition.field).cloned().unwrap_or(Value::Null);
    let current = after.get(&condition.field).cloned().unwrap_or(Value::Null);
    let changed = previous != current;
    result.passed = changed
        && match condition.operator {
            Operator::ChangedFrom => previous == condition.value,
            _ => current == condition.value,
        };
    result.previous = Some(previous);
    result.resolved = Some(current);
    result
}
