//! Condition evaluation for condition steps and reconcile matching rules.
//!
//! A condition list is combined by a left fold: the running result starts at
//! `true` and each condition is folded in with its own `logical_operator`
//! (`and` when absent). Every condition is evaluated; the fold does not
//! short-circuit.

use std::collections::HashMap;

use regex::Regex;
use serde_json::Value;
use windlass_types::workflow::{Condition, ConditionOperator, LogicalOperator};

use super::state::{resolve_path, value_to_string};

/// Evaluate an ordered condition list against the state blackboard.
pub fn evaluate_conditions(conditions: &[Condition], state: &HashMap<String, Value>) -> bool {
    let mut result = true;
    for condition in conditions {
        let outcome = evaluate_condition(condition, state);
        result = match condition.logical_operator {
            Some(LogicalOperator::Or) => result || outcome,
            _ => result && outcome,
        };
    }
    result
}

/// Evaluate a single condition. Unresolvable fields and type mismatches
/// evaluate to `false` (except the not_* operators, which invert).
pub fn evaluate_condition(condition: &Condition, state: &HashMap<String, Value>) -> bool {
    let field_value = resolve_path(&condition.field, state);
    match condition.operator {
        ConditionOperator::Equals => field_value.is_some_and(|v| *v == condition.value),
        ConditionOperator::NotEquals => !field_value.is_some_and(|v| *v == condition.value),
        ConditionOperator::GreaterThan => compare_numbers(field_value, &condition.value)
            .is_some_and(|(field, operand)| field > operand),
        ConditionOperator::LessThan => compare_numbers(field_value, &condition.value)
            .is_some_and(|(field, operand)| field < operand),
        ConditionOperator::Contains => contains(field_value, &condition.value),
        ConditionOperator::NotContains => !contains(field_value, &condition.value),
        ConditionOperator::Exists => field_value.is_some_and(|v| !v.is_null()),
        ConditionOperator::NotExists => !field_value.is_some_and(|v| !v.is_null()),
        ConditionOperator::Regex => matches_regex(field_value, &condition.value),
    }
}

fn compare_numbers(field_value: Option<&Value>, operand: &Value) -> Option<(f64, f64)> {
    Some((field_value?.as_f64()?, operand.as_f64()?))
}

fn contains(field_value: Option<&Value>, operand: &Value) -> bool {
    match field_value {
        Some(Value::String(s)) => s.contains(&value_to_string(operand)),
        _ => false,
    }
}

/// Invalid patterns evaluate to false rather than failing the step.
fn matches_regex(field_value: Option<&Value>, operand: &Value) -> bool {
    let Some(pattern) = operand.as_str() else {
        return false;
    };
    let Ok(pattern) = Regex::new(pattern) else {
        return false;
    };
    match field_value {
        Some(value) => pattern.is_match(&value_to_string(value)),
        None => false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
