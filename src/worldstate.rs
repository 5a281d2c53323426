//! World state: the auxiliary key-value map mutated by rule effects.
//!
//! Effects mutate this map; rule evaluation never reads it. To make a state
//! change visible to the logic, a rule carries dual consequences: one effect
//! to mutate state and one statement to announce the change.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    condition::Binding,
    error::FabricError,
    properties::{is_variable, Effect, EffectOp},
};

/// An effect with its templates resolved against a concrete binding, ready
/// to apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedEffect {
    pub target_key: String,
    pub operation: EffectOp,
    pub value: Value,
}

impl ResolvedEffect {
    /// Resolve an effect template: a `?var` target key or string value is
    /// substituted from the binding; everything else passes through.
    pub fn resolve(effect: &Effect, binding: &Binding) -> ResolvedEffect {
        let target_key = if is_variable(&effect.target_key) {
            binding.resolve_term(&effect.target_key)
        } else {
            effect.target_key.clone()
        };
        let value = match &effect.value {
            Value::String(s) if is_variable(s) => match binding.get(s) {
                Some(bound) => serde_json::to_value(bound)
                    .expect("bound values always serialize"),
                None => effect.value.clone(),
            },
            other => other.clone(),
        };
        ResolvedEffect {
            target_key,
            operation: effect.operation,
            value,
        }
    }
}

/// The world-state mapping of a belief system.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldState(BTreeMap<String, Value>);

impl WorldState {
    pub fn new() -> WorldState {
        WorldState(BTreeMap::new())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Apply a resolved effect.
    ///
    /// `set` replaces unconditionally; `increment`/`decrement` treat an
    /// absent key as numeric 0 and require numeric operands; `append` treats
    /// an absent key as an empty list.
    pub fn apply(&mut self, effect: &ResolvedEffect) -> Result<(), FabricError> {
        let current = self.0.get(&effect.target_key);
        let next = match effect.operation {
            EffectOp::Set => effect.value.clone(),
            EffectOp::Increment => numeric_shift(current, &effect.value, 1)?,
            EffectOp::Decrement => numeric_shift(current, &effect.value, -1)?,
            EffectOp::Append => {
                let mut list = match current {
                    Some(Value::Array(items)) => items.clone(),
                    Some(other) => vec![other.clone()],
                    None => Vec::new(),
                };
                list.push(effect.value.clone());
                Value::Array(list)
            }
        };
        tracing::debug!(
            key = %effect.target_key,
            old = ?current,
            new = %next,
            operation = %effect.operation,
            "world state change"
        );
        self.0.insert(effect.target_key.clone(), next);
        Ok(())
    }

    /// The keys whose values differ between two snapshots, with the old and
    /// new value for each.
    pub fn diff(
        before: &WorldState,
        after: &WorldState,
    ) -> BTreeMap<String, (Option<Value>, Option<Value>)> {
        let mut changes = BTreeMap::new();
        for key in before.0.keys().chain(after.0.keys()) {
            let old = before.0.get(key);
            let new = after.0.get(key);
            if old != new {
                changes.insert(key.clone(), (old.cloned(), new.cloned()));
            }
        }
        changes
    }
}

impl FromIterator<(String, Value)> for WorldState {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> WorldState {
        WorldState(iter.into_iter().collect())
    }
}

fn numeric_shift(
    current: Option<&Value>,
    operand: &Value,
    sign: i64,
) -> Result<Value, FabricError> {
    let base = match current {
        Some(value) => as_number(value).ok_or_else(|| {
            FabricError::Validation(format!(
                "cannot apply a numeric effect to non-numeric value {value}"
            ))
        })?,
        None => Number::Int(0),
    };
    let delta = as_number(operand).ok_or_else(|| {
        FabricError::Validation(format!("numeric effect requires a numeric operand, got {operand}"))
    })?;
    Ok(match (base, delta) {
        (Number::Int(a), Number::Int(b)) => Value::from(a + sign * b),
        (a, b) => Value::from(a.as_f64() + sign as f64 * b.as_f64()),
    })
}

#[derive(Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }
}

fn as_number(value: &Value) -> Option<Number> {
    match value.as_i64() {
        Some(i) => Some(Number::Int(i)),
        None => value.as_f64().map(Number::Float),
    }
}
