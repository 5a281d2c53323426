use std::collections::BTreeSet;

use crate::{
    condition::{match_leaf, Binding, Condition},
    properties::Statement,
};

/// Evaluate a condition against a fact base under an incoming environment.
///
/// Yields every environment extending `env` under which the condition
/// holds. The result is deduplicated and sorted, so evaluation order never
/// leaks into the outcome. Quantifier nodes (`EXISTS`, `FORALL`, `NONE`,
/// `COUNT`) gate the incoming environment without exposing inner bindings;
/// only leaves and conjunctions contribute outward.
///
/// Evaluation is eager: fact bases are small and the fixed-point loop in
/// the inference engine dominates cost.
pub fn eval(condition: &Condition, facts: &[Statement], env: &Binding) -> Vec<Binding> {
    let environments = match condition {
        Condition::Leaf {
            verb,
            terms,
            negated,
        } => facts
            .iter()
            .filter_map(|fact| match_leaf(verb, terms, *negated, fact, env))
            .collect::<BTreeSet<Binding>>(),
        Condition::And { children } => {
            let mut environments = BTreeSet::from([env.clone()]);
            for child in children {
                environments = environments
                    .iter()
                    .flat_map(|e| eval(child, facts, e))
                    .collect();
                if environments.is_empty() {
                    break;
                }
            }
            environments
        }
        Condition::Exists { child } => {
            if eval(child, facts, env).is_empty() {
                BTreeSet::new()
            } else {
                BTreeSet::from([env.clone()])
            }
        }
        Condition::Forall { domain, property } => {
            let holds = eval(domain, facts, env)
                .iter()
                .all(|e| !eval(property, facts, e).is_empty());
            if holds {
                BTreeSet::from([env.clone()])
            } else {
                BTreeSet::new()
            }
        }
        Condition::None { child } => {
            if eval(child, facts, env).is_empty() {
                BTreeSet::from([env.clone()])
            } else {
                BTreeSet::new()
            }
        }
        Condition::Count {
            child,
            operator,
            value,
        } => {
            let count = eval(child, facts, env).len() as u64;
            if operator.eval(count, *value) {
                BTreeSet::from([env.clone()])
            } else {
                BTreeSet::new()
            }
        }
    };
    environments.into_iter().collect()
}
