use crate::{
    condition::{Binding, Bound},
    properties::{is_variable, is_wildcard, Statement},
};

/// Unify a leaf pattern against a ground statement under an existing
/// environment.
///
/// Matching rules:
/// - verb and negation flag must be equal,
/// - a non-variable pattern term must be string-equal to its statement term,
/// - `?x` binds the single corresponding term,
/// - `*x` must be the last pattern term and binds the (possibly empty) list
///   of all remaining terms under the variable name `?x`,
/// - without a wildcard, term counts must be equal,
/// - every repeated occurrence of a variable must receive the same value,
///   including values already present in `env`.
///
/// Returns the extended environment, or `None` when the match fails.
pub fn match_leaf(
    verb: &str,
    pattern: &[String],
    negated: bool,
    statement: &Statement,
    env: &Binding,
) -> Option<Binding> {
    if verb != statement.verb || negated != statement.negated {
        return None;
    }

    let mut bindings = env.clone();
    for (i, pattern_term) in pattern.iter().enumerate() {
        if is_wildcard(pattern_term) {
            if i != pattern.len() - 1 {
                tracing::debug!(
                    pattern = ?pattern,
                    "greedy wildcard must be the last pattern term"
                );
                return None;
            }
            if statement.terms.len() < i {
                return None;
            }
            let var = format!("?{}", &pattern_term[1..]);
            let captured = Bound::Seq(statement.terms[i..].to_vec());
            if !bindings.bind(&var, captured) {
                return None;
            }
            return Some(bindings);
        }

        let Some(statement_term) = statement.terms.get(i) else {
            return None;
        };
        if is_variable(pattern_term) {
            if !bindings.bind(pattern_term, Bound::Atom(statement_term.clone())) {
                return None;
            }
        } else if pattern_term != statement_term {
            return None;
        }
    }

    // No wildcard: a longer statement is not a match for this pattern.
    if statement.terms.len() != pattern.len() {
        return None;
    }

    Some(bindings)
}
