//! [crate::properties] contains the basic building blocks of the fabric:
//! statements, effects, consequences, and rules, together with their
//! canonical serialized forms and content-addressed identities.

use std::{
    cmp::Ordering,
    collections::BTreeMap,
    fmt::{self, Display, Formatter},
    hash::{Hash, Hasher},
    str::FromStr,
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use uuid::Uuid;

use crate::{condition::Condition, error::FabricError};

/// The Fabricator namespace UUID. Content-addressed identities (rules,
/// statements, bindings) are v5 UUIDs generated within this namespace from
/// canonical JSON bytes, so equal content yields equal ids across processes
/// and across the persistence graph.
pub const UUID_NAMESPACE_FABRICATOR: Uuid = Uuid::from_bytes([
    0x9c, 0x1f, 0x4e, 0x02, 0xd7, 0x55, 0x4a, 0x8e, 0xb6, 0x41, 0x2a, 0x77, 0x5e, 0x93, 0x0c, 0x1d,
]);

/// Deterministic id for a canonical byte string.
pub fn content_uuid(bytes: &[u8]) -> Uuid {
    Uuid::new_v5(&UUID_NAMESPACE_FABRICATOR, bytes)
}

/// Values with a stable canonical JSON rendering and a content-derived id.
///
/// Canonical means: struct fields in declaration order, map-like data in
/// `BTreeMap`s, no insignificant whitespace. Two values with equal canonical
/// JSON are the same node everywhere, including in the persistence graph.
pub trait Canonical: Serialize {
    fn canonical_json(&self) -> String {
        serde_json::to_string(self).expect("canonical value types always serialize")
    }

    fn content_id(&self) -> Uuid {
        content_uuid(self.canonical_json().as_bytes())
    }
}

/// True for a `?var` pattern term.
pub fn is_variable(term: &str) -> bool {
    term.starts_with('?')
}

/// True for a `*rest` greedy wildcard pattern term.
pub fn is_wildcard(term: &str) -> bool {
    term.starts_with('*')
}

/// An asserted or derived fact: a verb, an ordered term sequence, a negation
/// flag, and a priority.
///
/// Equality, ordering, and hashing consider only the content triple
/// `(verb, terms, negated)`. `priority` is metadata carried for the
/// priority-aware forking strategies and never part of identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    pub verb: String,
    pub terms: Vec<String>,
    #[serde(default)]
    pub negated: bool,
    #[serde(default)]
    pub priority: i32,
}

impl Statement {
    pub fn new<S: Into<String>>(verb: S, terms: Vec<String>) -> Statement {
        Statement {
            verb: verb.into(),
            terms,
            negated: false,
            priority: 0,
        }
    }

    pub fn negate(mut self) -> Statement {
        self.negated = !self.negated;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Statement {
        self.priority = priority;
        self
    }

    /// A statement is ground when no term is a variable or wildcard pattern.
    pub fn is_ground(&self) -> bool {
        !self
            .terms
            .iter()
            .any(|t| is_variable(t) || is_wildcard(t))
    }

    /// The statement that would contradict this one: same content, opposite
    /// negation.
    pub fn negation(&self) -> Statement {
        Statement {
            verb: self.verb.clone(),
            terms: self.terms.clone(),
            negated: !self.negated,
            priority: self.priority,
        }
    }

    fn content_triple(&self) -> (&str, &[String], bool) {
        (&self.verb, &self.terms, self.negated)
    }
}

impl Canonical for Statement {
    fn canonical_json(&self) -> String {
        // priority is metadata, not identity
        serde_json::json!({
            "verb": self.verb,
            "terms": self.terms,
            "negated": self.negated,
        })
        .to_string()
    }
}

impl PartialEq for Statement {
    fn eq(&self, other: &Self) -> bool {
        self.content_triple() == other.content_triple()
    }
}

impl Eq for Statement {}

impl PartialOrd for Statement {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Statement {
    fn cmp(&self, other: &Self) -> Ordering {
        self.content_triple().cmp(&other.content_triple())
    }
}

impl Hash for Statement {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.content_triple().hash(state);
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let neg = if self.negated { "NOT " } else { "" };
        write!(f, "({}{} {})", neg, self.verb, self.terms.join(" "))
    }
}

/// A world-state mutation operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectOp {
    Set,
    Increment,
    Decrement,
    Append,
}

impl FromStr for EffectOp {
    type Err = FabricError;

    fn from_str(s: &str) -> Result<EffectOp, FabricError> {
        match s {
            "set" => Ok(EffectOp::Set),
            "increment" => Ok(EffectOp::Increment),
            "decrement" => Ok(EffectOp::Decrement),
            "append" => Ok(EffectOp::Append),
            other => Err(FabricError::Validation(format!(
                "unknown effect operation '{other}'"
            ))),
        }
    }
}

impl Display for EffectOp {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            EffectOp::Set => write!(f, "set"),
            EffectOp::Increment => write!(f, "increment"),
            EffectOp::Decrement => write!(f, "decrement"),
            EffectOp::Append => write!(f, "append"),
        }
    }
}

/// A world-state mutation template. `target_key` or a string `value` may be
/// a `?var`, resolved through the triggering binding at application time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    pub target_key: String,
    pub operation: EffectOp,
    pub value: Value,
}

impl Effect {
    pub fn new<S: Into<String>>(target_key: S, operation: EffectOp, value: Value) -> Effect {
        Effect {
            target_key: target_key.into(),
            operation,
            value,
        }
    }
}

impl Canonical for Effect {}

impl Display for Effect {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{} {} by {}", self.operation, self.target_key, self.value)
    }
}

/// A rule consequence: a statement template to derive, or an effect template
/// to apply to the world state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Consequence {
    Statement(Statement),
    Effect(Effect),
}

impl Canonical for Consequence {}

impl Display for Consequence {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Consequence::Statement(s) => write!(f, "{s}"),
            Consequence::Effect(e) => write!(f, "{e}"),
        }
    }
}

/// An immutable pair of a condition and one or more consequences.
///
/// A rule's identity is the canonical JSON of `(condition, consequences)`;
/// content-equal rules are a single node everywhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub condition: Condition,
    pub consequences: Vec<Consequence>,
}

impl Rule {
    pub fn new(condition: Condition, consequences: Vec<Consequence>) -> Rule {
        Rule {
            condition,
            consequences,
        }
    }

    pub fn id(&self) -> Uuid {
        self.content_id()
    }
}

impl Canonical for Rule {}

impl Display for Rule {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let consequences = self
            .consequences
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<String>>()
            .join(", ");
        write!(f, "IF {} THEN {}", self.condition, consequences)
    }
}

/// A content-addressed interning table.
///
/// Canonical values are stored once, keyed by content id; holders pass the
/// id around instead of sharing pointers. Lookups hand out cheap `Arc`
/// clones of the interned value.
#[derive(Debug, Clone, Default)]
pub struct Interner<T: Canonical> {
    entries: BTreeMap<Uuid, Arc<T>>,
}

impl<T: Canonical> Interner<T> {
    pub fn new() -> Interner<T> {
        Interner {
            entries: BTreeMap::new(),
        }
    }

    /// Insert a value, returning its handle. Re-interning equal content is a
    /// no-op returning the existing handle.
    pub fn intern(&mut self, value: T) -> Uuid {
        let id = value.content_id();
        self.entries.entry(id).or_insert_with(|| Arc::new(value));
        id
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<T>> {
        self.entries.get(id).cloned()
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Uuid, &Arc<T>)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statement(text: &str) -> Statement {
        let mut parts = text.split_whitespace();
        let verb = parts.next().unwrap().to_string();
        Statement::new(verb, parts.map(str::to_string).collect())
    }

    #[test]
    fn priority_is_metadata_not_identity() {
        let a = statement("is sky blue");
        let b = statement("is sky blue").with_priority(7);
        assert_eq!(a, b);
        assert_eq!(a.content_id(), b.content_id());
    }

    #[test]
    fn negation_breaks_content_equality() {
        let a = statement("is sky blue");
        let b = statement("is sky blue").negate();
        assert_ne!(a, b);
        assert_ne!(a.content_id(), b.content_id());
        assert_eq!(a.negation(), b);
    }

    #[test]
    fn groundness_accounts_for_wildcards() {
        assert!(statement("is socrates man").is_ground());
        assert!(!statement("is ?x man").is_ground());
        assert!(!statement("says ravi *rest").is_ground());
    }

    #[test]
    fn content_equal_rules_share_an_id() {
        let rule_a = Rule::new(
            Condition::leaf("is", vec!["?x".into(), "man".into()], false),
            vec![Consequence::Statement(statement("is ?x mortal"))],
        );
        let rule_b = Rule::new(
            Condition::leaf("is", vec!["?x".into(), "man".into()], false),
            vec![Consequence::Statement(statement("is ?x mortal"))],
        );
        assert_eq!(rule_a.id(), rule_b.id());
    }

    #[test]
    fn interner_deduplicates_by_content() {
        let mut table = Interner::new();
        let first = table.intern(statement("is sky blue"));
        let second = table.intern(statement("is sky blue").with_priority(3));
        assert_eq!(first, second);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn unknown_effect_operation_is_a_validation_error() {
        let err = "delete".parse::<EffectOp>().unwrap_err();
        assert!(matches!(err, FabricError::Validation(_)));
    }
}
