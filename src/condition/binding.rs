use std::{
    collections::BTreeMap,
    fmt::{self, Display, Formatter},
};

use serde::{Deserialize, Serialize};

use crate::properties::{Canonical, Uuid};

/// A value bound to a variable: a single term, or the term list captured by
/// a greedy wildcard.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Bound {
    Atom(String),
    Seq(Vec<String>),
}

impl Bound {
    /// Render for substitution into a statement term. Wildcard captures
    /// render as a JSON array so derived statements stay single-term-per-slot.
    pub fn render(&self) -> String {
        match self {
            Bound::Atom(term) => term.clone(),
            Bound::Seq(terms) => {
                serde_json::to_string(terms).expect("string lists always serialize")
            }
        }
    }
}

impl Display for Bound {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

impl From<&str> for Bound {
    fn from(term: &str) -> Bound {
        Bound::Atom(term.to_string())
    }
}

/// A binding environment: a mapping from variable names (`?x`) to bound
/// values, under which a condition holds.
///
/// The map is a `BTreeMap` so the canonical JSON is order-stable; the
/// environment's [`Binding::id`] keys the causal memo and the deterministic
/// effect order.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Binding(BTreeMap<String, Bound>);

impl Binding {
    pub fn new() -> Binding {
        Binding(BTreeMap::new())
    }

    pub fn get(&self, var: &str) -> Option<&Bound> {
        self.0.get(var)
    }

    pub fn contains(&self, var: &str) -> bool {
        self.0.contains_key(var)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Bound)> {
        self.0.iter()
    }

    /// Bind `var` to `value`. Returns false on a conflict with an existing
    /// binding; repeated occurrences of a variable must agree.
    pub fn bind(&mut self, var: &str, value: Bound) -> bool {
        match self.0.get(var) {
            Some(existing) => *existing == value,
            None => {
                self.0.insert(var.to_string(), value);
                true
            }
        }
    }

    /// Substitute a template term: a bound variable renders its value, any
    /// other term passes through unchanged.
    pub fn resolve_term(&self, term: &str) -> String {
        match self.0.get(term) {
            Some(bound) => bound.render(),
            None => term.to_string(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.content_id()
    }
}

impl Canonical for Binding {}

impl FromIterator<(String, Bound)> for Binding {
    fn from_iter<I: IntoIterator<Item = (String, Bound)>>(iter: I) -> Binding {
        Binding(iter.into_iter().collect())
    }
}

impl Display for Binding {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let parts = self
            .0
            .iter()
            .map(|(var, value)| format!("{var}={value}"))
            .collect::<Vec<String>>();
        write!(f, "{{{}}}", parts.join(", "))
    }
}
