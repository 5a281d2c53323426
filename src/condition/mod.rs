//! Condition module: rule preconditions and their evaluation.
//!
//! A [`Condition`] is a recursive tree of leaf patterns, conjunctions, and
//! quantifiers. Evaluating one against a fact base yields the set of binding
//! environments under which it holds.
//!
//! # Module Organization
//!
//! - [`binding`]: bound values and binding environments
//! - [`unify`]: the leaf matcher (variables, greedy wildcards)
//! - [`eval`]: the recursive evaluator producing binding sets

mod binding;
mod eval;
mod unify;


pub use binding::{Binding, Bound};
pub use eval::eval;
pub use unify::match_leaf;

use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::error::FabricError;

/// Comparison operator for counting quantifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CountOp {
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = ">")]
    Gt,
}

impl CountOp {
    pub fn eval(&self, count: u64, value: u64) -> bool {
        match self {
            CountOp::Lt => count < value,
            CountOp::Le => count <= value,
            CountOp::Eq => count == value,
            CountOp::Ge => count >= value,
            CountOp::Gt => count > value,
        }
    }
}

impl FromStr for CountOp {
    type Err = FabricError;

    fn from_str(s: &str) -> Result<CountOp, FabricError> {
        match s {
            "<" => Ok(CountOp::Lt),
            "<=" => Ok(CountOp::Le),
            "=" | "==" => Ok(CountOp::Eq),
            ">=" => Ok(CountOp::Ge),
            ">" => Ok(CountOp::Gt),
            other => Err(FabricError::Validation(format!(
                "unknown count operator '{other}'"
            ))),
        }
    }
}

impl Display for CountOp {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            CountOp::Lt => write!(f, "<"),
            CountOp::Le => write!(f, "<="),
            CountOp::Eq => write!(f, "="),
            CountOp::Ge => write!(f, ">="),
            CountOp::Gt => write!(f, ">"),
        }
    }
}

/// The precondition tree of a rule.
///
/// Disjunction is absent on purpose: the IR translator distributes every
/// `OR` into separate rules before engine objects exist, so the evaluator
/// is total over this type by construction.
///
/// `AND` children keep their authored order; quantifier nodes pass the
/// surrounding environment through and never leak inner bindings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum Condition {
    Leaf {
        verb: String,
        terms: Vec<String>,
        #[serde(default)]
        negated: bool,
    },
    And {
        children: Vec<Condition>,
    },
    Exists {
        child: Box<Condition>,
    },
    Forall {
        domain: Box<Condition>,
        property: Box<Condition>,
    },
    None {
        child: Box<Condition>,
    },
    Count {
        child: Box<Condition>,
        operator: CountOp,
        value: u64,
    },
}

impl Condition {
    pub fn leaf<S: Into<String>>(verb: S, terms: Vec<String>, negated: bool) -> Condition {
        Condition::Leaf {
            verb: verb.into(),
            terms,
            negated,
        }
    }

    pub fn and(children: Vec<Condition>) -> Condition {
        Condition::And { children }
    }

    pub fn exists(child: Condition) -> Condition {
        Condition::Exists {
            child: Box::new(child),
        }
    }

    pub fn forall(domain: Condition, property: Condition) -> Condition {
        Condition::Forall {
            domain: Box::new(domain),
            property: Box::new(property),
        }
    }

    pub fn none_of(child: Condition) -> Condition {
        Condition::None {
            child: Box::new(child),
        }
    }

    pub fn count(child: Condition, operator: CountOp, value: u64) -> Condition {
        Condition::Count {
            child: Box::new(child),
            operator,
            value,
        }
    }
}

impl crate::properties::Canonical for Condition {}

impl Display for Condition {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Condition::Leaf {
                verb,
                terms,
                negated,
            } => {
                let neg = if *negated { "NOT " } else { "" };
                write!(f, "({}{} {})", neg, verb, terms.join(" "))
            }
            Condition::And { children } => {
                let parts = children
                    .iter()
                    .map(|c| c.to_string())
                    .collect::<Vec<String>>();
                write!(f, "({})", parts.join(" & "))
            }
            Condition::Exists { child } => write!(f, "(exists {child})"),
            Condition::Forall { domain, property } => {
                write!(f, "(forall {domain}, {property})")
            }
            Condition::None { child } => write!(f, "(none {child})"),
            Condition::Count {
                child,
                operator,
                value,
            } => write!(f, "(count {child} {operator} {value})"),
        }
    }
}
