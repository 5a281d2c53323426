//! Serde mirror of the external parser's intermediate representation.
//!
//! The contract: a top-level `{"input_type": "rule"|"statement"|"question",
//! "data": ...}` envelope; conditions are tagged trees with `children` for
//! composite nodes and `(subject, verb, object, negated)` for leaves.
//! Condition and consequence kinds are kept as plain strings here so that
//! unrecognized values surface as validation errors during lowering rather
//! than opaque deserialization failures.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FabricError;

/// The top-level envelope handed over by the parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "input_type", content = "data", rename_all = "lowercase")]
pub enum IrInput {
    Rule(IrRule),
    Statement(IrStatement),
    Question(IrStatement),
}

impl IrInput {
    /// Parse the envelope from JSON. Malformed IR is a validation error;
    /// nothing has been mutated at this point.
    pub fn from_json(json: &str) -> Result<IrInput, FabricError> {
        serde_json::from_str(json)
            .map_err(|e| FabricError::Validation(format!("malformed IR: {e}")))
    }
}

/// An object slot: a single term or an array that flattens into the term
/// sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IrObject {
    One(String),
    Many(Vec<String>),
}

impl IrObject {
    pub fn into_terms(self) -> Vec<String> {
        match self {
            IrObject::One(term) => vec![term],
            IrObject::Many(terms) => terms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrStatement {
    pub subject: String,
    pub verb: String,
    pub object: IrObject,
    #[serde(default)]
    pub negated: bool,
    #[serde(default)]
    pub modifiers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrEffect {
    pub target_world_state_key: String,
    pub effect_operation: String,
    pub effect_value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum IrConsequence {
    Statement(IrStatement),
    Effect(IrEffect),
}

/// A condition node. `kind` is one of `LEAF`, `AND`, `OR`, `EXISTS`,
/// `FORALL`, `NONE`, `COUNT`; leaves carry `(subject, verb, object,
/// negated)`, composites carry `children`, `COUNT` adds `operator` and
/// `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrCondition {
    #[serde(rename = "type", default = "leaf_kind")]
    pub kind: String,
    #[serde(default)]
    pub children: Vec<IrCondition>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub verb: Option<String>,
    #[serde(default)]
    pub object: Option<IrObject>,
    #[serde(default)]
    pub negated: bool,
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default)]
    pub value: Option<u64>,
}

fn leaf_kind() -> String {
    "LEAF".to_string()
}

impl IrCondition {
    pub fn leaf(subject: &str, verb: &str, object: IrObject) -> IrCondition {
        IrCondition {
            kind: leaf_kind(),
            children: Vec::new(),
            subject: Some(subject.to_string()),
            verb: Some(verb.to_string()),
            object: Some(object),
            negated: false,
            operator: None,
            value: None,
        }
    }

    pub fn composite(kind: &str, children: Vec<IrCondition>) -> IrCondition {
        IrCondition {
            kind: kind.to_string(),
            children,
            subject: None,
            verb: None,
            object: None,
            negated: false,
            operator: None,
            value: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrRule {
    /// `"standard"` (statement consequence) or `"effect"`.
    pub rule_type: String,
    pub condition: IrCondition,
    pub consequence: IrConsequence,
}
