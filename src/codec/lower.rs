//! Lowering from IR to engine objects.
//!
//! Two transformations are mandatory:
//!
//! - **Disjunction elimination.** Every `OR` is pushed through surrounding
//!   `AND`s by distribution, yielding a disjunctive normal form; one engine
//!   rule is emitted per disjunct, each with a copy of the consequences.
//!   The result is observationally equivalent under the evaluator.
//! - **Canonicalization.** Engine conditions serialize in a stable form, so
//!   content-equal rules yield equal identities. `AND` children preserve
//!   authored order for readable diagnostics.

use crate::{
    codec::ir::{IrCondition, IrConsequence, IrEffect, IrInput, IrRule, IrStatement},
    condition::Condition,
    error::FabricError,
    properties::{Consequence, Effect, Rule, Statement},
};

/// The result of lowering one parser input.
#[derive(Debug, Clone, PartialEq)]
pub enum LoweredInput {
    /// One rule per disjunct of the authored condition.
    Rules(Vec<Rule>),
    /// A ground statement ready for `simulate`.
    Statement(Statement),
}

/// Translates intermediate-representation trees into engine objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct Translator;

impl Translator {
    pub fn new() -> Translator {
        Translator
    }

    /// Lower a parser envelope. `question` inputs belong to the interactive
    /// front-end and are rejected here.
    pub fn lower_input(&self, input: IrInput) -> Result<LoweredInput, FabricError> {
        match input {
            IrInput::Rule(rule) => Ok(LoweredInput::Rules(self.lower_rule(rule)?)),
            IrInput::Statement(statement) => {
                let statement = self.lower_statement(statement)?;
                if !statement.is_ground() {
                    return Err(FabricError::Validation(format!(
                        "input statement {statement} is not ground"
                    )));
                }
                Ok(LoweredInput::Statement(statement))
            }
            IrInput::Question(_) => Err(FabricError::Validation(
                "question inputs require the interactive front-end".to_string(),
            )),
        }
    }

    /// Lower a statement: `subject` then the (array-flattened) `object`
    /// form the term sequence.
    pub fn lower_statement(&self, ir: IrStatement) -> Result<Statement, FabricError> {
        let mut terms = vec![ir.subject];
        terms.extend(ir.object.into_terms());
        let mut statement = Statement::new(ir.verb, terms);
        if ir.negated {
            statement = statement.negate();
        }
        Ok(statement)
    }

    pub fn lower_effect(&self, ir: IrEffect) -> Result<Effect, FabricError> {
        let operation = ir.effect_operation.parse()?;
        Ok(Effect::new(
            ir.target_world_state_key,
            operation,
            ir.effect_value,
        ))
    }

    /// Lower a rule, emitting one engine rule per disjunct of its condition.
    pub fn lower_rule(&self, ir: IrRule) -> Result<Vec<Rule>, FabricError> {
        let consequence = match (ir.rule_type.as_str(), ir.consequence) {
            ("standard", IrConsequence::Statement(s)) => {
                Consequence::Statement(self.lower_statement(s)?)
            }
            ("effect", IrConsequence::Effect(e)) => Consequence::Effect(self.lower_effect(e)?),
            ("standard", IrConsequence::Effect(_)) => {
                return Err(FabricError::Validation(
                    "standard rule carries an effect consequence".to_string(),
                ))
            }
            ("effect", IrConsequence::Statement(_)) => {
                return Err(FabricError::Validation(
                    "effect rule carries a statement consequence".to_string(),
                ))
            }
            (other, _) => {
                return Err(FabricError::Validation(format!(
                    "unknown rule type '{other}'"
                )))
            }
        };

        let disjuncts = self.lower_condition(ir.condition)?;
        Ok(disjuncts
            .into_iter()
            .map(|condition| Rule::new(condition, vec![consequence.clone()]))
            .collect())
    }

    /// Lower a condition tree into its disjuncts. Each returned condition
    /// is free of `OR` nodes; together they are equivalent to the input.
    pub fn lower_condition(&self, ir: IrCondition) -> Result<Vec<Condition>, FabricError> {
        match ir.kind.as_str() {
            "LEAF" => {
                let (Some(subject), Some(verb), Some(object)) = (ir.subject, ir.verb, ir.object)
                else {
                    return Err(FabricError::Validation(
                        "LEAF condition requires subject, verb, and object".to_string(),
                    ));
                };
                let mut terms = vec![subject];
                terms.extend(object.into_terms());
                Ok(vec![Condition::leaf(verb, terms, ir.negated)])
            }
            "AND" => {
                if ir.children.is_empty() {
                    return Err(FabricError::Validation(
                        "AND condition requires children".to_string(),
                    ));
                }
                // distribute: the cartesian product of child disjuncts
                let mut combos: Vec<Vec<Condition>> = vec![Vec::new()];
                for child in ir.children {
                    let child_disjuncts = self.lower_condition(child)?;
                    let mut next = Vec::with_capacity(combos.len() * child_disjuncts.len());
                    for combo in &combos {
                        for disjunct in &child_disjuncts {
                            let mut extended = combo.clone();
                            match disjunct {
                                // flatten nested conjunctions, preserving order
                                Condition::And { children } => {
                                    extended.extend(children.iter().cloned())
                                }
                                other => extended.push(other.clone()),
                            }
                            next.push(extended);
                        }
                    }
                    combos = next;
                }
                Ok(combos
                    .into_iter()
                    .map(|children| match <[Condition; 1]>::try_from(children) {
                        Ok([single]) => single,
                        Err(children) => Condition::and(children),
                    })
                    .collect())
            }
            "OR" => {
                if ir.children.is_empty() {
                    return Err(FabricError::Validation(
                        "OR condition requires children".to_string(),
                    ));
                }
                let mut disjuncts = Vec::new();
                for child in ir.children {
                    disjuncts.extend(self.lower_condition(child)?);
                }
                Ok(disjuncts)
            }
            "EXISTS" => {
                let child = self.single_child(ir.children, "EXISTS")?;
                // EXISTS(A | B) == EXISTS(A) | EXISTS(B)
                Ok(self
                    .lower_condition(child)?
                    .into_iter()
                    .map(Condition::exists)
                    .collect())
            }
            "NONE" => {
                let child = self.single_child(ir.children, "NONE")?;
                // NONE(A | B) == NONE(A) & NONE(B)
                let negated: Vec<Condition> = self
                    .lower_condition(child)?
                    .into_iter()
                    .map(Condition::none_of)
                    .collect();
                Ok(vec![match <[Condition; 1]>::try_from(negated) {
                    Ok([single]) => single,
                    Err(negated) => Condition::and(negated),
                }])
            }
            "FORALL" => {
                let mut children = ir.children.into_iter();
                let (Some(domain), Some(property), None) =
                    (children.next(), children.next(), children.next())
                else {
                    return Err(FabricError::Validation(
                        "FORALL condition requires exactly two children (domain, property)"
                            .to_string(),
                    ));
                };
                let properties = self.lower_condition(property)?;
                if properties.len() != 1 {
                    // property-side disjunction does not distribute
                    return Err(FabricError::Validation(
                        "OR inside a FORALL property cannot be eliminated".to_string(),
                    ));
                }
                let property = properties.into_iter().next().expect("length checked");
                // FORALL(A | B, P) == FORALL(A, P) & FORALL(B, P)
                let quantified: Vec<Condition> = self
                    .lower_condition(domain)?
                    .into_iter()
                    .map(|domain| Condition::forall(domain, property.clone()))
                    .collect();
                Ok(vec![match <[Condition; 1]>::try_from(quantified) {
                    Ok([single]) => single,
                    Err(quantified) => Condition::and(quantified),
                }])
            }
            "COUNT" => {
                let child = self.single_child(ir.children, "COUNT")?;
                let operator = ir
                    .operator
                    .ok_or_else(|| {
                        FabricError::Validation("COUNT condition requires an operator".to_string())
                    })?
                    .parse()?;
                let value = ir.value.ok_or_else(|| {
                    FabricError::Validation("COUNT condition requires a value".to_string())
                })?;
                let children = self.lower_condition(child)?;
                if children.len() != 1 {
                    // counts over a disjunction do not distribute
                    return Err(FabricError::Validation(
                        "OR inside a COUNT condition cannot be eliminated".to_string(),
                    ));
                }
                let child = children.into_iter().next().expect("length checked");
                Ok(vec![Condition::count(child, operator, value)])
            }
            other => Err(FabricError::Validation(format!(
                "unknown condition type '{other}'"
            ))),
        }
    }

    fn single_child(
        &self,
        children: Vec<IrCondition>,
        kind: &str,
    ) -> Result<IrCondition, FabricError> {
        let mut children = children.into_iter();
        match (children.next(), children.next()) {
            (Some(child), None) => Ok(child),
            _ => Err(FabricError::Validation(format!(
                "{kind} condition requires exactly one child"
            ))),
        }
    }
}
