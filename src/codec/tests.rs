//! Unit tests for IR parsing and lowering.

use serde_json::json;

use super::*;
use crate::{condition::Condition, error::FabricError, properties::Consequence};

fn translator() -> Translator {
    Translator::new()
}

fn lower_json(json: &str) -> Result<LoweredInput, FabricError> {
    translator().lower_input(IrInput::from_json(json)?)
}

#[test]
fn statement_object_array_flattens_into_terms() {
    let lowered = lower_json(
        r#"{
            "input_type": "statement",
            "data": {"subject": "ravi", "verb": "says", "object": ["hello", "world"]}
        }"#,
    )
    .unwrap();
    let LoweredInput::Statement(statement) = lowered else {
        panic!("expected a statement");
    };
    assert_eq!(statement.verb, "says");
    assert_eq!(statement.terms, vec!["ravi", "hello", "world"]);
    assert!(!statement.negated);
}

#[test]
fn negated_statement_round_trips() {
    let lowered = lower_json(
        r#"{
            "input_type": "statement",
            "data": {"subject": "sky", "verb": "is", "object": "green", "negated": true}
        }"#,
    )
    .unwrap();
    let LoweredInput::Statement(statement) = lowered else {
        panic!("expected a statement");
    };
    assert!(statement.negated);
}

#[test]
fn non_ground_statement_input_is_rejected() {
    let err = lower_json(
        r#"{
            "input_type": "statement",
            "data": {"subject": "?x", "verb": "is", "object": "man"}
        }"#,
    )
    .unwrap_err();
    assert!(matches!(err, FabricError::Validation(_)));
}

#[test]
fn question_inputs_are_rejected() {
    let err = lower_json(
        r#"{
            "input_type": "question",
            "data": {"subject": "socrates", "verb": "is", "object": "mortal"}
        }"#,
    )
    .unwrap_err();
    assert!(matches!(err, FabricError::Validation(_)));
}

#[test]
fn malformed_ir_is_a_validation_error() {
    let err = lower_json(r#"{"input_type": "poem", "data": {}}"#).unwrap_err();
    assert!(matches!(err, FabricError::Validation(_)));
}

#[test]
fn standard_rule_lowers_to_one_engine_rule() {
    let lowered = lower_json(
        r#"{
            "input_type": "rule",
            "data": {
                "rule_type": "standard",
                "condition": {"type": "LEAF", "subject": "?x", "verb": "is", "object": "man"},
                "consequence": {"type": "statement", "subject": "?x", "verb": "is", "object": "mortal"}
            }
        }"#,
    )
    .unwrap();
    let LoweredInput::Rules(rules) = lowered else {
        panic!("expected rules");
    };
    assert_eq!(rules.len(), 1);
    assert_eq!(
        rules[0].condition,
        Condition::leaf("is", vec!["?x".into(), "man".into()], false)
    );
    assert!(matches!(
        rules[0].consequences[0],
        Consequence::Statement(_)
    ));
}

#[test]
fn effect_rule_lowers_operation_and_value() {
    let lowered = lower_json(
        r#"{
            "input_type": "rule",
            "data": {
                "rule_type": "effect",
                "condition": {"type": "LEAF", "subject": "?x", "verb": "is", "object": "mortal"},
                "consequence": {
                    "type": "effect",
                    "target_world_state_key": "mortal_count",
                    "effect_operation": "increment",
                    "effect_value": 1
                }
            }
        }"#,
    )
    .unwrap();
    let LoweredInput::Rules(rules) = lowered else {
        panic!("expected rules");
    };
    let Consequence::Effect(effect) = &rules[0].consequences[0] else {
        panic!("expected an effect consequence");
    };
    assert_eq!(effect.target_key, "mortal_count");
    assert_eq!(effect.value, json!(1));
}

#[test]
fn unknown_effect_operation_is_rejected() {
    let err = lower_json(
        r#"{
            "input_type": "rule",
            "data": {
                "rule_type": "effect",
                "condition": {"type": "LEAF", "subject": "?x", "verb": "is", "object": "mortal"},
                "consequence": {
                    "type": "effect",
                    "target_world_state_key": "mortal_count",
                    "effect_operation": "obliterate",
                    "effect_value": 1
                }
            }
        }"#,
    )
    .unwrap_err();
    assert!(matches!(err, FabricError::Validation(_)));
}

#[test]
fn unknown_condition_type_is_rejected() {
    let err = translator().lower_condition(IrCondition::composite("XOR", vec![])).unwrap_err();
    assert!(matches!(err, FabricError::Validation(_)));
}

#[test]
fn or_distributes_through_and() {
    // (king(?x) | queen(?x)) & wise(?x) => two disjuncts
    let ir = IrCondition::composite(
        "AND",
        vec![
            IrCondition::composite(
                "OR",
                vec![
                    IrCondition::leaf("?x", "is", IrObject::One("king".into())),
                    IrCondition::leaf("?x", "is", IrObject::One("queen".into())),
                ],
            ),
            IrCondition::leaf("?x", "is", IrObject::One("wise".into())),
        ],
    );
    let disjuncts = translator().lower_condition(ir).unwrap();
    assert_eq!(disjuncts.len(), 2);
    let expected_first = Condition::and(vec![
        Condition::leaf("is", vec!["?x".into(), "king".into()], false),
        Condition::leaf("is", vec!["?x".into(), "wise".into()], false),
    ]);
    let expected_second = Condition::and(vec![
        Condition::leaf("is", vec!["?x".into(), "queen".into()], false),
        Condition::leaf("is", vec!["?x".into(), "wise".into()], false),
    ]);
    assert_eq!(disjuncts[0], expected_first);
    assert_eq!(disjuncts[1], expected_second);
}

#[test]
fn nested_or_multiplies_disjuncts() {
    // (a | b) & (c | d) => 4 disjuncts, authored order preserved
    let ir = IrCondition::composite(
        "AND",
        vec![
            IrCondition::composite(
                "OR",
                vec![
                    IrCondition::leaf("?x", "is", IrObject::One("a".into())),
                    IrCondition::leaf("?x", "is", IrObject::One("b".into())),
                ],
            ),
            IrCondition::composite(
                "OR",
                vec![
                    IrCondition::leaf("?x", "is", IrObject::One("c".into())),
                    IrCondition::leaf("?x", "is", IrObject::One("d".into())),
                ],
            ),
        ],
    );
    let disjuncts = translator().lower_condition(ir).unwrap();
    assert_eq!(disjuncts.len(), 4);
}

#[test]
fn or_under_exists_splits_the_quantifier() {
    let ir = IrCondition::composite(
        "EXISTS",
        vec![IrCondition::composite(
            "OR",
            vec![
                IrCondition::leaf("?x", "is", IrObject::One("king".into())),
                IrCondition::leaf("?x", "is", IrObject::One("queen".into())),
            ],
        )],
    );
    let disjuncts = translator().lower_condition(ir).unwrap();
    assert_eq!(disjuncts.len(), 2);
    assert!(disjuncts
        .iter()
        .all(|d| matches!(d, Condition::Exists { .. })));
}

#[test]
fn or_under_none_becomes_a_conjunction() {
    let ir = IrCondition::composite(
        "NONE",
        vec![IrCondition::composite(
            "OR",
            vec![
                IrCondition::leaf("?x", "is", IrObject::One("king".into())),
                IrCondition::leaf("?x", "is", IrObject::One("queen".into())),
            ],
        )],
    );
    let disjuncts = translator().lower_condition(ir).unwrap();
    assert_eq!(disjuncts.len(), 1);
    let Condition::And { children } = &disjuncts[0] else {
        panic!("expected a conjunction of NONE nodes");
    };
    assert_eq!(children.len(), 2);
    assert!(children.iter().all(|c| matches!(c, Condition::None { .. })));
}

#[test]
fn or_in_forall_domain_splits_or_in_property_is_rejected() {
    let or_node = IrCondition::composite(
        "OR",
        vec![
            IrCondition::leaf("?y", "serves", IrObject::One("?x".into())),
            IrCondition::leaf("?y", "guards", IrObject::One("?x".into())),
        ],
    );
    let loyal = IrCondition::leaf("?y", "is", IrObject::One("loyal".into()));

    let in_domain =
        IrCondition::composite("FORALL", vec![or_node.clone(), loyal.clone()]);
    let disjuncts = translator().lower_condition(in_domain).unwrap();
    assert_eq!(disjuncts.len(), 1);
    assert!(matches!(disjuncts[0], Condition::And { .. }));

    let in_property = IrCondition::composite("FORALL", vec![loyal, or_node]);
    let err = translator().lower_condition(in_property).unwrap_err();
    assert!(matches!(err, FabricError::Validation(_)));
}

#[test]
fn count_carries_operator_and_value() {
    let mut ir = IrCondition::composite(
        "COUNT",
        vec![IrCondition::leaf(
            "?y",
            "is_subject_of",
            IrObject::One("?x".into()),
        )],
    );
    ir.operator = Some(">=".to_string());
    ir.value = Some(3);
    let disjuncts = translator().lower_condition(ir).unwrap();
    assert_eq!(disjuncts.len(), 1);
    let Condition::Count {
        operator, value, ..
    } = &disjuncts[0]
    else {
        panic!("expected a COUNT condition");
    };
    assert_eq!(*value, 3);
    assert_eq!(*operator, crate::condition::CountOp::Ge);
}
