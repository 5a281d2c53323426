//! End-to-end simulation scenarios: syllogisms, chained inference with dual
//! consequences, wildcards, conjunctions, quantifiers, and the four forking
//! strategies.

mod common;

use common::{derive, leaf, st};
use serde_json::json;

use logic_fabricator::{
    beliefsystem::{BeliefSystem, ContradictionOutcome, ForkStrategy},
    condition::{Bound, Condition},
    properties::{Consequence, Effect, EffectOp, Rule},
};

#[test]
fn classical_syllogism() {
    common::init_logging();
    let mut beliefs = BeliefSystem::new("athens", ForkStrategy::Coexist);
    beliefs
        .add_rule(Rule::new(leaf("is ?x man"), vec![derive("is ?x mortal")]))
        .unwrap();

    let result = beliefs.simulate(vec![st("is socrates man")]).unwrap();

    assert_eq!(result.derived_facts, vec![st("is socrates mortal")]);
    assert!(result.effects_applied.is_empty());
    assert_eq!(result.applied_rules.len(), 1);
    assert!(beliefs.contains_fact(&st("is socrates mortal")));
}

#[test]
fn chained_inference_with_dual_consequence() {
    common::init_logging();
    let mut beliefs = BeliefSystem::new("athens", ForkStrategy::Coexist);
    beliefs
        .add_rule(Rule::new(leaf("is ?x man"), vec![derive("is ?x mortal")]))
        .unwrap();
    beliefs
        .add_rule(Rule::new(
            leaf("is ?x mortal"),
            vec![
                Consequence::Effect(Effect::new("mortal_count", EffectOp::Increment, json!(1))),
                derive("counted ?x"),
            ],
        ))
        .unwrap();

    let result = beliefs.simulate(vec![st("is socrates man")]).unwrap();
    assert!(result.derived_facts.contains(&st("is socrates mortal")));
    assert!(result.derived_facts.contains(&st("counted socrates")));
    assert_eq!(result.derived_facts.len(), 2);
    assert_eq!(
        result.world_state_changes().get("mortal_count"),
        Some(&(None, Some(json!(1))))
    );

    // idempotence: the same input again derives nothing and moves nothing
    let again = beliefs.simulate(vec![st("is socrates man")]).unwrap();
    assert!(again.derived_facts.is_empty());
    assert!(again.effects_applied.is_empty());
    assert_eq!(beliefs.world_state().get("mortal_count"), Some(&json!(1)));
}

#[test]
fn wildcard_transcription() {
    common::init_logging();
    let mut beliefs = BeliefSystem::new("scribe", ForkStrategy::Coexist);
    beliefs
        .add_rule(Rule::new(leaf("says ?s *w"), vec![derive("transcript_of ?w")]))
        .unwrap();

    let result = beliefs
        .simulate(vec![st("says ravi hello world how are you")])
        .unwrap();

    assert_eq!(result.derived_facts.len(), 1);
    let transcript = &result.derived_facts[0];
    assert_eq!(transcript.verb, "transcript_of");
    // the captured word list renders as a JSON array term
    assert_eq!(
        transcript.terms,
        vec![r#"["hello","world","how","are","you"]"#.to_string()]
    );
    // the binding surfaced in applied_rules carries the raw list
    assert_eq!(
        result.applied_rules[0].binding.get("?w"),
        Some(&Bound::Seq(vec![
            "hello".into(),
            "world".into(),
            "how".into(),
            "are".into(),
            "you".into()
        ]))
    );
}

#[test]
fn conjunction_waits_for_all_legs() {
    common::init_logging();
    let mut beliefs = BeliefSystem::new("camelot", ForkStrategy::Coexist);
    beliefs
        .add_rule(Rule::new(
            Condition::and(vec![leaf("is ?x king"), leaf("is ?x wise")]),
            vec![derive("is ?x good_ruler")],
        ))
        .unwrap();

    let first = beliefs.simulate(vec![st("is arthur king")]).unwrap();
    assert!(first.derived_facts.is_empty());

    let second = beliefs.simulate(vec![st("is arthur wise")]).unwrap();
    assert_eq!(second.derived_facts, vec![st("is arthur good_ruler")]);
}

#[test]
fn contradiction_forks_under_coexist() {
    common::init_logging();
    let mut beliefs = BeliefSystem::new("root", ForkStrategy::Coexist);
    beliefs.simulate(vec![st("is sky blue")]).unwrap();

    let mut result = beliefs.simulate(vec![st("NOT is sky blue")]).unwrap();

    assert_eq!(result.forked_beliefs.len(), 1);
    let child = result.forked_beliefs.pop().unwrap();
    assert!(child.contains_fact(&st("is sky blue")));
    assert!(child.contains_fact(&st("NOT is sky blue")));

    // the parent is unchanged beyond recording the fork
    assert_eq!(beliefs.facts(), vec![st("is sky blue")]);
    assert_eq!(beliefs.forks().len(), 1);
    assert_eq!(beliefs.forks()[0].child_id, child.id());
}

#[test]
fn preserve_rejects_the_contradiction() {
    common::init_logging();
    let mut beliefs = BeliefSystem::new("root", ForkStrategy::Preserve);
    beliefs.simulate(vec![st("is sky blue")]).unwrap();

    let result = beliefs.simulate(vec![st("NOT is sky blue")]).unwrap();

    assert!(result.forked_beliefs.is_empty());
    assert_eq!(beliefs.facts(), vec![st("is sky blue")]);
    assert_eq!(result.contradictions.len(), 1);
    assert_eq!(result.contradictions[0].statement_new, st("NOT is sky blue"));
    assert_eq!(
        result.contradictions[0].outcome,
        ContradictionOutcome::Rejected
    );
    assert!(beliefs.forks().is_empty());
}

#[test]
fn preserve_never_grows_on_repeated_contradictions() {
    common::init_logging();
    let mut beliefs = BeliefSystem::new("root", ForkStrategy::Preserve);
    beliefs.simulate(vec![st("is sky blue")]).unwrap();
    let baseline = beliefs.facts().len();

    for _ in 0..3 {
        let result = beliefs.simulate(vec![st("NOT is sky blue")]).unwrap();
        assert!(result.forked_beliefs.is_empty());
        assert_eq!(beliefs.facts().len(), baseline);
        assert!(beliefs.forks().is_empty());
    }
}

#[test]
fn forall_is_vacuously_true_over_an_empty_domain() {
    common::init_logging();
    let mut beliefs = BeliefSystem::new("camelot", ForkStrategy::Coexist);
    beliefs
        .add_rule(Rule::new(
            Condition::and(vec![
                leaf("is ?x king"),
                Condition::forall(leaf("is_subject_of ?y ?x"), leaf("is ?y loyal")),
            ]),
            vec![derive("is ?x happy_king")],
        ))
        .unwrap();

    let result = beliefs.simulate(vec![st("is arthur king")]).unwrap();
    assert_eq!(result.derived_facts, vec![st("is arthur happy_king")]);
}

#[test]
fn forall_fails_once_a_disloyal_subject_appears() {
    common::init_logging();
    let mut beliefs = BeliefSystem::new("camelot", ForkStrategy::Coexist);
    beliefs
        .add_rule(Rule::new(
            Condition::and(vec![
                leaf("is ?x king"),
                Condition::forall(leaf("is_subject_of ?y ?x"), leaf("is ?y loyal")),
            ]),
            vec![derive("is ?x happy_king")],
        ))
        .unwrap();

    let result = beliefs
        .simulate(vec![st("is_subject_of mordred arthur"), st("is arthur king")])
        .unwrap();
    assert!(result.derived_facts.is_empty());

    // loyalty arrives later; the fixed point picks the rule up again
    let result = beliefs.simulate(vec![st("is mordred loyal")]).unwrap();
    assert_eq!(result.derived_facts, vec![st("is arthur happy_king")]);
}

#[test]
fn multi_variable_rules_fire_once_per_distinct_binding() {
    common::init_logging();
    let mut beliefs = BeliefSystem::new("court", ForkStrategy::Coexist);
    beliefs
        .add_rule(Rule::new(
            Condition::and(vec![leaf("trusts ?a ?b"), leaf("trusts ?b ?c")]),
            vec![derive("should_trust ?a ?c")],
        ))
        .unwrap();

    let result = beliefs
        .simulate(vec![
            st("trusts alice bob"),
            st("trusts bob carol"),
            st("trusts bob dave"),
        ])
        .unwrap();

    assert!(result.derived_facts.contains(&st("should_trust alice carol")));
    assert!(result.derived_facts.contains(&st("should_trust alice dave")));
    // one firing per distinct environment
    assert_eq!(result.applied_rules.len(), 2);
}

#[test]
fn count_quantifier_triggers_at_the_threshold() {
    common::init_logging();
    let mut beliefs = BeliefSystem::new("senate", ForkStrategy::Coexist);
    beliefs
        .add_rule(Rule::new(
            Condition::and(vec![
                leaf("is ?x motion"),
                Condition::count(
                    leaf("supports ?y ?x"),
                    logic_fabricator::condition::CountOp::Ge,
                    2,
                ),
            ]),
            vec![derive("passes ?x")],
        ))
        .unwrap();

    let result = beliefs
        .simulate(vec![st("is reform motion"), st("supports brutus reform")])
        .unwrap();
    assert!(result.derived_facts.is_empty());

    let result = beliefs.simulate(vec![st("supports cassius reform")]).unwrap();
    assert_eq!(result.derived_facts, vec![st("passes reform")]);
}

#[test]
fn negative_quantifier_with_explicit_negation() {
    common::init_logging();
    let mut beliefs = BeliefSystem::new("harbor", ForkStrategy::Coexist);
    beliefs
        .add_rule(Rule::new(
            Condition::and(vec![
                leaf("is ?x ship"),
                Condition::none_of(leaf("damaged ?x")),
            ]),
            vec![derive("may_sail ?x")],
        ))
        .unwrap();

    let result = beliefs
        .simulate(vec![st("is argo ship"), st("damaged argo"), st("is orca ship")])
        .unwrap();
    assert_eq!(result.derived_facts, vec![st("may_sail orca")]);
}

#[test]
fn world_state_snapshots_bracket_the_simulation() {
    common::init_logging();
    let mut beliefs = BeliefSystem::new("clock", ForkStrategy::Coexist);
    beliefs
        .add_rule(Rule::new(
            leaf("tick ?t"),
            vec![Consequence::Effect(Effect::new(
                "ticks",
                EffectOp::Increment,
                json!(1),
            ))],
        ))
        .unwrap();

    beliefs.simulate(vec![st("tick one")]).unwrap();
    let result = beliefs.simulate(vec![st("tick two")]).unwrap();

    assert_eq!(result.world_state_before.get("ticks"), Some(&json!(1)));
    assert_eq!(result.world_state_after.get("ticks"), Some(&json!(2)));
}
