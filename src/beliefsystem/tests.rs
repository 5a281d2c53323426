//! Unit tests for the belief system façade, the inference engine, and the
//! contradiction machinery.

use serde_json::json;

use super::*;
use crate::{
    condition::Condition,
    properties::{Consequence, Effect, EffectOp, Rule, Statement},
};

fn st(text: &str) -> Statement {
    let negated = text.starts_with("NOT ");
    let text = text.strip_prefix("NOT ").unwrap_or(text);
    let mut parts = text.split_whitespace();
    let verb = parts.next().unwrap().to_string();
    let statement = Statement::new(verb, parts.map(str::to_string).collect());
    if negated {
        statement.negate()
    } else {
        statement
    }
}

fn leaf(text: &str) -> Condition {
    let mut parts = text.split_whitespace();
    let verb = parts.next().unwrap().to_string();
    Condition::leaf(verb, parts.map(str::to_string).collect(), false)
}

fn rule(condition: Condition, consequence: &str) -> Rule {
    Rule::new(condition, vec![Consequence::Statement(st(consequence))])
}

#[test_log::test]
fn add_rule_rejects_content_equal_rules() {
    let mut bs = BeliefSystem::new("test", ForkStrategy::Coexist);
    bs.add_rule(rule(leaf("is ?x man"), "is ?x mortal")).unwrap();
    let err = bs
        .add_rule(rule(leaf("is ?x man"), "is ?x mortal"))
        .unwrap_err();
    assert!(matches!(err, crate::FabricError::Validation(_)));
    assert_eq!(bs.rules().len(), 1);
}

#[test_log::test]
fn simulate_rejects_non_ground_inputs_without_mutating() {
    let mut bs = BeliefSystem::new("test", ForkStrategy::Coexist);
    let err = bs.simulate(vec![st("is ?x man")]).unwrap_err();
    assert!(matches!(err, crate::FabricError::Validation(_)));
    assert!(bs.facts().is_empty());
}

#[test_log::test]
fn chained_rules_derive_to_a_fixed_point() {
    let mut bs = BeliefSystem::new("test", ForkStrategy::Coexist);
    bs.add_rule(rule(leaf("is ?x man"), "is ?x mortal")).unwrap();
    bs.add_rule(rule(leaf("is ?x mortal"), "is ?x remembered"))
        .unwrap();
    let result = bs.simulate(vec![st("is socrates man")]).unwrap();
    assert_eq!(result.derived_facts.len(), 2);
    assert!(bs.contains_fact(&st("is socrates mortal")));
    assert!(bs.contains_fact(&st("is socrates remembered")));
}

#[test_log::test]
fn causal_memo_makes_simulation_idempotent() {
    let mut bs = BeliefSystem::new("test", ForkStrategy::Coexist);
    bs.add_rule(Rule::new(
        leaf("is ?x mortal"),
        vec![
            Consequence::Effect(Effect::new("mortal_count", EffectOp::Increment, json!(1))),
            Consequence::Statement(st("counted ?x")),
        ],
    ))
    .unwrap();

    let first = bs.simulate(vec![st("is socrates mortal")]).unwrap();
    assert_eq!(first.effects_applied.len(), 1);
    assert_eq!(bs.world_state().get("mortal_count"), Some(&json!(1)));
    assert_eq!(bs.memo_len(), 1);

    let second = bs.simulate(vec![st("is socrates mortal")]).unwrap();
    assert!(second.derived_facts.is_empty());
    assert!(second.effects_applied.is_empty());
    assert_eq!(bs.world_state().get("mortal_count"), Some(&json!(1)));
    assert_eq!(bs.memo_len(), 1);
}

#[test_log::test]
fn coexist_fork_holds_both_statements() {
    let mut bs = BeliefSystem::new("root", ForkStrategy::Coexist);
    bs.simulate(vec![st("is sky blue")]).unwrap();

    let mut result = bs.simulate(vec![st("NOT is sky blue")]).unwrap();
    assert_eq!(result.forked_beliefs.len(), 1);
    assert_eq!(result.contradictions.len(), 1);
    assert_eq!(
        result.contradictions[0].outcome,
        ContradictionOutcome::Forked
    );

    let child = result.forked_beliefs.pop().unwrap();
    assert!(child.contains_fact(&st("is sky blue")));
    assert!(child.contains_fact(&st("NOT is sky blue")));
    assert_eq!(child.parent(), Some(bs.id()));

    // parent fact base is unchanged; the fork is recorded
    assert!(bs.contains_fact(&st("is sky blue")));
    assert!(!bs.contains_fact(&st("NOT is sky blue")));
    assert_eq!(bs.forks().len(), 1);
    assert_eq!(bs.forks()[0].child_id, child.id());
}

#[test_log::test]
fn preserve_rejects_and_never_forks() {
    let mut bs = BeliefSystem::new("root", ForkStrategy::Preserve);
    bs.simulate(vec![st("is sky blue")]).unwrap();
    let facts_before = bs.facts();

    let result = bs.simulate(vec![st("NOT is sky blue")]).unwrap();
    assert!(result.forked_beliefs.is_empty());
    assert_eq!(result.contradictions.len(), 1);
    assert_eq!(
        result.contradictions[0].outcome,
        ContradictionOutcome::Rejected
    );
    assert_eq!(bs.facts(), facts_before);
    assert!(bs.forks().is_empty());
}

#[test_log::test]
fn prioritize_new_downweights_the_old_statement() {
    let mut bs = BeliefSystem::new("root", ForkStrategy::PrioritizeNew);
    bs.simulate(vec![st("is sky blue").with_priority(5)]).unwrap();

    let mut result = bs
        .simulate(vec![st("NOT is sky blue").with_priority(5)])
        .unwrap();
    let child = result.forked_beliefs.pop().unwrap();
    let favored = child.fact(&st("NOT is sky blue")).unwrap();
    let disfavored = child.fact(&st("is sky blue")).unwrap();
    assert!(favored.priority > disfavored.priority);
    assert_eq!(favored.priority, 5);
}

#[test_log::test]
fn prioritize_old_downweights_the_new_statement() {
    let mut bs = BeliefSystem::new("root", ForkStrategy::PrioritizeOld);
    bs.simulate(vec![st("is sky blue").with_priority(5)]).unwrap();

    let mut result = bs
        .simulate(vec![st("NOT is sky blue").with_priority(5)])
        .unwrap();
    let child = result.forked_beliefs.pop().unwrap();
    let favored = child.fact(&st("is sky blue")).unwrap();
    let disfavored = child.fact(&st("NOT is sky blue")).unwrap();
    assert!(favored.priority > disfavored.priority);
    assert_eq!(favored.priority, 5);
}

#[test_log::test]
fn derived_contradiction_forks_and_completes_in_the_child() {
    let mut bs = BeliefSystem::new("root", ForkStrategy::Coexist);
    // the input will derive the negation of an existing fact
    bs.simulate(vec![st("NOT is icarus careful")]).unwrap();
    bs.add_rule(Rule::new(
        leaf("is ?x prudent"),
        vec![Consequence::Statement(st("is ?x careful"))],
    ))
    .unwrap();
    bs.add_rule(Rule::new(
        leaf("is ?x careful"),
        vec![Consequence::Statement(st("survives ?x"))],
    ))
    .unwrap();

    let mut result = bs.simulate(vec![st("is icarus prudent")]).unwrap();
    assert_eq!(result.forked_beliefs.len(), 1);
    let child = result.forked_beliefs.pop().unwrap();
    // inference continued inside the child after the fork
    assert!(child.contains_fact(&st("is icarus careful")));
    assert!(child.contains_fact(&st("survives icarus")));
    // the parent did not advance past the contradiction
    assert!(!bs.contains_fact(&st("is icarus careful")));
    assert!(!bs.contains_fact(&st("survives icarus")));
}

#[test_log::test]
fn at_most_one_fork_per_simulation() {
    let mut bs = BeliefSystem::new("root", ForkStrategy::Coexist);
    bs.simulate(vec![st("is sky blue"), st("is sea calm")]).unwrap();

    let result = bs
        .simulate(vec![st("NOT is sky blue"), st("NOT is sea calm")])
        .unwrap();
    assert_eq!(result.forked_beliefs.len(), 1);
    assert_eq!(result.contradictions.len(), 2);
    assert_eq!(
        result.contradictions[1].outcome,
        ContradictionOutcome::Absorbed
    );
    let child = &result.forked_beliefs[0];
    assert!(child.contains_fact(&st("NOT is sky blue")));
    assert!(child.contains_fact(&st("NOT is sea calm")));
    assert_eq!(bs.forks().len(), 1);
}

#[test_log::test]
fn fork_inherits_memo_so_rules_do_not_refire() {
    let mut bs = BeliefSystem::new("root", ForkStrategy::Coexist);
    bs.add_rule(Rule::new(
        leaf("is ?x man"),
        vec![
            Consequence::Statement(st("is ?x mortal")),
            Consequence::Effect(Effect::new("mortal_count", EffectOp::Increment, json!(1))),
        ],
    ))
    .unwrap();
    bs.simulate(vec![st("is socrates man")]).unwrap();
    assert_eq!(bs.world_state().get("mortal_count"), Some(&json!(1)));

    let mut result = bs.simulate(vec![st("NOT is socrates mortal")]).unwrap();
    let mut child = result.forked_beliefs.pop().unwrap();
    // the inherited memo prevents the man->mortal firing from re-applying
    // its effect over the inherited facts
    let replay = child.simulate(vec![st("is socrates man")]).unwrap();
    assert!(replay.effects_applied.is_empty());
    assert_eq!(child.world_state().get("mortal_count"), Some(&json!(1)));
}

#[test_log::test]
fn manual_fork_inherits_everything() {
    let mut bs = BeliefSystem::new("root", ForkStrategy::Coexist);
    bs.add_rule(rule(leaf("is ?x man"), "is ?x mortal")).unwrap();
    bs.simulate(vec![st("is socrates man")]).unwrap();

    let child = bs.fork(Some(ForkStrategy::Preserve));
    assert_eq!(child.parent(), Some(bs.id()));
    assert_eq!(child.strategy(), ForkStrategy::Preserve);
    assert_eq!(child.facts(), bs.facts());
    assert_eq!(child.rules().len(), 1);
    assert_eq!(bs.forks().len(), 1);
    assert!(bs.forks()[0].contradiction.is_none());
}

#[test_log::test]
fn tension_detection_reports_conflicting_rules() {
    let mut bs = BeliefSystem::new("root", ForkStrategy::Coexist);
    bs.add_rule(rule(leaf("is ?x penguin"), "is ?x bird")).unwrap();
    bs.add_rule(rule(leaf("is ?x bird"), "can ?x fly")).unwrap();
    assert!(bs.tensions().is_empty());

    // penguins cannot fly: latent conflict with bird => fly through one
    // context hop
    bs.add_rule(Rule::new(
        leaf("is ?x penguin"),
        vec![Consequence::Statement(st("can ?x fly").negate())],
    ))
    .unwrap();
    assert!(!bs.tensions().is_empty());
    // tension reporting never forks
    assert!(bs.forks().is_empty());
}

#[test_log::test]
fn effects_apply_in_deterministic_order() {
    let mut bs = BeliefSystem::new("root", ForkStrategy::Coexist);
    // two rules target the same key; with a set and an increment the final
    // value depends on order, which is fixed by (rule_id, binding_id)
    let rule_a = Rule::new(
        leaf("observed ?x"),
        vec![Consequence::Effect(Effect::new(
            "counter",
            EffectOp::Increment,
            json!(2),
        ))],
    );
    let rule_b = Rule::new(
        leaf("observed ?x"),
        vec![Consequence::Effect(Effect::new(
            "counter",
            EffectOp::Set,
            json!(10),
        ))],
    );
    let id_a = rule_a.id();
    let id_b = rule_b.id();
    bs.add_rule(rule_a).unwrap();
    bs.add_rule(rule_b).unwrap();

    let result = bs.simulate(vec![st("observed comet")]).unwrap();
    assert_eq!(result.effects_applied.len(), 2);
    // increment-then-set lands on 10; set-then-increment lands on 12
    let expected = if id_a < id_b { json!(10) } else { json!(12) };
    assert_eq!(bs.world_state().get("counter"), Some(&expected));
}
