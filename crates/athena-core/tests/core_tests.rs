//! Tests for athena-core: syntax, classification, filtering, the in-memory mind, errors

use athena_core::*;

// ===========================================================================
// SessionKey
// ===========================================================================

#[test]
fn session_key_new_and_display() {
    let key = SessionKey::new("bob");
    assert_eq!(key.as_str(), "bob");
    assert_eq!(format!("{}", key), "bob");
}

#[test]
fn session_key_router_namespace_is_distinct() {
    let key = SessionKey::new("bob");
    let router = key.router();
    assert_eq!(router.as_str(), "bob_router");
    assert_ne!(key, router);
}

#[test]
fn session_key_equality_and_hash() {
    use std::collections::HashSet;
    let a: SessionKey = "same".into();
    let b: SessionKey = String::from("same").into();
    let mut set = HashSet::new();
    set.insert(a.clone());
    assert!(set.contains(&b));
    assert!(!set.contains(&SessionKey::new("other")));
}

// ===========================================================================
// Small types
// ===========================================================================

#[test]
fn context_kind_aliases_are_case_insensitive() {
    assert_eq!(ContextKind::parse("Persona"), Some(ContextKind::Persona));
    assert_eq!(ContextKind::parse("MAS"), Some(ContextKind::Mas));
    assert_eq!(ContextKind::parse("plans"), Some(ContextKind::Mas));
    assert_eq!(ContextKind::parse("video"), Some(ContextKind::Image));
    assert_eq!(ContextKind::parse("audio"), None);
}

#[test]
fn coordinator_state_serializes_lowercase() {
    let json = serde_json::to_string(&CoordinatorState::Busy).unwrap();
    assert_eq!(json, "\"busy\"");
}

#[test]
fn preview_truncates_long_text() {
    assert_eq!(preview("short"), "short");
    let long = "a".repeat(40);
    assert_eq!(preview(&long), format!("{}...", "a".repeat(30)));
}

#[test]
fn preview_respects_char_boundaries() {
    let text = "é".repeat(31);
    assert_eq!(preview(&text), format!("{}...", "é".repeat(30)));
}

// ===========================================================================
// Literal
// ===========================================================================

#[test]
fn literal_parses_functor_terms_and_annotations() {
    let lit = Literal::parse("at(home, 3)[source(percept)]").unwrap();
    assert!(!lit.is_negated());
    assert_eq!(lit.functor(), "at");
    assert_eq!(lit.terms(), ["home", "3"]);
    assert_eq!(lit.annotations(), ["source(percept)"]);
    assert_eq!(lit.to_string(), "at(home,3)[source(percept)]");
}

#[test]
fn literal_accepts_strings_numbers_lists_and_variables() {
    let lit = Literal::parse(r#"data(1.5, -2, [a, b | T], "x, y", X, _, inner(z))"#).unwrap();
    assert_eq!(lit.arity(), 7);
    assert_eq!(lit.terms()[3], r#""x, y""#);
}

#[test]
fn literal_negation_and_trailing_period() {
    let lit: Literal = "~raining.".parse().unwrap();
    assert!(lit.is_negated());
    assert_eq!(lit.to_string(), "~raining");
}

#[test]
fn literal_rejects_bad_shapes() {
    for bad in [
        "Foo",
        "foo()",
        "foo(bar",
        "foo(\"x)",
        "foo bar",
        "some fact",
        "foo(bar))",
        "",
        "foo(a b)",
    ] {
        let err = Literal::parse(bad).unwrap_err();
        assert!(
            matches!(err, Error::MalformedDirective { .. }),
            "expected malformed for {:?}, got {:?}",
            bad,
            err
        );
    }
}

#[test]
fn literal_annotation_editing() {
    let mut lit = Literal::new("patrol");
    lit.annotate_provenance();
    lit.annotate_provenance();
    assert_eq!(
        lit.annotations(),
        [SOURCE_ANNOTATION, RATIONALE_ANNOTATION],
        "provenance is not duplicated"
    );
    assert!(lit.remove_annotation(SOURCE_ANNOTATION));
    assert!(!lit.remove_annotation(SOURCE_ANNOTATION));
    assert!(lit.has_annotation(RATIONALE_ANNOTATION));
}

#[test]
fn literal_matching_with_variables_and_annotations() {
    let belief = Literal::parse("at(home)[source(athena)]").unwrap();
    assert!(Literal::parse("at(X)").unwrap().matches(&belief));
    assert!(Literal::parse("at(home)").unwrap().matches(&belief));
    assert!(Literal::parse("at(_)[source(athena)]").unwrap().matches(&belief));
    assert!(!Literal::parse("at(work)").unwrap().matches(&belief));
    assert!(!Literal::parse("at(home)[source(percept)]")
        .unwrap()
        .matches(&belief));
    assert!(!Literal::parse("~at(home)").unwrap().matches(&belief));
    assert!(!Literal::parse("at").unwrap().matches(&belief));
}

// ===========================================================================
// Trigger
// ===========================================================================

#[test]
fn trigger_operators_and_kinds() {
    let t = Trigger::parse("+!patrol").unwrap();
    assert_eq!((t.operator, t.kind), (Operator::Add, EventKind::Goal));

    let t = Trigger::parse("-at(home)").unwrap();
    assert_eq!((t.operator, t.kind), (Operator::Remove, EventKind::Belief));
    assert_eq!(t.literal.functor(), "at");

    let t = Trigger::parse("-!patrol.").unwrap();
    assert_eq!((t.operator, t.kind), (Operator::Remove, EventKind::Goal));
}

#[test]
fn trigger_rejects_missing_operator_and_negated_goal() {
    assert!(Trigger::parse("patrol").is_err());
    assert!(Trigger::parse("!patrol").is_err());
    assert!(Trigger::parse("+!~patrol").is_err());
    assert!(Trigger::parse("+ patrol").is_err());
}

#[test]
fn goal_marker_normalization() {
    assert_eq!(normalize_goal_marker("!patrol"), "+!patrol");
    assert_eq!(normalize_goal_marker("  +!patrol "), "+!patrol");
    assert_eq!(normalize_goal_marker("-busy"), "-busy");
}

#[test]
fn goal_command_normalizes_post_plans() {
    assert_eq!(goal_command("patrol"), "+!patrol");
    assert_eq!(goal_command("!patrol"), "+!patrol");
    assert_eq!(goal_command("+!patrol"), "+!patrol");
}

// ===========================================================================
// PlanRule
// ===========================================================================

#[test]
fn plan_rule_full_shape() {
    let plan = PlanRule::parse(
        r#"@greet +!greet(X) : friend(X) & awake <- .print("hi; there"); !wave(X)."#,
    )
    .unwrap();
    assert_eq!(plan.label_name(), Some("greet"));
    assert_eq!(plan.trigger.to_string(), "+!greet(X)");
    assert_eq!(plan.context.as_deref(), Some("friend(X) & awake"));
    assert_eq!(plan.body, [r#".print("hi; there")"#, "!wave(X)"]);
}

#[test]
fn plan_rule_bare_goal_trigger_is_normalized() {
    let plan = PlanRule::parse("!patrol <- move.").unwrap();
    assert_eq!(plan.trigger, Trigger::parse("+!patrol").unwrap());
    assert!(plan.context.is_none());
}

#[test]
fn plan_rule_true_context_and_body_are_empty() {
    let plan = PlanRule::parse("+!idle : true <- true.").unwrap();
    assert!(plan.context.is_none());
    assert!(plan.body.is_empty());
    assert_eq!(plan.to_string(), "+!idle <- true.");
}

#[test]
fn plan_rule_display_round_trips() {
    let src = "@p +!g : c(X) <- a; b.";
    let plan = PlanRule::parse(src).unwrap();
    assert_eq!(plan.to_string(), src);
    assert_eq!(PlanRule::parse(&plan.to_string()).unwrap(), plan);
}

#[test]
fn plan_rule_equivalence_ignores_label_and_spacing() {
    let a = PlanRule::parse("+!g : a(1) <- b; c.").unwrap();
    let b = PlanRule::parse("@lbl +!g :   a(1)   <-  b ;   c .").unwrap();
    assert!(a.is_equivalent(&b));

    let no_context = PlanRule::parse("+!g <- b; c.").unwrap();
    assert!(!a.is_equivalent(&no_context));

    let other_body = PlanRule::parse("+!g : a(1) <- c; b.").unwrap();
    assert!(!a.is_equivalent(&other_body));
}

#[test]
fn plan_rule_ephemeral_label() {
    let plan = PlanRule::parse("@p[type(athena_ephemeral)] +!g <- a.").unwrap();
    assert!(plan.is_ephemeral());
    assert!(!PlanRule::parse("@p +!g <- a.").unwrap().is_ephemeral());
}

#[test]
fn plan_rule_rejects_broken_lines() {
    assert!(PlanRule::parse("+!g <- (.").is_err());
    assert!(PlanRule::parse("+!g : <- a.").is_err());
    assert!(PlanRule::parse("g <- a.").is_err());
    assert!(PlanRule::parse("+!g <- a;; b.").is_err());
}

// ===========================================================================
// Classifier
// ===========================================================================

fn event(line: &str) -> Trigger {
    match classify(line) {
        Directive::Event(t) => t,
        other => panic!("expected event for {:?}, got {:?}", line, other),
    }
}

#[test]
fn classify_plan_rule() {
    match classify("+!patrol : battery(full) <- move(north).") {
        Directive::PlanRule(plan) => {
            assert_eq!(plan.context.as_deref(), Some("battery(full)"));
            assert_eq!(plan.body, ["move(north)"]);
        }
        other => panic!("expected plan, got {:?}", other),
    }
}

#[test]
fn classify_add_goal_and_bare_goal_are_identical() {
    let explicit = classify("+!patrol");
    let bare = classify("!patrol");
    assert_eq!(explicit, bare);

    let t = event("+!patrol");
    assert_eq!(t.operator, Operator::Add);
    assert_eq!(t.kind, EventKind::Goal);
    assert_eq!(t.literal.functor(), "patrol");
}

#[test]
fn classify_events_carry_provenance() {
    let t = event("-at(home)");
    assert_eq!(t.kind, EventKind::Belief);
    assert!(t.literal.has_annotation(SOURCE_ANNOTATION));
    assert!(t.literal.has_annotation(RATIONALE_ANNOTATION));
}

#[test]
fn classify_plain_atom_becomes_implicit_goal() {
    let t = event("some_fact");
    assert_eq!(t.operator, Operator::Add);
    assert_eq!(t.kind, EventKind::Goal);
    assert_eq!(t.literal.functor(), "some_fact");
    assert!(t.literal.has_annotation(SOURCE_ANNOTATION));
}

#[test]
fn classify_falls_back_to_bare_belief() {
    assert_eq!(
        classify("~raining"),
        Directive::BareBelief {
            literal: "~raining".into()
        }
    );
    assert_eq!(
        classify("  some fact  "),
        Directive::BareBelief {
            literal: "some fact".into()
        }
    );
}

#[test]
fn classify_broken_plan_falls_through() {
    assert!(matches!(
        classify("+!g <- (."),
        Directive::BareBelief { .. }
    ));
}

#[test]
fn classify_is_total() {
    for line in [
        "",
        "<-",
        "+",
        "!",
        "((((",
        "\"",
        "@",
        "@x",
        "ünïcödé",
        "+!a[",
        "-!~x",
        "@l[ <- x",
    ] {
        let _ = classify(line);
    }
}

// ===========================================================================
// Line filter
// ===========================================================================

#[test]
fn filter_keeps_directive_shaped_lines() {
    let output = filter_directive_lines([
        "Here is the plan:",
        "+!patrol",
        "```",
        "at(home)",
        "  -busy",
        "**Note**",
        "_tmp(1)",
    ]);
    assert_eq!(output, "+!patrol\nat(home)\n-busy\n_tmp(1)");
}

#[test]
fn filter_rejects_prose() {
    assert!(!is_directive_line("The agent should patrol."));
    assert!(!is_directive_line("# Heading"));
    assert!(!is_directive_line(""));
    assert!(is_directive_line("!patrol"));
}

// ===========================================================================
// InMemoryMind
// ===========================================================================

#[test]
fn mind_beliefs_add_hold_remove() {
    let mind = InMemoryMind::new("bob");
    mind.add_belief(Literal::parse("at(home)").unwrap()).unwrap();
    mind.add_belief(Literal::parse("at(home)").unwrap()).unwrap();
    assert_eq!(mind.beliefs().len(), 1);

    assert!(mind.holds(&Literal::parse("at(X)").unwrap()));
    assert!(mind.remove_belief(&Literal::parse("at(X)").unwrap()).unwrap());
    assert!(!mind.remove_belief(&Literal::parse("at(X)").unwrap()).unwrap());
    assert!(mind.beliefs().is_empty());
}

#[test]
fn mind_install_replaces_by_label() {
    let mind = InMemoryMind::new("bob");
    mind.install_plan(PlanRule::parse("@p +!g <- a.").unwrap())
        .unwrap();
    mind.install_plan(PlanRule::parse("@p +!g <- b.").unwrap())
        .unwrap();
    assert_eq!(mind.plans().len(), 1);
    assert_eq!(mind.plan("p").unwrap().body, ["b"]);

    let removed = mind.uninstall_plan("p").unwrap();
    assert!(removed.is_some());
    assert!(mind.uninstall_plan("p").unwrap().is_none());
}

#[test]
fn mind_rejects_unlabelled_install() {
    let mind = InMemoryMind::new("bob");
    let err = mind
        .install_plan(PlanRule::parse("+!g <- a.").unwrap())
        .unwrap_err();
    assert!(matches!(err, Error::Mind(_)));
}

#[test]
fn mind_events_are_queued_in_order() {
    let mind = InMemoryMind::new("bob");
    mind.raise_event(Trigger::parse("+!a").unwrap()).unwrap();
    mind.raise_event(Trigger::parse("+b").unwrap()).unwrap();
    assert_eq!(mind.pending_events(), 2);
    let events = mind.drain_events();
    assert_eq!(events[0].literal.functor(), "a");
    assert_eq!(events[1].literal.functor(), "b");
    assert_eq!(mind.pending_events(), 0);
}

#[test]
fn mind_builders_and_source() {
    let mind = InMemoryMind::new("bob")
        .with_belief(Literal::parse("ready").unwrap())
        .with_plan(PlanRule::parse("+!g <- a.").unwrap())
        .with_source("/tmp/bob.asl");
    assert_eq!(mind.name(), "bob");
    assert!(mind.holds(&Literal::new("ready")));
    assert_eq!(mind.plans().len(), 1);
    assert_eq!(
        mind.behavior_source().unwrap().to_str(),
        Some("/tmp/bob.asl")
    );
}

// ===========================================================================
// Errors
// ===========================================================================

#[test]
fn error_display_and_recoverability() {
    assert_eq!(Error::Busy.to_string(), "cognitive coordinator is busy");
    assert_eq!(
        Error::Timeout { secs: 30 }.to_string(),
        "cognitive task timed out after 30s"
    );
    assert!(Error::Busy.is_recoverable());
    assert!(Error::Cancelled.is_recoverable());
    assert!(!Error::malformed("x", "y").is_recoverable());
    assert!(!Error::invalid_trigger("x", "y").is_recoverable());
    assert!(!Error::Config("bad".into()).is_recoverable());
}

#[test]
fn error_from_io() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    let err: Error = io.into();
    assert!(err.to_string().contains("gone"));
}
