//! End-to-end tests: driver, plan library loading and the full cognitive cycle

use athena::driver::{self, Command};
use athena_agent::CoordinatorConfig;
use athena_cognition::{Athena, EvictionMode, InjectorSettings, MonitorSettings, TickOutcome};
use athena_core::{AgentMind, EventKind, InMemoryMind, Literal, INCORPORATED_BELIEF};
use athena_llm::{ProviderCall, ScriptedBehavior, ScriptedProvider};
use std::sync::Arc;
use std::time::Duration;

fn athena(mind: &Arc<InMemoryMind>, provider: &Arc<ScriptedProvider>) -> Arc<Athena> {
    Athena::new(
        mind.clone(),
        provider.clone(),
        CoordinatorConfig {
            watchdog: Duration::from_secs(5),
            ..Default::default()
        },
        InjectorSettings::default(),
    )
}

// ===========================================================================
// Driver commands
// ===========================================================================

#[test]
fn commands_parse() {
    assert_eq!(driver::parse_command("   "), Command::Empty);
    assert_eq!(driver::parse_command(":ask what now?"), Command::Ask("what now?".into()));
    assert_eq!(driver::parse_command(":think  door closed "), Command::Think("door closed".into()));
    assert_eq!(driver::parse_command(":persona bob.txt"), Command::Persona("bob.txt".into()));
    assert_eq!(driver::parse_command(":stop"), Command::Stop);
    assert_eq!(driver::parse_command(":reflect"), Command::Reflect);
    assert_eq!(
        driver::parse_command(":route alice,carol fire in the kitchen"),
        Command::Route {
            agents: vec!["alice".into(), "carol".into()],
            content: "fire in the kitchen".into()
        }
    );
    assert_eq!(
        driver::parse_command(":context image /tmp/a.png"),
        Command::Context {
            kind: "image".into(),
            content: "/tmp/a.png".into()
        }
    );
    assert_eq!(driver::parse_command(" +at(home) "), Command::Inject("+at(home)".into()));
    assert_eq!(driver::parse_command(":dance"), Command::Inject(":dance".into()));
}

#[test]
fn behavior_file_loads_and_labels_plans() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bob.asl");
    std::fs::write(
        &path,
        "// bob's plans\n\n@patrol +!patrol <- move(north).\n+!rest : tired <- sleep.\n",
    )
    .unwrap();

    let plans = driver::load_behavior(&path).unwrap();
    assert_eq!(plans.len(), 2);
    assert_eq!(plans[0].label_name(), Some("patrol"));
    assert_eq!(plans[1].label_name(), Some("p4"));

    std::fs::write(&path, "+!broken <- (.\n").unwrap();
    assert!(driver::load_behavior(&path).is_err());
    std::fs::write(&path, "// nothing\n").unwrap();
    assert!(driver::load_behavior(&path).is_err());
}

#[tokio::test]
async fn driver_injects_and_stops() {
    let mind = Arc::new(InMemoryMind::new("bob"));
    let provider = Arc::new(ScriptedProvider::text(""));
    let athena = athena(&mind, &provider);

    let input: &[u8] = b"+at(home)\n+!greet <- say(hi).\n:persona You are Bob.\n\n:stop\n+late\n";
    driver::run(athena.clone(), input, Vec::new()).await.unwrap();

    let events = mind.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].literal.functor(), "at");
    assert_eq!(mind.plans().len(), 1);
    assert_eq!(athena.context().persona(), "You are Bob.");
}

// ===========================================================================
// Cognitive cycle
// ===========================================================================

#[tokio::test]
async fn think_learns_plans_that_consolidate_into_the_library() {
    let library = athena_core::PlanRule::parse("@p1 +!patrol <- move.").unwrap();
    let mind = Arc::new(InMemoryMind::new("bob").with_plan(library));
    let provider = Arc::new(ScriptedProvider::sequence(vec![
        ScriptedBehavior::Text("+!flee : fire <- run.\n+danger".into()),
        ScriptedBehavior::Text("!flee : fire <- run\n+!hide <- crouch.".into()),
    ]));
    let athena = athena(&mind, &provider);
    athena.start_thinking(None).await.unwrap();
    assert!(mind.holds(&Literal::new(INCORPORATED_BELIEF)));

    let first = athena.think("", None, "smoke", &[]).unwrap().await.unwrap().unwrap();
    assert_eq!(first.plans_added.len(), 1);
    assert_eq!(first.events, 1);
    let second = athena.think("", None, "more smoke", &[]).unwrap().await.unwrap().unwrap();
    assert_eq!(second.plans_reinforced, first.plans_added);
    assert_eq!(second.plans_added.len(), 1);

    let store = athena.injector().store();
    assert_eq!(store.usage(&first.plans_added[0]), Some(2));

    let report = store.evict(athena.mind().as_ref(), 1, EvictionMode::Promote);
    assert_eq!(report.promoted, first.plans_added);
    assert_eq!(report.pruned, second.plans_added);

    let learned = mind.plan(&first.plans_added[0]).unwrap();
    assert!(!learned.is_ephemeral());
    assert_eq!(mind.plans().len(), 2);

    let initialize_prompts: Vec<String> = provider
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            ProviderCall::Initialize { system_prompt, .. } => Some(system_prompt),
            _ => None,
        })
        .collect();
    assert_eq!(initialize_prompts[0], "@p1 +!patrol <- move.");
    assert!(initialize_prompts[1].contains("@p1 +!patrol <- move."));
}

#[tokio::test]
async fn monitor_reacts_to_injected_belief() {
    let mind = Arc::new(InMemoryMind::new("bob"));
    let provider = Arc::new(ScriptedProvider::text("+!investigate"));
    let athena = athena(&mind, &provider);
    athena.start_thinking(None).await.unwrap();
    athena.configure_monitor(
        MonitorSettings::new(Duration::from_secs(60))
            .with_triggers(vec!["noise(Where)".into()])
            .with_poll_interval(Duration::from_millis(20), Duration::from_millis(20)),
        )
        .unwrap();

    mind.add_belief(Literal::parse("noise(hall)").unwrap()).unwrap();

    let mut asked = false;
    for _ in 0..100 {
        if provider.ask_count() > 0 && mind.pending_events() > 0 {
            asked = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(asked, "monitor never woke cognition");
    let events = mind.drain_events();
    assert_eq!(events[0].kind, EventKind::Goal);
    assert_eq!(events[0].literal.functor(), "investigate");

    athena.stop_thinking().await;
    assert!(!athena.has_monitor());
}

#[tokio::test]
async fn manual_monitor_tick_is_dormant_after_stop() {
    let mind = Arc::new(InMemoryMind::new("bob"));
    let provider = Arc::new(ScriptedProvider::text(""));
    let athena = athena(&mind, &provider);
    athena.start_thinking(None).await.unwrap();
    athena.stop_thinking().await;

    let monitor = athena_cognition::ActivityMonitor::new(
        MonitorSettings::new(Duration::ZERO),
        athena.mind().clone(),
        athena.coordinator().clone(),
        athena.injector().clone(),
        athena.context().clone(),
    );
    assert_eq!(monitor.tick(), TickOutcome::Dormant);
}
