//! Tests for athena-agent: single flight, watchdog, persona tracking, routing and templates

use athena_agent::*;
use athena_core::{CoordinatorState, Error, SessionKey};
use athena_llm::{ProviderCall, ScriptedBehavior, ScriptedProvider};
use std::sync::Arc;
use std::time::Duration;

fn coordinator(provider: Arc<ScriptedProvider>) -> CognitiveCoordinator {
    CognitiveCoordinator::spawn(
        SessionKey::new("bob"),
        provider,
        CoordinatorConfig {
            watchdog: Duration::from_secs(5),
            ..Default::default()
        },
    )
}

// ===========================================================================
// Translation
// ===========================================================================

#[tokio::test]
async fn dispatch_filters_prose_out_of_the_answer() {
    let provider = Arc::new(ScriptedProvider::text(
        "Sure! Here is what to do:\n+!patrol\n```\nat(home)\nThat's all.",
    ));
    let coord = coordinator(provider.clone());

    let handle = coord
        .dispatch(CognitiveRequest::new("System Alert: Agent is idle. What should I do?"))
        .unwrap();
    let answer = handle.wait().await.unwrap();

    assert_eq!(answer, "+!patrol\nat(home)");
    assert_eq!(coord.state(), CoordinatorState::Idle);
}

#[tokio::test]
async fn dispatch_builds_system_prompt_from_persona_and_plans() {
    let provider = Arc::new(ScriptedProvider::text("+!patrol"));
    let coord = CognitiveCoordinator::spawn(
        SessionKey::new("bob"),
        provider.clone(),
        CoordinatorConfig {
            templates: PromptTemplates::new("PLANS:\n##PLANOS_DO_AGENTE##", "unused"),
            ..Default::default()
        },
    );

    coord
        .dispatch(
            CognitiveRequest::new("hello")
                .with_persona("You are Bob.")
                .with_plans("+!patrol <- move.")
                .with_images(vec!["aW1n".into()])
                .with_model(Some("llava".into())),
        )
        .unwrap()
        .wait()
        .await
        .unwrap();

    let expected_system = "You are Bob.\n\nPLANS:\n+!patrol <- move.".to_string();
    let calls = provider.calls();
    assert_eq!(
        calls[1],
        ProviderCall::Initialize {
            session: "bob".into(),
            system_prompt: expected_system.clone()
        }
    );
    assert_eq!(
        calls[2],
        ProviderCall::Ask {
            session: "bob".into(),
            input: "hello".into(),
            system: Some(expected_system),
            model: Some("llava".into()),
            images: 1,
        }
    );
}

#[tokio::test]
async fn service_error_surfaces_and_returns_to_idle() {
    let provider = Arc::new(ScriptedProvider::constant(ScriptedBehavior::Error(
        "500 internal".into(),
    )));
    let coord = coordinator(provider);

    let err = coord
        .dispatch(CognitiveRequest::new("x"))
        .unwrap()
        .wait()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Inference(ref m) if m.contains("500 internal")));
    assert_eq!(coord.state(), CoordinatorState::Idle);
}

#[tokio::test]
async fn failed_initialization_is_retried_on_next_dispatch() {
    let provider = Arc::new(ScriptedProvider::text("+!a").failing_initialize("no model"));
    let coord = coordinator(provider.clone());

    let err = coord
        .dispatch(CognitiveRequest::new("x"))
        .unwrap()
        .wait()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Inference(_)));
    assert!(coord.fingerprint().is_none());

    let _ = coord.dispatch(CognitiveRequest::new("y")).unwrap().wait().await;
    let inits = provider
        .calls()
        .iter()
        .filter(|c| matches!(c, ProviderCall::Initialize { .. }))
        .count();
    assert_eq!(inits, 2);
    assert_eq!(provider.ask_count(), 0);
}

#[tokio::test]
async fn failed_persona_switch_forces_reinitialization() {
    let provider = Arc::new(ScriptedProvider::text("+!ok"));
    let coord = coordinator(provider.clone());
    let as_persona = |p: &str| CognitiveRequest::new("hello").with_persona(p);

    let first = coord.dispatch(as_persona("You are A.")).unwrap().wait().await;
    assert_eq!(first.unwrap(), "+!ok");

    provider.fail_next_initialize("transient");
    let err = coord
        .dispatch(as_persona("You are B."))
        .unwrap()
        .wait()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Inference(_)));
    assert!(coord.fingerprint().is_none());

    for _ in 0..2 {
        let answer = coord.dispatch(as_persona("You are A.")).unwrap().wait().await;
        assert_eq!(answer.unwrap(), "+!ok");
    }
    assert_eq!(coord.fingerprint(), Some(persona_fingerprint("You are A.")));
    let inits = provider
        .calls()
        .iter()
        .filter(|c| matches!(c, ProviderCall::Initialize { .. }))
        .count();
    assert_eq!(inits, 3);
}

// ===========================================================================
// Single flight
// ===========================================================================

#[tokio::test]
async fn second_dispatch_while_busy_fails_fast() {
    let provider = Arc::new(ScriptedProvider::constant(ScriptedBehavior::Hang));
    let coord = coordinator(provider.clone());

    let first = coord.dispatch(CognitiveRequest::new("one")).unwrap();
    assert_eq!(coord.state(), CoordinatorState::Busy);

    let second = coord.dispatch(CognitiveRequest::new("two"));
    assert!(matches!(second, Err(Error::Busy)));
    let routed = coord.route_information("data", &["alice".to_string()]);
    assert!(matches!(routed, Err(Error::Busy)));

    assert!(coord.cancel());
    assert_eq!(coord.state(), CoordinatorState::Idle);
    assert!(matches!(first.wait().await, Err(Error::Cancelled)));
}

#[tokio::test]
async fn cancel_when_idle_is_a_no_op() {
    let provider = Arc::new(ScriptedProvider::text("+!a"));
    let coord = coordinator(provider);
    assert!(!coord.cancel());
    assert_eq!(coord.state(), CoordinatorState::Idle);
}

#[tokio::test]
async fn cancelled_task_does_not_release_its_successor() {
    let provider = Arc::new(ScriptedProvider::constant(ScriptedBehavior::Delayed {
        text: "+!second".into(),
        delay: Duration::from_millis(100),
    }));
    let coord = coordinator(provider.clone());

    let first = coord.dispatch(CognitiveRequest::new("one")).unwrap();
    coord.cancel();
    let second = coord.dispatch(CognitiveRequest::new("two")).unwrap();

    assert!(matches!(first.wait().await, Err(Error::Cancelled)));
    assert_eq!(coord.state(), CoordinatorState::Busy);
    assert_eq!(second.wait().await.unwrap(), "+!second");
    assert_eq!(coord.state(), CoordinatorState::Idle);
    assert_eq!(provider.ask_count(), 1, "the cancelled task never reached the service");
}

// ===========================================================================
// Watchdog
// ===========================================================================

#[tokio::test]
async fn watchdog_times_out_and_returns_to_idle() {
    let provider = Arc::new(ScriptedProvider::constant(ScriptedBehavior::Hang));
    let coord = CognitiveCoordinator::spawn(
        SessionKey::new("bob"),
        provider.clone(),
        CoordinatorConfig {
            watchdog: Duration::from_millis(100),
            ..Default::default()
        },
    );

    let handle = coord.dispatch(CognitiveRequest::new("x")).unwrap();
    let err = handle.wait().await.unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }));
    assert_eq!(coord.state(), CoordinatorState::Idle);

    assert!(coord.dispatch(CognitiveRequest::new("y")).is_ok());
}

// ===========================================================================
// Persona tracking
// ===========================================================================

#[tokio::test]
async fn persona_change_ends_session_before_reinitializing() {
    let provider = Arc::new(ScriptedProvider::text("+!ok"));
    let coord = coordinator(provider.clone());

    coord
        .dispatch(CognitiveRequest::new("1").with_persona("A"))
        .unwrap()
        .wait()
        .await
        .unwrap();
    let first_fingerprint = coord.fingerprint();
    assert_eq!(first_fingerprint, Some(persona_fingerprint("A")));

    coord
        .dispatch(CognitiveRequest::new("2").with_persona("A"))
        .unwrap()
        .wait()
        .await
        .unwrap();
    let after_same = provider.calls().len();

    coord
        .dispatch(CognitiveRequest::new("3").with_persona("B"))
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_ne!(coord.fingerprint(), first_fingerprint);

    let calls = provider.calls();
    // Same persona: a single ask, no session churn.
    assert!(matches!(calls[after_same - 1], ProviderCall::Ask { .. }));
    assert!(matches!(calls[after_same - 2], ProviderCall::Ask { .. }));

    let tail = &calls[after_same..];
    assert!(matches!(tail[0], ProviderCall::EndSession { .. }));
    match &tail[1] {
        ProviderCall::Initialize { system_prompt, .. } => {
            assert!(system_prompt.starts_with("B\n\n"))
        }
        other => panic!("expected initialize, got {:?}", other),
    }
    assert!(matches!(tail[2], ProviderCall::Ask { ref input, .. } if input == "3"));
}

#[test]
fn fingerprint_is_content_based() {
    assert_eq!(persona_fingerprint("Bob"), persona_fingerprint("Bob"));
    assert_ne!(persona_fingerprint("Bob"), persona_fingerprint("Bob "));
    assert_eq!(persona_fingerprint("").len(), 44);
}

// ===========================================================================
// Routing and questions
// ===========================================================================

#[tokio::test]
async fn routing_uses_separate_lazily_initialized_session() {
    let provider = Arc::new(ScriptedProvider::text("+tell(alice, data)"));
    let coord = coordinator(provider.clone());
    let agents = vec!["alice".to_string(), "carol".to_string()];

    let first = coord
        .route_information("+at(home)", &agents)
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(first, "+tell(alice, data)");
    coord
        .route_information("+at(work)", &agents)
        .unwrap()
        .wait()
        .await
        .unwrap();

    let calls = provider.calls();
    assert_eq!(
        calls[0],
        ProviderCall::Initialize {
            session: "bob_router".into(),
            system_prompt: String::new()
        }
    );
    match &calls[1] {
        ProviderCall::Ask {
            session,
            input,
            system,
            ..
        } => {
            assert_eq!(session, "bob_router");
            assert_eq!(input, "AGENT_LIST: [alice, carol]\nDATA: +at(home)");
            assert!(system.is_none());
        }
        other => panic!("expected ask, got {:?}", other),
    }
    assert!(matches!(calls[2], ProviderCall::Ask { .. }));
    assert_eq!(calls.len(), 3);
    assert!(!provider.has_session(&SessionKey::new("bob")));
}

#[tokio::test]
async fn ask_returns_unfiltered_answer_on_open_session() {
    let provider = Arc::new(ScriptedProvider::text("The answer is 42.\nTruly.").with_init_cost(7));
    let coord = coordinator(provider.clone());

    let err = coord
        .ask("", "what?", Vec::new(), None)
        .unwrap()
        .wait()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SessionNotInitialized(_)));

    assert_eq!(coord.open_session("You are Bob.").await.unwrap(), 7);
    let answer = coord
        .ask("You are Bob.", "what?", Vec::new(), None)
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(answer, "The answer is 42.\nTruly.");
}

// ===========================================================================
// Lifecycle
// ===========================================================================

#[tokio::test]
async fn end_session_clears_fingerprint_and_cancels() {
    let provider = Arc::new(ScriptedProvider::sequence(vec![
        ScriptedBehavior::Text("+!a".into()),
        ScriptedBehavior::Hang,
    ]));
    let coord = coordinator(provider.clone());

    coord.dispatch(CognitiveRequest::new("1")).unwrap().wait().await.unwrap();
    assert!(coord.fingerprint().is_some());

    let pending = coord.dispatch(CognitiveRequest::new("2")).unwrap();
    coord.end_session().await;
    assert!(coord.fingerprint().is_none());
    assert!(!coord.is_busy());
    assert!(matches!(pending.wait().await, Err(Error::Cancelled)));
    assert!(!provider.has_session(&SessionKey::new("bob")));
}

#[tokio::test]
async fn shutdown_resolves_pending_handles() {
    let provider = Arc::new(ScriptedProvider::constant(ScriptedBehavior::Hang));
    let coord = coordinator(provider.clone());

    coord
        .route_information("x", &[])
        .unwrap();
    coord.cancel();
    let pending = coord.dispatch(CognitiveRequest::new("y")).unwrap();
    coord.shutdown().await;

    assert!(matches!(pending.wait().await, Err(Error::Cancelled)));
    let after = coord.dispatch(CognitiveRequest::new("z"));
    if let Ok(handle) = after {
        assert!(matches!(handle.wait().await, Err(Error::Cancelled)));
    }
}

// ===========================================================================
// Prompt templates
// ===========================================================================

#[test]
fn system_prompt_with_and_without_persona() {
    let templates = PromptTemplates::new("Plans: ##PLANOS_DO_AGENTE##", "");
    assert_eq!(templates.system_prompt("", "p1"), "Plans: p1");
    assert_eq!(templates.system_prompt("Bob", "p1"), "Bob\n\nPlans: p1");
}

#[test]
fn default_templates_contain_placeholders() {
    let templates = PromptTemplates::default();
    assert!(templates.translation().contains(prompt::PLANS_PLACEHOLDER));
    assert_eq!(
        templates.delegation_prompt("+x", &["a".to_string()]),
        "AGENT_LIST: [a]\nDATA: +x"
    );
}

#[test]
fn templates_load_from_files_with_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let translation = dir.path().join("translation.txt");
    std::fs::write(&translation, "T ##PLANOS_DO_AGENTE##").unwrap();
    let missing = dir.path().join("missing.txt");

    let templates = PromptTemplates::load(Some(&translation), Some(&missing));
    assert_eq!(templates.system_prompt("", "x"), "T x");
    assert_eq!(templates.delegation(), prompt::DEFAULT_DELEGATION_TEMPLATE);

    let defaults = PromptTemplates::load(None, None);
    assert_eq!(defaults.translation(), prompt::DEFAULT_TRANSLATION_TEMPLATE);
}
