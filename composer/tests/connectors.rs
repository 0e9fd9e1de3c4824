//! Connector resolution protocol: candidate filtering, defaults, misuse and
//! nested resolution from inside a running module.

use std::sync::{Arc, Mutex};

use composer::core::diagnostics::DiagnosticKind;
use composer::core::types::{ElementKey, ElementKind, ResolveMatch, ResolveState, events};
use composer::engine::{ConnectionRedirector, ResolveOutcome};
use composer::test_support::{ScriptedFactory, ScriptedType, connect, model_of, module, rig_with};

fn skeleton() -> ScriptedType {
    ScriptedType::module("Skeleton")
        .events(&[events::CONSTRUCTION])
        .on_execute(|_, ctx| {
            let root = ctx.add_element(ElementKind::Bone, "good", None);
            ctx.add_element(ElementKind::Bone, "bad", Some(root.clone()));
            ctx.add_element(ElementKind::Bone, "other", Some(root));
            ctx.add_element(ElementKind::Curve, "path", None);
        })
}

/// Owner of a `socket` connector that rejects `bad` (twice) and prefers `good`.
fn owner(discards: Arc<Mutex<Vec<usize>>>) -> ScriptedType {
    ScriptedType::module("Owner")
        .events(&[events::CONSTRUCTION, events::CONNECTOR])
        .on_execute(move |event, ctx| match event {
            events::CONSTRUCTION => {
                ctx.add_connector("socket", true);
                ctx.add_element(ElementKind::Bone, "own", None);
            }
            events::CONNECTOR => {
                let bad = [ElementKey::bone("Skeleton:bad")];
                let first = ctx.discard_matches(&bad, "too far away");
                let second = ctx.discard_matches(&bad, "too far away");
                discards.lock().expect("lock").extend([first, second]);
                ctx.set_default_match(&ElementKey::bone("Skeleton:good"));
            }
            _ => {}
        })
}

fn keys(matches: &[ResolveMatch]) -> Vec<&str> {
    matches.iter().map(|m| m.key.name.as_str()).collect()
}

#[test]
fn find_matches_filters_and_ranks_candidates() {
    let discards = Arc::new(Mutex::new(Vec::new()));
    let factory = ScriptedFactory::new()
        .with_type(skeleton())
        .with_type(owner(Arc::clone(&discards)));
    let mut rig = rig_with(
        factory,
        model_of(vec![module("Skeleton", "", "Skeleton"), module("Owner", "", "Owner")]),
    );

    let found = rig.find_matches(&ElementKey::connector("Owner:socket"), None, None);

    assert_eq!(found.outcome, ResolveOutcome::Success);
    assert_eq!(keys(&found.matches), vec!["Skeleton:good", "Skeleton:other"]);
    assert_eq!(found.matches[0].state, ResolveState::Default);
    assert_eq!(
        found.matches.iter().filter(|m| m.is_default()).count(),
        1
    );
    assert_eq!(*discards.lock().expect("lock"), vec![1, 0]);

    let reasons: Vec<(&str, &str)> = found
        .excluded
        .iter()
        .map(|m| (m.key.name.as_str(), m.message.as_str()))
        .collect();
    assert!(reasons.contains(&("Skeleton:path", "Cannot connect to curves.")));
    assert!(reasons.contains(&("Owner:own", "Cannot connect within the same namespace.")));
    assert_eq!(
        reasons.iter().filter(|(name, _)| *name == "Skeleton:bad").count(),
        1
    );
    assert!(found.excluded.iter().all(|m| m.state == ResolveState::Invalid));
}

#[test]
fn unknown_connector_is_an_error() {
    let factory = ScriptedFactory::new().with_type(skeleton());
    let mut rig = rig_with(factory, model_of(vec![module("Skeleton", "", "Skeleton")]));
    let found = rig.find_matches(&ElementKey::connector("Nowhere:socket"), None, None);
    assert_eq!(found.outcome, ResolveOutcome::Error);
    assert!(found.matches.is_empty());
}

#[test]
fn primary_connector_lookup_uses_the_flagged_connector() {
    let discards = Arc::new(Mutex::new(Vec::new()));
    let factory = ScriptedFactory::new()
        .with_type(skeleton())
        .with_type(owner(discards));
    let mut rig = rig_with(
        factory,
        model_of(vec![module("Skeleton", "", "Skeleton"), module("Owner", "", "Owner")]),
    );
    let found = rig.find_matches_for_primary_connector("Owner");
    assert_eq!(found.connector, ElementKey::connector("Owner:socket"));
    assert_eq!(
        found.default_match().map(|m| m.key.name.as_str()),
        Some("Skeleton:good")
    );

    let missing = rig.find_matches_for_primary_connector("Skeleton");
    assert_eq!(missing.outcome, ResolveOutcome::Error);
}

#[test]
fn resolve_without_owner_or_redirector_clears_candidates() {
    let factory = ScriptedFactory::new().with_type(skeleton());
    let mut rig = rig_with(factory, model_of(vec![module("Skeleton", "", "Skeleton")]));
    let candidates = vec![ResolveMatch::possible(ElementKey::bone("root"))];
    let connector = ElementKey::connector("Skeleton:socket");

    assert!(
        rig.resolve_connector(&connector, None, Some(&ConnectionRedirector::new("Skeleton")), candidates.clone())
            .is_empty()
    );
    assert!(
        rig.resolve_connector(&connector, Some("Skeleton"), None, candidates)
            .is_empty()
    );
}

#[test]
fn protocol_calls_outside_the_connector_event_are_reported() {
    let outcome: Arc<Mutex<Option<(usize, usize, bool)>>> = Arc::default();
    let sink = Arc::clone(&outcome);
    let factory = ScriptedFactory::new().with_type(
        ScriptedType::module("Eager")
            .events(&["Solve"])
            .on_execute(move |_, ctx| {
                let candidates = ctx.candidates().len();
                let discarded = ctx.discard_matches(&[ElementKey::bone("x")], "nope");
                let promoted = ctx.set_default_match(&ElementKey::bone("x"));
                *sink.lock().expect("lock") = Some((candidates, discarded, promoted));
            }),
    );
    let mut rig = rig_with(factory, model_of(vec![module("Eager", "", "Eager")]));
    rig.execute("Solve");

    assert_eq!(*outcome.lock().expect("lock"), Some((0, 0, false)));
    let misuse = rig
        .diagnostics()
        .iter()
        .filter(|d| d.kind == DiagnosticKind::ProtocolMisuse)
        .count();
    assert_eq!(misuse, 3);
    assert_eq!(rig.queue()[0].state(), composer::engine::EntryState::Executed);
}

#[test]
fn default_must_be_among_the_matches() {
    let factory = ScriptedFactory::new().with_type(
        ScriptedType::module("Picky")
            .events(&[events::CONNECTOR])
            .on_execute(|_, ctx| {
                assert!(!ctx.set_default_match(&ElementKey::bone("absent")));
                assert!(ctx.set_default_match(&ElementKey::bone("a")));
                assert!(ctx.set_default_match(&ElementKey::bone("b")));
            }),
    );
    let mut rig = rig_with(factory, model_of(vec![module("Picky", "", "Picky")]));
    let candidates = vec![
        ResolveMatch::possible(ElementKey::bone("a")),
        ResolveMatch::possible(ElementKey::bone("b")),
        ResolveMatch::possible(ElementKey::bone("c")),
    ];

    let result = rig.resolve_connector(
        &ElementKey::connector("Picky:socket"),
        Some("Picky"),
        Some(&ConnectionRedirector::new("Picky")),
        candidates,
    );

    assert_eq!(keys(&result), vec!["a", "b", "c"]);
    let states: Vec<ResolveState> = result.iter().map(|m| m.state).collect();
    assert_eq!(
        states,
        vec![ResolveState::Possible, ResolveState::Default, ResolveState::Possible]
    );
    assert!(
        rig.diagnostics()
            .iter()
            .any(|d| d.kind == DiagnosticKind::ProtocolMisuse && d.subject == "Picky")
    );
}

#[test]
fn nested_resolution_restores_the_running_module() {
    let discards = Arc::new(Mutex::new(Vec::new()));
    let observed: Arc<Mutex<Vec<String>>> = Arc::default();
    let sink = Arc::clone(&observed);
    let driver = ScriptedType::module("Driver")
        .events(&["Solve"])
        .on_execute(move |event, ctx| {
            let candidates = ["good", "bad", "other"]
                .into_iter()
                .map(|name| ResolveMatch::possible(ElementKey::bone(format!("Skeleton:{name}"))))
                .collect();
            let redirector = ConnectionRedirector::new("Owner");
            let result = ctx.resolve_connector(
                &ElementKey::connector("Owner:socket"),
                Some("Owner"),
                Some(&redirector),
                candidates,
            );
            let mut log = sink.lock().expect("lock");
            log.extend(result.into_iter().map(|m| format!("{}={:?}", m.key.name, m.state)));
            log.push(format!("{event}@{}", ctx.module_path()));
            log.push(ctx.hierarchy().active_namespace().to_string());
        });
    let factory = ScriptedFactory::new()
        .with_type(driver)
        .with_type(owner(discards));
    let mut rig = rig_with(
        factory.clone(),
        model_of(vec![module("Driver", "", "Driver"), module("Owner", "", "Owner")]),
    );

    rig.evaluate(&["Solve"]);

    assert_eq!(
        *observed.lock().expect("lock"),
        vec![
            "Skeleton:good=Default".to_string(),
            "Skeleton:other=Possible".to_string(),
            "Solve@Driver".to_string(),
            "Driver:".to_string(),
        ]
    );
    assert_eq!(rig.queue().len(), 1);
    assert_eq!(rig.queue()[0].module_path(), "Driver");
    assert!(rig.queue()[0].executed());
    assert_eq!(
        factory.executions(),
        vec![
            ("Driver".to_string(), "Solve".to_string()),
            ("Owner".to_string(), events::CONNECTOR.to_string()),
        ]
    );
}

#[test]
fn connector_parents_follow_the_wiring() {
    let factory = ScriptedFactory::new()
        .with_type(skeleton())
        .with_type(
            ScriptedType::module("Limb")
                .events(&[events::CONSTRUCTION])
                .on_execute(|_, ctx| {
                    let socket = ctx.add_connector("parent", true);
                    ctx.add_element(ElementKind::Bone, "upper", Some(socket));
                }),
        );
    let mut model = model_of(vec![
        module("Skeleton", "", "Skeleton"),
        module("Limb", "Skeleton", "Limb"),
    ]);
    connect(&mut model, "Skeleton/Limb:parent", "Skeleton:good");
    let mut rig = rig_with(factory, model);
    rig.execute(events::CONSTRUCTION);

    let upper = rig
        .hierarchy()
        .get(&ElementKey::bone("Skeleton/Limb:upper"))
        .expect("upper");
    assert_eq!(upper.parent, Some(ElementKey::bone("Skeleton:good")));
    assert_eq!(
        rig.find_primary_connector("Skeleton/Limb"),
        Some(ElementKey::connector("Skeleton/Limb:parent"))
    );
    assert_eq!(
        rig.find_connectors("Skeleton/Limb"),
        vec![ElementKey::connector("Skeleton/Limb:parent")]
    );
}

#[test]
fn module_cannot_resolve_its_own_connector_while_running() {
    let observed: Arc<Mutex<Vec<String>>> = Arc::default();
    let sink = Arc::clone(&observed);
    let factory = ScriptedFactory::new().with_type(
        ScriptedType::module("Me")
            .events(&["Solve", events::CONNECTOR])
            .on_execute(move |event, ctx| {
                if event == events::CONNECTOR {
                    ctx.discard_matches(&[ElementKey::bone("bad")], "rejected");
                    return;
                }
                let candidates = ["bad", "ok"]
                    .into_iter()
                    .map(|name| ResolveMatch::possible(ElementKey::bone(name)))
                    .collect();
                let result = ctx.resolve_connector(
                    &ElementKey::connector("Me:socket"),
                    Some("Me"),
                    Some(&ConnectionRedirector::new("Me")),
                    candidates,
                );
                sink.lock()
                    .expect("lock")
                    .extend(result.into_iter().map(|m| m.key.name));
            }),
    );
    let mut rig = rig_with(factory.clone(), model_of(vec![module("Me", "", "Me")]));

    rig.execute("Solve");

    assert!(observed.lock().expect("lock").is_empty());
    assert_eq!(
        factory.executions(),
        vec![("Me".to_string(), "Solve".to_string())]
    );
    assert!(
        rig.diagnostics()
            .iter()
            .any(|d| d.kind == DiagnosticKind::ProtocolMisuse && d.subject == "Me")
    );
    assert!(rig.queue()[0].executed());
}

#[test]
fn non_ascii_module_names_are_filtered_without_panicking() {
    let factory = ScriptedFactory::new()
        .with_type(
            ScriptedType::module("Accent")
                .events(&[events::CONSTRUCTION])
                .on_execute(|_, ctx| {
                    ctx.add_element(ElementKind::Bone, "x", None);
                }),
        )
        .with_type(
            ScriptedType::module("Socket")
                .events(&[events::CONSTRUCTION])
                .on_execute(|_, ctx| {
                    ctx.add_connector("socket", true);
                }),
        );
    let mut rig = rig_with(
        factory,
        model_of(vec![module("Abcé", "", "Accent"), module("Arm", "", "Socket")]),
    );

    let found = rig.find_matches(&ElementKey::connector("Arm:socket"), None, None);

    assert_eq!(found.outcome, ResolveOutcome::Success);
    assert_eq!(keys(&found.matches), vec!["Abcé:x"]);
}

#[test]
fn secondary_connector_is_not_used_as_primary() {
    let factory = ScriptedFactory::new().with_type(skeleton()).with_type(
        ScriptedType::module("Loose")
            .events(&[events::CONSTRUCTION])
            .on_execute(|_, ctx| {
                ctx.add_connector("aim", false);
            }),
    );
    let mut rig = rig_with(
        factory,
        model_of(vec![module("Skeleton", "", "Skeleton"), module("Loose", "", "Loose")]),
    );

    let found = rig.find_matches_for_primary_connector("Loose");

    assert_eq!(found.outcome, ResolveOutcome::Error);
    assert_eq!(rig.find_connectors("Loose"), vec![ElementKey::connector("Loose:aim")]);
    assert_eq!(rig.find_primary_connector("Loose"), None);
}
