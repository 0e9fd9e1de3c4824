use composer::core::model::ModuleReference;
use composer::core::types::{ElementKey, ElementKind, events};
use composer::engine::ModularRig;
use composer::test_support::{ScriptedFactory, ScriptedType, model_of, module, rig_with};

fn arm(name: &str, short_name: &str) -> ModuleReference {
    let mut reference = module(name, "Spine", "Arm");
    reference.short_name = Some(short_name.to_string());
    reference
}

fn build(left: &str, right: &str) -> ModularRig {
    let factory = ScriptedFactory::new()
        .with_type(
            ScriptedType::module("Spine")
                .events(&[events::CONSTRUCTION])
                .on_execute(|_, ctx| {
                    ctx.add_element(ElementKind::Bone, "chest", None);
                }),
        )
        .with_type(
            ScriptedType::module("Arm")
                .events(&[events::CONSTRUCTION])
                .on_execute(|_, ctx| {
                    ctx.add_element(ElementKind::Control, "hand", None);
                }),
        );
    rig_with(
        factory,
        model_of(vec![
            module("Spine", "", "Spine"),
            arm("LeftArm", left),
            arm("RightArm", right),
        ]),
    )
}

fn shortest(rig: &ModularRig, name: &str, kind: ElementKind) -> Option<String> {
    rig.shortest_display_path(&ElementKey::new(kind, name), false)
}

#[test]
fn unique_names_drop_the_namespace() {
    let mut rig = build("L", "R");
    assert_eq!(shortest(&rig, "Spine:chest", ElementKind::Bone), None);

    rig.execute(events::CONSTRUCTION);

    assert_eq!(
        shortest(&rig, "Spine:chest", ElementKind::Bone).as_deref(),
        Some("chest")
    );
    assert_eq!(
        rig.shortest_display_path(&ElementKey::bone("Spine:chest"), true)
            .as_deref(),
        Some("Spine:chest")
    );
}

#[test]
fn shared_names_use_module_display_names() {
    let mut rig = build("L", "R");
    rig.execute(events::CONSTRUCTION);
    assert_eq!(
        shortest(&rig, "Spine/LeftArm:hand", ElementKind::Control).as_deref(),
        Some("L:hand")
    );
    assert_eq!(
        shortest(&rig, "Spine/RightArm:hand", ElementKind::Control).as_deref(),
        Some("R:hand")
    );
}

#[test]
fn clashing_display_names_fall_back_to_full_names() {
    let mut rig = build("Arm", "Arm");
    rig.execute(events::CONSTRUCTION);

    let left = shortest(&rig, "Spine/LeftArm:hand", ElementKind::Control);
    let right = shortest(&rig, "Spine/RightArm:hand", ElementKind::Control);
    assert_eq!(left.as_deref(), Some("Spine/LeftArm:hand"));
    assert_eq!(right.as_deref(), Some("Spine/RightArm:hand"));
}

#[test]
fn every_element_gets_a_distinct_display_path() {
    let mut rig = build("Arm", "Arm");
    rig.execute(events::CONSTRUCTION);

    let mut paths: Vec<String> = rig
        .hierarchy()
        .keys()
        .filter_map(|key| rig.shortest_display_path(key, false))
        .collect();
    assert_eq!(paths.len(), rig.hierarchy().len());
    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), rig.hierarchy().len());
}
