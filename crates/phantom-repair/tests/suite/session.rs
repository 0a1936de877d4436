use phantom_repair::config::StubBodies;
use phantom_repair::flags::{
    ACC_ABSTRACT, ACC_ANNOTATION, ACC_FINAL, ACC_INTERFACE, ACC_PUBLIC, ACC_STATIC, ACC_SUPER,
};
use phantom_repair::{RepairConfig, RepairError, RepairSession, StubBody};
use phantom_solver::Constraint;
use phantom_types::Type;
use pretty_assertions::assert_eq;
use serde_json::json;

use super::{archive, desc, repair, session, stub, t};

/// `app/Main.go` with the given descriptor and instructions.
fn main_with(descriptor: &str, max_locals: u16, instructions: serde_json::Value) -> serde_json::Value {
    json!({
        "name": "app/Main",
        "methods": [{
            "access": ACC_PUBLIC | ACC_STATIC,
            "name": "go",
            "descriptor": descriptor,
            "body": { "max_locals": max_locals, "instructions": instructions }
        }]
    })
}

fn runnable() -> serde_json::Value {
    json!({
        "name": "lib/Runnable",
        "interface": true,
        "methods": [{ "access": ACC_PUBLIC | ACC_ABSTRACT, "name": "run", "descriptor": "()V" }]
    })
}

/// `app/Widget extends ph/Base`, created and painted by `app/Main`.
fn widget_archive() -> serde_json::Value {
    json!({
        "classes": [
            {
                "name": "app/Widget",
                "superclass": "ph/Base",
                "methods": [{ "name": "<init>", "descriptor": "()V" }]
            },
            main_with("()V", 0, json!([
                { "op": "new", "ty": "app/Widget" },
                { "op": "dup" },
                { "op": "invoke", "invoke": "special", "owner": "app/Widget", "name": "<init>", "descriptor": "()V" },
                { "op": "invoke", "invoke": "virtual", "owner": "app/Widget", "name": "paint", "descriptor": "()V" },
                { "op": "return" }
            ]))
        ]
    })
}

#[test]
fn phantom_receiver_becomes_a_class_implementing_the_library_interface() {
    let report = repair(json!({
        "library": [runnable()],
        "classes": [main_with("(Lph/Task;)V", 1, json!([
            { "op": "load", "kind": "reference", "var": 0 },
            { "op": "ldc", "value": { "kind": "int", "value": 3 } },
            { "op": "invoke", "invoke": "virtual", "owner": "ph/Task", "name": "start", "descriptor": "(I)V" },
            { "op": "load", "kind": "reference", "var": 0 },
            { "op": "invoke", "invoke": "interface", "owner": "lib/Runnable", "name": "run", "descriptor": "()V" },
            { "op": "return" }
        ]))]
    }))
    .unwrap();

    assert_eq!(report.solution.phantoms, vec![t("ph/Task")]);
    assert!(report
        .constraints
        .contains(&Constraint::subtype(t("ph/Task"), t("lib/Runnable"))));
    assert!(report.constraints.contains(&Constraint::isa_class(t("ph/Task"))));

    let task = stub(&report, "ph/Task");
    assert!(!task.is_interface());
    assert_eq!(task.access_flags, ACC_PUBLIC | ACC_SUPER);
    assert_eq!(task.super_class, Some(Type::OBJECT));
    assert_eq!(task.interfaces, vec![t("lib/Runnable")]);

    let start = task.method("start", &desc("(I)V")).unwrap();
    assert_eq!(start.access_flags, ACC_PUBLIC);
    assert_eq!(start.body, StubBody::ThrowUnsupported);
    // Inherited from the interface and implemented nowhere.
    let run = task.method("run", &desc("()V")).unwrap();
    assert_eq!(run.access_flags, ACC_PUBLIC);
    assert_eq!(
        task.method("<init>", &desc("()V")).unwrap().body,
        StubBody::CallSuper {
            superclass: Type::OBJECT
        }
    );
}

#[test]
fn invokeinterface_makes_the_owner_an_interface() {
    let report = repair(json!({
        "classes": [main_with("(Lph/Listener;)V", 1, json!([
            { "op": "load", "kind": "reference", "var": 0 },
            { "op": "invoke", "invoke": "interface", "owner": "ph/Listener", "name": "fire", "descriptor": "()V" },
            { "op": "return" }
        ]))]
    }))
    .unwrap();

    let listener = stub(&report, "ph/Listener");
    assert!(listener.is_interface());
    assert_eq!(listener.access_flags, ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT);
    assert_eq!(listener.methods.len(), 1);
    let fire = listener.method("fire", &desc("()V")).unwrap();
    assert_eq!(fire.access_flags, ACC_PUBLIC | ACC_ABSTRACT);
    assert_eq!(fire.body, StubBody::Abstract);
}

#[test]
fn field_uses_decide_field_flags() {
    let report = repair(json!({
        "classes": [main_with("(Lph/Point;)I", 1, json!([
            { "op": "field", "field": "getstatic", "owner": "ph/Config", "name": "DEFAULT", "descriptor": "Lph/Config;" },
            { "op": "pop" },
            { "op": "load", "kind": "reference", "var": 0 },
            { "op": "ldc", "value": { "kind": "int", "value": 1 } },
            { "op": "field", "field": "putfield", "owner": "ph/Point", "name": "x", "descriptor": "I" },
            { "op": "load", "kind": "reference", "var": 0 },
            { "op": "field", "field": "getfield", "owner": "ph/Point", "name": "x", "descriptor": "I" },
            { "op": "return", "kind": "int" }
        ]))]
    }))
    .unwrap();

    let config = stub(&report, "ph/Config");
    assert_eq!(
        config.field("DEFAULT").unwrap().access_flags,
        ACC_PUBLIC | ACC_STATIC | ACC_FINAL
    );
    assert!(!config.is_interface());

    let point = stub(&report, "ph/Point");
    let x = point.field("x").unwrap();
    assert_eq!(x.access_flags, ACC_PUBLIC);
    assert_eq!(x.descriptor, Type::Base(phantom_types::BaseType::Int));
    assert!(report.constraints.contains(&Constraint::isa_class(t("ph/Point"))));
    assert!(!report.constraints.contains(&Constraint::isa_class(t("ph/Config"))));
}

#[test]
fn inherited_members_land_on_the_phantom_superclass() {
    let report = repair(widget_archive()).unwrap();

    let widget = report.solution.hierarchy.get(&t("app/Widget")).unwrap();
    assert_eq!(widget.superclass, Some(t("ph/Base")));

    let base = stub(&report, "ph/Base");
    assert_eq!(base.super_class, Some(Type::OBJECT));
    let paint = base.method("paint", &desc("()V")).unwrap();
    assert_eq!(paint.access_flags, ACC_PUBLIC);
    assert_eq!(paint.body, StubBody::ThrowUnsupported);
    assert!(base.method("<init>", &desc("()V")).is_some());
}

#[test]
fn abstract_stub_bodies_make_the_class_abstract() {
    let mut config = RepairConfig::default();
    config.output.stub_bodies = StubBodies::Abstract;
    config.output.class_version = 52;
    let report = RepairSession::new(config, archive(widget_archive()))
        .unwrap()
        .run()
        .unwrap();

    let base = stub(&report, "ph/Base");
    assert_eq!(base.version, 52);
    assert_ne!(base.access_flags & ACC_ABSTRACT, 0);
    let paint = base.method("paint", &desc("()V")).unwrap();
    assert_eq!(paint.access_flags, ACC_PUBLIC | ACC_ABSTRACT);
    assert_eq!(paint.body, StubBody::Abstract);
    assert_eq!(
        base.method("<init>", &desc("()V")).unwrap().body,
        StubBody::CallSuper {
            superclass: Type::OBJECT
        }
    );
}

#[test]
fn abstract_library_methods_are_implemented_with_a_superclass_constructor() {
    let report = repair(json!({
        "library": [{
            "name": "lib/Shape",
            "methods": [
                { "name": "<init>", "descriptor": "()V" },
                { "access": ACC_PUBLIC | ACC_ABSTRACT, "name": "area", "descriptor": "()D" }
            ]
        }],
        "classes": [{
            "name": "app/Main",
            "methods": [
                {
                    "access": ACC_PUBLIC | ACC_STATIC,
                    "name": "go",
                    "descriptor": "(Lph/Circle;)V",
                    "body": { "max_locals": 1, "instructions": [
                        { "op": "load", "kind": "reference", "var": 0 },
                        { "op": "invoke", "invoke": "static", "owner": "app/Main", "name": "draw", "descriptor": "(Llib/Shape;)V" },
                        { "op": "return" }
                    ]}
                },
                { "access": ACC_PUBLIC | ACC_STATIC, "name": "draw", "descriptor": "(Llib/Shape;)V" }
            ]
        }]
    }))
    .unwrap();

    let circle = stub(&report, "ph/Circle");
    assert_eq!(circle.super_class, Some(t("lib/Shape")));
    assert!(circle.method("area", &desc("()D")).is_some());
    assert_eq!(circle.access_flags & ACC_ABSTRACT, 0);
    assert_eq!(
        circle.method("<init>", &desc("()V")).unwrap().body,
        StubBody::CallSuper {
            superclass: t("lib/Shape")
        }
    );
}

#[test]
fn nested_phantoms_are_linked_to_their_outer_class() {
    let report = repair(json!({
        "classes": [main_with("()V", 0, json!([
            { "op": "ldc", "value": { "kind": "type", "value": "ph/Outer$Inner" } },
            { "op": "pop" },
            { "op": "field", "field": "getstatic", "owner": "ph/Outer", "name": "INSTANCE", "descriptor": "Lph/Outer;" },
            { "op": "pop" },
            { "op": "return" }
        ]))]
    }))
    .unwrap();

    for name in ["ph/Outer", "ph/Outer$Inner"] {
        let class = stub(&report, name);
        assert_eq!(class.inner_classes.len(), 1, "{name}");
        let link = &class.inner_classes[0];
        assert_eq!(link.inner, t("ph/Outer$Inner"));
        assert_eq!(link.outer, t("ph/Outer"));
        assert_eq!(link.access_flags, ACC_PUBLIC | ACC_STATIC);
    }
}

#[test]
fn annotation_types_become_annotation_interfaces() {
    let report = repair(json!({
        "classes": [{ "name": "app/Main", "annotations": ["ph/Marker"] }]
    }))
    .unwrap();

    let marker = stub(&report, "ph/Marker");
    assert!(marker.is_interface());
    assert_eq!(
        marker.access_flags,
        ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT | ACC_ANNOTATION
    );
}

#[test]
fn annotation_elements_become_abstract_methods() {
    let report = repair(json!({
        "classes": [{
            "name": "app/Main",
            "annotations": [{
                "type": "ph/Marker",
                "elements": [
                    { "name": "value", "value": { "kind": "const", "type": "I" } },
                    { "name": "mode", "value": { "kind": "enum", "type": "ph/Mode", "constant": "FAST" } },
                    { "name": "nested", "value": { "kind": "annotation", "annotation": "ph/Inner" } }
                ]
            }]
        }]
    }))
    .unwrap();

    let marker = stub(&report, "ph/Marker");
    assert_eq!(
        marker.access_flags,
        ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT | ACC_ANNOTATION
    );
    assert_eq!(marker.methods.len(), 3);
    for (name, descriptor) in [("value", "()I"), ("mode", "()Lph/Mode;"), ("nested", "()Lph/Inner;")] {
        let method = marker
            .method(name, &desc(descriptor))
            .unwrap_or_else(|| panic!("missing {name}{descriptor}"));
        assert_eq!(method.access_flags, ACC_PUBLIC | ACC_ABSTRACT);
        assert_eq!(method.body, StubBody::Abstract);
    }

    let inner = stub(&report, "ph/Inner");
    assert_eq!(
        inner.access_flags,
        ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT | ACC_ANNOTATION
    );
    // Enum constants only reference their type.
    assert!(stub(&report, "ph/Mode").methods.is_empty());
}

#[test]
fn known_annotation_elements_resolve_through_supertypes() {
    let report = repair(json!({
        "library": [{
            "name": "lib/Anno",
            "interface": true,
            "interfaces": ["ph/BaseAnno"],
            "methods": [{ "access": ACC_PUBLIC | ACC_ABSTRACT, "name": "name", "descriptor": "()Ljava/lang/String;" }]
        }],
        "classes": [{
            "name": "app/Main",
            "annotations": [{
                "type": "lib/Anno",
                "elements": [
                    { "name": "name", "value": { "kind": "const", "type": "Ljava/lang/String;" } },
                    { "name": "level", "value": { "kind": "const", "type": "J" } }
                ]
            }]
        }]
    }))
    .unwrap();

    let base = stub(&report, "ph/BaseAnno");
    assert!(base.is_interface());
    assert_eq!(base.methods.len(), 1);
    let level = base.method("level", &desc("()J")).unwrap();
    assert_eq!(level.access_flags, ACC_PUBLIC | ACC_ABSTRACT);
}

#[test]
fn constraints_are_available_before_solving() {
    let mut session = session(widget_archive());
    session.discover_phantoms().unwrap();
    assert!(session.phantoms().contains(&t("ph/Base")));
    assert!(session.constraints().is_empty());

    session.extract().unwrap();
    assert!(session
        .constraints()
        .contains(&Constraint::subtype(t("app/Widget"), t("ph/Base"))));
    assert!(session.constraints().contains(&Constraint::isa_class(t("ph/Base"))));

    // Later stages reuse the earlier ones.
    let first = session.solve().unwrap();
    let second = session.solve().unwrap();
    assert_eq!(first.phantoms, second.phantoms);
}

#[test]
fn static_and_instance_calls_of_one_method_conflict() {
    let err = repair(json!({
        "classes": [main_with("()V", 0, json!([
            { "op": "invoke", "invoke": "static", "owner": "ph/Util", "name": "make", "descriptor": "()V" },
            { "op": "aconst_null" },
            { "op": "invoke", "invoke": "virtual", "owner": "ph/Util", "name": "make", "descriptor": "()V" },
            { "op": "return" }
        ]))]
    }))
    .unwrap_err();

    assert!(err.is_unsatisfiable(), "{err}");
    match &err {
        RepairError::Class { class, source } => {
            assert_eq!(class, &t("app/Main"));
            assert!(matches!(**source, RepairError::IllegalTransition { .. }), "{source}");
        }
        other => panic!("expected a class-scoped error, got {other:?}"),
    }
    assert!(err.to_string().contains("`ph/Util.make()V`"), "{err}");
}

#[test]
fn one_phantom_cannot_be_both_class_and_interface() {
    let err = repair(json!({
        "classes": [main_with("(Lph/X;)V", 1, json!([
            { "op": "load", "kind": "reference", "var": 0 },
            { "op": "invoke", "invoke": "interface", "owner": "ph/X", "name": "a", "descriptor": "()V" },
            { "op": "load", "kind": "reference", "var": 0 },
            { "op": "invoke", "invoke": "virtual", "owner": "ph/X", "name": "b", "descriptor": "()V" },
            { "op": "return" }
        ]))]
    }))
    .unwrap_err();

    assert!(err.is_unsatisfiable(), "{err}");
    assert!(err.to_string().contains("ph/X"), "{err}");
}

#[test]
fn known_types_that_do_not_fit_are_unsatisfiable() {
    let err = repair(json!({
        "library": [{ "name": "lib/A" }, { "name": "lib/B" }],
        "classes": [{
            "name": "app/Main",
            "methods": [
                {
                    "access": ACC_PUBLIC | ACC_STATIC,
                    "name": "go",
                    "descriptor": "(Llib/A;)V",
                    "body": { "max_locals": 1, "instructions": [
                        { "op": "load", "kind": "reference", "var": 0 },
                        { "op": "invoke", "invoke": "static", "owner": "app/Main", "name": "take", "descriptor": "(Llib/B;)V" },
                        { "op": "return" }
                    ]}
                },
                { "access": ACC_PUBLIC | ACC_STATIC, "name": "take", "descriptor": "(Llib/B;)V" }
            ]
        }]
    }))
    .unwrap_err();

    assert!(matches!(err, RepairError::Extract(_)), "{err:?}");
    assert!(err.is_unsatisfiable(), "{err}");
}

#[test]
fn undeclared_members_of_known_classes_are_reported() {
    let err = repair(json!({
        "classes": [
            { "name": "app/Holder", "interfaces": ["ph/I"] },
            main_with("(Lapp/Holder;)I", 1, json!([
                { "op": "load", "kind": "reference", "var": 0 },
                { "op": "field", "field": "getfield", "owner": "app/Holder", "name": "count", "descriptor": "I" },
                { "op": "return", "kind": "int" }
            ]))
        ]
    }))
    .unwrap_err();

    assert!(err.is_unsatisfiable(), "{err}");
    assert!(err.to_string().contains("app/Holder.count"), "{err}");
}

#[test]
fn reports_serialize_to_json() {
    let report = repair(widget_archive()).unwrap();
    let value = serde_json::to_value(&report).unwrap();

    let phantoms = value["phantoms"].as_array().unwrap();
    assert_eq!(phantoms.len(), 1);
    assert_eq!(phantoms[0]["internal_name"], "ph/Base");
    assert_eq!(phantoms[0]["super_class"], "java/lang/Object");
    assert!(phantoms[0]["methods"]
        .as_array()
        .unwrap()
        .iter()
        .any(|method| method["name"] == "paint" && method["descriptor"] == "()V"));
    assert!(!value["constraints"].as_array().unwrap().is_empty());
}
