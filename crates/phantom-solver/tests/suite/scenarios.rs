use phantom_hierarchy::ClassHierarchy;
use phantom_solver::{Constraint, SolverOptions, TypeSolver, ConstraintSink};
use phantom_types::Type;
use pretty_assertions::assert_eq;

use super::{assert_preserves, assert_sound, solver_with, t};

fn library_interfaces() -> ClassHierarchy {
    let mut h = ClassHierarchy::new();
    h.add_interface(t("lib/IfaceA"), []).unwrap();
    h.add_interface(t("lib/IfaceB"), []).unwrap();
    h
}

#[test]
fn lone_phantom_class_goes_under_object() {
    let solver = solver_with(
        ClassHierarchy::new(),
        [
            Constraint::subtype(t("ph/Phantom1"), Type::OBJECT),
            Constraint::isa_class(t("ph/Phantom1")),
        ],
    );
    let solution = solver.solve().unwrap();

    let info = solution.hierarchy.get(&t("ph/Phantom1")).unwrap();
    assert!(!info.interface);
    assert_eq!(info.superclass, Some(Type::OBJECT));
    assert!(info.interfaces.is_empty());
    assert_eq!(solution.phantoms, vec![t("ph/Phantom1")]);
    assert_eq!(solution.attempts, 1);
}

#[test]
fn unmarked_phantom_becomes_an_interface_over_both_libraries() {
    // Two interface supertypes alone do not force a class: with no IsaClass
    // the solver keeps the number of phantom classes minimal, so the phantom
    // comes out as an interface. The class outcome needs an explicit IsaClass,
    // see `phantom_class_implements_both_library_interfaces`.
    let solver = solver_with(
        library_interfaces(),
        [
            Constraint::subtype(t("ph/Phantom1"), t("lib/IfaceA")),
            Constraint::subtype(t("ph/Phantom1"), t("lib/IfaceB")),
        ],
    );
    let solution = solver.solve().unwrap();

    let info = solution.hierarchy.get(&t("ph/Phantom1")).unwrap();
    assert!(info.interface);
    assert_eq!(info.superclass, Some(Type::OBJECT));
    assert_eq!(
        info.interfaces.iter().cloned().collect::<Vec<_>>(),
        vec![t("lib/IfaceA"), t("lib/IfaceB")]
    );
    assert_sound(&solver, &solution);
    assert_preserves(&library_interfaces(), &solution);
}

#[test]
fn phantom_class_implements_both_library_interfaces() {
    let solver = solver_with(
        library_interfaces(),
        [
            Constraint::subtype(t("ph/Phantom1"), t("lib/IfaceA")),
            Constraint::subtype(t("ph/Phantom1"), t("lib/IfaceB")),
            Constraint::isa_class(t("ph/Phantom1")),
        ],
    );
    let solution = solver.solve().unwrap();

    let info = solution.hierarchy.get(&t("ph/Phantom1")).unwrap();
    assert!(!info.interface);
    assert_eq!(info.superclass, Some(Type::OBJECT));
    assert_eq!(info.interfaces.len(), 2);
    assert_sound(&solver, &solution);
}

#[test]
fn known_class_gains_an_interface_through_its_phantom_superclass() {
    let mut known = ClassHierarchy::new();
    known.add_interface(t("lib/Runnable"), []).unwrap();
    known.add_class(t("lib/Base"), Type::OBJECT, []).unwrap();
    known
        .add_class(t("app/Impl"), t("ph/Parent"), [t("lib/Runnable")])
        .unwrap();

    let solver = solver_with(
        known.clone(),
        [
            Constraint::subtype(t("app/Impl"), t("ph/Iface")),
            Constraint::isa_interface(t("ph/Iface")),
            Constraint::subtype(t("ph/Parent"), t("lib/Base")),
            Constraint::subtype(t("ph/Other"), t("ph/Parent")),
        ],
    );
    let solution = solver.solve().unwrap();
    let h = &solution.hierarchy;

    assert_eq!(h.superclass(&t("ph/Parent")).unwrap(), Some(&t("lib/Base")));
    assert_eq!(
        h.interfaces(&t("ph/Parent")).unwrap().iter().collect::<Vec<_>>(),
        vec![&t("ph/Iface")]
    );
    assert!(h.is_interface(&t("ph/Iface")).unwrap());
    assert_eq!(h.superclass(&t("ph/Other")).unwrap(), Some(&t("ph/Parent")));
    assert_eq!(
        solution.phantoms,
        vec![t("ph/Iface"), t("ph/Parent"), t("ph/Other")]
    );
    assert_sound(&solver, &solution);
    assert_preserves(&known, &solution);
}

#[test]
fn known_supertypes_satisfy_constraints_without_new_edges() {
    let mut known = ClassHierarchy::new();
    known.add_interface(t("lib/I"), []).unwrap();
    known.add_interface(t("lib/J"), [t("lib/I")]).unwrap();
    known.add_class(t("lib/A"), Type::OBJECT, [t("lib/J")]).unwrap();

    let solver = solver_with(
        known.clone(),
        [
            Constraint::subtype(t("lib/A"), t("lib/I")),
            Constraint::subtype(t("ph/P"), t("lib/A")),
        ],
    );
    let solution = solver.solve().unwrap();
    assert_eq!(solution.hierarchy.superclass(&t("ph/P")).unwrap(), Some(&t("lib/A")));
    assert_preserves(&known, &solution);
    assert_sound(&solver, &solution);
}

#[test]
fn solving_does_not_consume_the_solver() {
    let mut solver = TypeSolver::new(library_interfaces(), SolverOptions::default());
    solver
        .add_constraint(Constraint::subtype(t("ph/P"), t("lib/IfaceA")))
        .unwrap();
    let first = solver.solve().unwrap();
    let second = solver.solve().unwrap();
    assert_eq!(*first.hierarchy, *second.hierarchy);
    assert_eq!(solver.constraints().len(), 1);
    assert_eq!(solver.hierarchy(), &library_interfaces());

    solver
        .add_constraint(Constraint::subtype(t("ph/P"), t("lib/IfaceB")))
        .unwrap();
    let third = solver.solve().unwrap();
    assert_eq!(third.hierarchy.interfaces(&t("ph/P")).unwrap().len(), 2);
}

#[test]
fn pruning_does_not_change_phantoms() {
    let mut known = library_interfaces();
    known.add_class(t("lib/Unused"), Type::OBJECT, []).unwrap();
    let constraints = [
        Constraint::subtype(t("ph/P"), t("lib/IfaceA")),
        Constraint::isa_class(t("ph/Q")),
        Constraint::subtype(t("ph/Q"), t("ph/P")),
    ];

    let pruned = solver_with(known.clone(), constraints.clone()).solve().unwrap();
    let mut full = TypeSolver::new(
        known,
        SolverOptions {
            prune_hierarchy: false,
            ..SolverOptions::default()
        },
    );
    for constraint in constraints {
        full.add_constraint(constraint).unwrap();
    }
    let full = full.solve().unwrap();

    assert_eq!(pruned.phantoms, full.phantoms);
    assert!(!pruned.hierarchy.contains(&t("lib/Unused")));
    assert!(full.hierarchy.contains(&t("lib/Unused")));
    for phantom in &pruned.phantoms {
        assert_eq!(pruned.hierarchy.get(phantom), full.hierarchy.get(phantom));
    }
}

#[test]
fn solution_serializes_with_internal_names() {
    let solver = solver_with(
        ClassHierarchy::new(),
        [Constraint::isa_class(t("ph/P"))],
    );
    let solution = solver.solve().unwrap();
    let json = serde_json::to_value(&solution).unwrap();
    assert_eq!(json["phantoms"], serde_json::json!(["ph/P"]));
    assert_eq!(json["attempts"], serde_json::json!(1));
}
