use phantom_hierarchy::ClassHierarchy;
use phantom_solver::{Constraint, ConstraintSink, SolverError, SolverOptions, TypeSolver};
use phantom_types::Type;
use pretty_assertions::assert_eq;

use super::{solver_with, t};

#[test]
fn class_and_interface_marks_conflict_immediately() {
    let mut solver = TypeSolver::new(ClassHierarchy::new(), SolverOptions::default());
    solver
        .add_constraint(Constraint::isa_class(t("ph/Phantom1")))
        .unwrap();
    let err = solver
        .add_constraint(Constraint::isa_interface(t("ph/Phantom1")))
        .unwrap_err();
    assert_eq!(err, SolverError::ConflictingKind { ty: t("ph/Phantom1") });
}

#[test]
fn known_interface_used_as_class_conflicts_at_solve_time() {
    let mut known = ClassHierarchy::new();
    known.add_interface(t("lib/I"), []).unwrap();
    let solver = solver_with(known, [Constraint::isa_class(t("lib/I"))]);
    assert_eq!(
        solver.solve().unwrap_err(),
        SolverError::ConflictingKind { ty: t("lib/I") }
    );
}

#[test]
fn phantom_three_cycle_is_a_graph_cycle() {
    let solver = solver_with(
        ClassHierarchy::new(),
        [
            Constraint::subtype(t("ph/P1"), t("ph/P2")),
            Constraint::subtype(t("ph/P2"), t("ph/P3")),
            Constraint::subtype(t("ph/P3"), t("ph/P1")),
        ],
    );
    let err = solver.solve().unwrap_err();
    let SolverError::GraphCycle { remaining } = err else {
        panic!("expected a cycle, got {err}");
    };
    assert_eq!(remaining.len(), 3);
}

#[test]
fn class_cycle_is_a_graph_cycle() {
    let solver = solver_with(
        ClassHierarchy::new(),
        [
            Constraint::isa_class(t("ph/P1")),
            Constraint::subtype(t("ph/P1"), t("ph/P2")),
            Constraint::subtype(t("ph/P2"), t("ph/P1")),
        ],
    );
    assert!(matches!(
        solver.solve(),
        Err(SolverError::GraphCycle { .. })
    ));
}

#[test]
fn known_class_cannot_extend_an_unrelated_phantom_class() {
    let mut known = ClassHierarchy::new();
    known.add_class(t("lib/A"), Type::OBJECT, []).unwrap();
    let solver = solver_with(
        known,
        [
            Constraint::isa_class(t("ph/P")),
            Constraint::subtype(t("lib/A"), t("ph/P")),
        ],
    );
    let err = solver.solve().unwrap_err();
    assert!(
        matches!(&err, SolverError::UnsatisfiableConstraint { constraint, .. }
            if *constraint == Constraint::subtype(t("lib/A"), t("ph/P"))),
        "{err}"
    );
}

#[test]
fn fully_known_type_cannot_gain_an_interface() {
    let mut known = ClassHierarchy::new();
    known.add_interface(t("lib/I"), []).unwrap();
    known.add_class(t("lib/A"), Type::OBJECT, []).unwrap();
    let solver = solver_with(known, [Constraint::subtype(t("lib/A"), t("lib/I"))]);
    assert!(matches!(
        solver.solve(),
        Err(SolverError::UnsatisfiableConstraint { .. })
    ));
}

#[test]
fn crossover_is_reported_after_the_retry_cap() {
    let mut known = ClassHierarchy::new();
    known.add_class(t("lib/A"), Type::OBJECT, []).unwrap();
    known.add_class(t("lib/B"), Type::OBJECT, []).unwrap();

    let mut solver = TypeSolver::new(
        known,
        SolverOptions {
            max_placement_attempts: 5,
            ..SolverOptions::default()
        },
    );
    solver
        .add_constraint(Constraint::subtype(t("ph/P"), t("lib/A")))
        .unwrap();
    solver
        .add_constraint(Constraint::subtype(t("ph/P"), t("lib/B")))
        .unwrap();

    match solver.solve().unwrap_err() {
        SolverError::CrossoverConflict {
            subtype,
            parent,
            declared,
            attempts,
        } => {
            assert_eq!(subtype, t("lib/B"));
            assert_eq!(parent, t("lib/A"));
            assert_eq!(declared, Type::OBJECT);
            assert_eq!(attempts, 5);
        }
        other => panic!("unexpected error: {other}"),
    }
}
