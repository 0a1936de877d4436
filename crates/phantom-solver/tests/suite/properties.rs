use phantom_hierarchy::ClassHierarchy;
use phantom_solver::{Constraint, ConstraintSink, SolverError, SolverOptions, TypeSolver};
use proptest::prelude::*;

use super::{assert_sound, t};

fn phantom(i: usize) -> phantom_types::Type {
    t(&format!("ph/P{i}"))
}

/// Edges `i -> j` with `i < j` over `n` phantoms, so the graph is acyclic.
fn dag(max: usize) -> impl Strategy<Value = (usize, Vec<(usize, usize)>)> {
    (2..max).prop_flat_map(|n| {
        let edge = (0..n - 1).prop_flat_map(move |i| (Just(i), i + 1..n));
        (Just(n), prop::collection::vec(edge, 0..n * 2))
    })
}

/// A chain length with an interface mark at `i` below a class mark at `j`.
fn chain_marks(max: usize) -> impl Strategy<Value = (usize, usize, usize)> {
    (2..max).prop_flat_map(|len| {
        (0..len - 1).prop_flat_map(move |i| (Just(len), Just(i), i + 1..len))
    })
}

proptest! {
    #[test]
    fn acyclic_phantom_graphs_solve_soundly((n, edges) in dag(8)) {
        let mut solver = TypeSolver::new(ClassHierarchy::new(), SolverOptions::default());
        for i in 0..n {
            solver.add_constraint(Constraint::subtype(phantom(i), phantom_types::Type::OBJECT)).unwrap();
        }
        for (i, j) in edges {
            solver.add_constraint(Constraint::subtype(phantom(i), phantom(j))).unwrap();
        }
        let solution = solver.solve().unwrap();
        prop_assert_eq!(solution.phantoms.len(), n);
        prop_assert!(solution.hierarchy.unknown_types().is_empty());
        assert_sound(&solver, &solution);
    }

    #[test]
    fn interface_below_class_on_a_chain_conflicts((len, i, j) in chain_marks(8)) {
        let mut solver = TypeSolver::new(ClassHierarchy::new(), SolverOptions::default());
        for k in 0..len - 1 {
            solver.add_constraint(Constraint::subtype(phantom(k), phantom(k + 1))).unwrap();
        }
        solver.add_constraint(Constraint::isa_interface(phantom(i))).unwrap();
        solver.add_constraint(Constraint::isa_class(phantom(j))).unwrap();

        let err = solver.solve().unwrap_err();
        prop_assert!(matches!(err, SolverError::ConflictingKind { .. }), "{}", err);
    }

    #[test]
    fn the_same_seed_gives_the_same_solution(seed in any::<u64>(), (n, edges) in dag(6)) {
        let build = || {
            let mut solver = TypeSolver::new(
                ClassHierarchy::new(),
                SolverOptions { seed, ..SolverOptions::default() },
            );
            for i in 0..n {
                solver.add_constraint(Constraint::isa_class(phantom(i))).unwrap();
            }
            for (i, j) in &edges {
                solver.add_constraint(Constraint::subtype(phantom(*i), phantom(*j))).unwrap();
            }
            solver
        };
        let first = build().solve().unwrap();
        let second = build().solve().unwrap();
        prop_assert_eq!(&*first.hierarchy, &*second.hierarchy);
        assert_sound(&build(), &first);
    }
}
