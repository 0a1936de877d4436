mod failures;
mod properties;
mod scenarios;

use phantom_hierarchy::{ClassHierarchy, Subtyping};
use phantom_solver::{Constraint, ConstraintSink, Solution, SolverOptions, TypeSolver};
use phantom_types::Type;

pub(crate) fn t(name: &str) -> Type {
    Type::object(name)
}

pub(crate) fn solver_with(
    hierarchy: ClassHierarchy,
    constraints: impl IntoIterator<Item = Constraint>,
) -> TypeSolver {
    let mut solver = TypeSolver::new(hierarchy, SolverOptions::default());
    for constraint in constraints {
        solver.add_constraint(constraint).unwrap();
    }
    solver
}

/// Every subtype constraint holds in the solved hierarchy.
pub(crate) fn assert_sound(solver: &TypeSolver, solution: &Solution) {
    let snapshot = solution.hierarchy.snapshot();
    for constraint in solver.constraints() {
        if let Constraint::Subtype { sub, sup } = constraint {
            assert_eq!(
                snapshot.is_subtype_of(sub, sup),
                Subtyping::Holds,
                "{constraint} does not hold"
            );
        }
    }
}

/// Every type of `known` keeps its declarations in the solution.
pub(crate) fn assert_preserves(known: &ClassHierarchy, solution: &Solution) {
    for (ty, info) in known.iter() {
        if let Some(solved) = solution.hierarchy.get(ty) {
            assert_eq!(solved, info, "declarations of {ty} changed");
        }
    }
}
