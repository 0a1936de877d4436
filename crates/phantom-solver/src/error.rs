use phantom_hierarchy::HierarchyError;
use phantom_types::Type;

use crate::constraint::Constraint;

fn list(constraints: &[Constraint]) -> String {
    constraints
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn names(types: &[Type]) -> String {
    types
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SolverError {
    #[error("unsatisfiable constraint `{constraint}`: {reason}")]
    UnsatisfiableConstraint {
        constraint: Constraint,
        reason: String,
    },
    #[error("`{ty}` is used both as a class and as an interface")]
    ConflictingKind { ty: Type },
    #[error("constraint graph has a cycle through: {}", list(.remaining))]
    GraphCycle { remaining: Vec<Constraint> },
    #[error(
        "cannot place `{subtype}` under `{parent}`: its superclass is `{declared}` \
         (no consistent placement after {attempts} attempts)"
    )]
    CrossoverConflict {
        subtype: Type,
        parent: Type,
        declared: Type,
        attempts: usize,
    },
    #[error("solution changes the declared supertypes of `{ty}`: {detail}")]
    InvariantViolation { ty: Type, detail: String },
    #[error("solution leaves types unresolved: {}", names(.missing))]
    IncompleteSolution { missing: Vec<Type> },
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),
}

pub type Result<T, E = SolverError> = std::result::Result<T, E>;
