//! Constraint graph solver: decides a kind (class or interface), a superclass
//! and a set of super-interfaces for every phantom type so that all collected
//! subtyping obligations hold.

#![forbid(unsafe_code)]

mod constraint;
mod error;
mod graph;
mod layering;
mod multiple;
mod prune;
mod single;
mod solver;
mod strategy;
mod synth;

pub use crate::constraint::{Constraint, ConstraintSink};
pub use crate::error::{Result, SolverError};
pub use crate::graph::TypeGraph;
pub use crate::layering::LayeringSolver;
pub use crate::multiple::MultipleInheritanceSolver;
pub use crate::prune::pruned_hierarchy;
pub use crate::single::{InsertionOrder, PlacementOrder, SingleInheritanceSolver};
pub use crate::solver::{Solution, SolverOptions, TypeSolver};
pub use crate::strategy::MinClassesStrategy;
pub use crate::synth::{synthesize, validate};
