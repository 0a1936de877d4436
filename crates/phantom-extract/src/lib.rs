//! Turns method bodies into subtype constraints.
//!
//! Every reference assignment a method performs (passing arguments, storing
//! fields, returning, throwing, storing into arrays) must be legal in the
//! repaired hierarchy. Assignments whose legality depends on a phantom type
//! are handed to a [`ConstraintSink`](phantom_solver::ConstraintSink);
//! the rest are checked against the known hierarchy on the spot.

#![forbid(unsafe_code)]

mod assign;
mod error;
mod extractor;

pub use crate::error::{ExtractError, Result};
pub use crate::extractor::{ConstraintExtractor, ExtractOptions, MethodRef};
