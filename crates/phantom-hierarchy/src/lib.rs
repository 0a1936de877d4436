//! Class hierarchy model: an append-only registry of known types plus
//! read-only closures that tolerate missing (phantom) supertypes.

#![forbid(unsafe_code)]

mod error;
mod hierarchy;
mod importer;
mod snapshot;

pub use crate::error::{HierarchyError, Kind, Result};
pub use crate::hierarchy::{ClassHierarchy, TypeInfo, UnmodifiableHierarchy};
pub use crate::importer::Importer;
pub use crate::snapshot::{Closure, Snapshot, Subtyping};
