//! Repairs archives that reference missing ("phantom") classes.
//!
//! A [`RepairSession`] reads an [`ArchiveModel`], finds every phantom type and
//! every member used on one, collects the subtyping obligations of all method
//! bodies, solves them, and describes one generated class per phantom type
//! ([`ClassStub`]) so that the archive verifies against the completed
//! hierarchy.

#![forbid(unsafe_code)]

mod access;
pub mod config;
mod error;
pub mod flags;
mod members;
mod model;
mod pending;
mod phantoms;
mod session;

pub use crate::access::{AccessMachines, ClassEvent, FieldState, MethodEvent, MethodState};
pub use crate::config::{init_tracing, json_schema, ConfigError, RepairConfig};
pub use crate::error::{RepairError, Result};
pub use crate::members::{ClassMembers, DeclaredField, DeclaredMethod, Lookup};
pub use crate::model::{
    AnnotationElement, AnnotationModel, ArchiveModel, ClassModel, ElementValue, FieldModel,
    LibraryType, MethodModel,
};
pub use crate::pending::pending_methods;
pub use crate::phantoms::{
    ClassStub, FieldStub, InnerClassStub, MethodStub, Patch, PhantomClass, Phantoms, StubBody,
};
pub use crate::session::{RepairReport, RepairSession};
