use std::fmt;

use phantom_types::Type;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A single fact about the type hierarchy that the solution must honor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Constraint {
    Subtype {
        #[serde(with = "phantom_types::internal_name")]
        sub: Type,
        #[serde(rename = "super", with = "phantom_types::internal_name")]
        sup: Type,
    },
    IsaClass {
        #[serde(with = "phantom_types::internal_name")]
        ty: Type,
    },
    IsaInterface {
        #[serde(with = "phantom_types::internal_name")]
        ty: Type,
    },
}

impl Constraint {
    #[must_use]
    pub fn subtype(sub: Type, sup: Type) -> Self {
        Constraint::Subtype { sub, sup }
    }

    #[must_use]
    pub fn isa_class(ty: Type) -> Self {
        Constraint::IsaClass { ty }
    }

    #[must_use]
    pub fn isa_interface(ty: Type) -> Self {
        Constraint::IsaInterface { ty }
    }

    /// Types the constraint mentions.
    pub fn types(&self) -> impl Iterator<Item = &Type> + '_ {
        let (first, second) = match self {
            Constraint::Subtype { sub, sup } => (sub, Some(sup)),
            Constraint::IsaClass { ty } | Constraint::IsaInterface { ty } => (ty, None),
        };
        std::iter::once(first).chain(second)
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Subtype { sub, sup } => write!(f, "{sub} <: {sup}"),
            Constraint::IsaClass { ty } => write!(f, "{ty} is a class"),
            Constraint::IsaInterface { ty } => write!(f, "{ty} is an interface"),
        }
    }
}

/// Receiver of constraints as the extractor discovers them.
pub trait ConstraintSink {
    fn add_constraint(&mut self, constraint: Constraint) -> Result<()>;
}

impl<S: ConstraintSink + ?Sized> ConstraintSink for &mut S {
    fn add_constraint(&mut self, constraint: Constraint) -> Result<()> {
        (**self).add_constraint(constraint)
    }
}

impl ConstraintSink for Vec<Constraint> {
    fn add_constraint(&mut self, constraint: Constraint) -> Result<()> {
        self.push(constraint);
        Ok(())
    }
}

impl ConstraintSink for indexmap::IndexSet<Constraint> {
    fn add_constraint(&mut self, constraint: Constraint) -> Result<()> {
        self.insert(constraint);
        Ok(())
    }
}
