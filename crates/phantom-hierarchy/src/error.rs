use std::fmt;

use phantom_types::Type;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Class,
    Interface,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Class => f.write_str("a class"),
            Kind::Interface => f.write_str("an interface"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HierarchyError {
    #[error("unknown type `{ty}`")]
    UnknownType { ty: Type },
    #[error("type `{ty}` is already part of the hierarchy")]
    DuplicateType { ty: Type },
    #[error("`{ty}` must be {expected}")]
    BadKind { ty: Type, expected: Kind },
}

pub type Result<T, E = HierarchyError> = std::result::Result<T, E>;
