use phantom_extract::ExtractError;
use phantom_hierarchy::HierarchyError;
use phantom_solver::SolverError;
use phantom_types::Type;

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum RepairError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid archive model: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),
    #[error(transparent)]
    Descriptor(#[from] phantom_types::Error),
    #[error("`{owner}.{member}` cannot be used by {event} after it was used as {from}")]
    IllegalTransition {
        owner: Type,
        member: String,
        from: String,
        event: String,
    },
    #[error("field `{owner}.{member}` is used both as `{first}` and as `{second}`")]
    ConflictingDescriptor {
        owner: Type,
        member: String,
        first: Type,
        second: Type,
    },
    #[error("`{owner}.{name}{descriptor}` is not declared by `{owner}` or any of its supertypes")]
    MemberLookup {
        owner: Type,
        name: String,
        descriptor: String,
    },
    #[error("in class `{class}`: {source}")]
    Class {
        class: Type,
        #[source]
        source: Box<RepairError>,
    },
}

impl RepairError {
    /// Whether the archive itself is contradictory (no hierarchy of phantom
    /// types can make it valid), as opposed to malformed or unreadable input.
    #[must_use]
    pub fn is_unsatisfiable(&self) -> bool {
        match self {
            RepairError::Extract(err) => err.is_unsatisfiable(),
            RepairError::Solver(err) => !matches!(err, SolverError::Hierarchy(_)),
            RepairError::IllegalTransition { .. }
            | RepairError::ConflictingDescriptor { .. }
            | RepairError::MemberLookup { .. } => true,
            RepairError::Class { source, .. } => source.is_unsatisfiable(),
            RepairError::Config(_)
            | RepairError::Io { .. }
            | RepairError::Json(_)
            | RepairError::Hierarchy(_)
            | RepairError::Descriptor(_) => false,
        }
    }

    pub(crate) fn in_class(self, class: &Type) -> Self {
        match self {
            RepairError::Class { .. } => self,
            other => RepairError::Class {
                class: class.clone(),
                source: Box::new(other),
            },
        }
    }
}

pub type Result<T, E = RepairError> = std::result::Result<T, E>;
