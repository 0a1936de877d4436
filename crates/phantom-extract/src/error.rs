use phantom_flow::AnalyzerError;
use phantom_solver::{Constraint, SolverError};
use phantom_types::{MethodDescriptor, Type};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExtractError {
    #[error("`{from}` can never be assigned to `{to}`")]
    IllegalConversion { from: Type, to: Type },
    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[error("{class}.{method}{descriptor}{}: {source}", at(.instruction))]
    Method {
        class: Type,
        method: String,
        descriptor: MethodDescriptor,
        instruction: Option<usize>,
        #[source]
        source: Box<ExtractError>,
    },
}

fn at(instruction: &Option<usize>) -> String {
    instruction.map_or_else(String::new, |insn| format!(" at instruction {insn}"))
}

impl ExtractError {
    /// Whether the error proves that no hierarchy can make the input legal,
    /// as opposed to the input being malformed.
    #[must_use]
    pub fn is_unsatisfiable(&self) -> bool {
        match self {
            ExtractError::IllegalConversion { .. } => true,
            ExtractError::Solver(err) => !matches!(err, SolverError::Hierarchy(_)),
            ExtractError::Analyzer(_) => false,
            ExtractError::Method { source, .. } => source.is_unsatisfiable(),
        }
    }

    /// The violated constraint, with illegal conversions read as subtype
    /// constraints.
    #[must_use]
    pub fn constraint(&self) -> Option<Constraint> {
        match self {
            ExtractError::IllegalConversion { from, to } => {
                Some(Constraint::subtype(from.clone(), to.clone()))
            }
            ExtractError::Solver(SolverError::UnsatisfiableConstraint { constraint, .. }) => {
                Some(constraint.clone())
            }
            ExtractError::Method { source, .. } => source.constraint(),
            _ => None,
        }
    }

    /// Attaches the owning method. An illegal conversion becomes an
    /// unsatisfiable subtype constraint once it is known where it happened.
    pub(crate) fn in_method(
        self,
        class: &Type,
        method: &str,
        descriptor: &MethodDescriptor,
        instruction: Option<usize>,
    ) -> Self {
        let source = match self {
            ExtractError::IllegalConversion { from, to } => {
                ExtractError::Solver(SolverError::UnsatisfiableConstraint {
                    constraint: Constraint::subtype(from, to),
                    reason: "no assignment conversion exists".into(),
                })
            }
            other => other,
        };
        ExtractError::Method {
            class: class.clone(),
            method: method.to_owned(),
            descriptor: descriptor.clone(),
            instruction,
            source: Box::new(source),
        }
    }
}

pub type Result<T, E = ExtractError> = std::result::Result<T, E>;
