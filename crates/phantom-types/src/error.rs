#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),
    #[error("invalid internal name: {0:?}")]
    InvalidInternalName(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
