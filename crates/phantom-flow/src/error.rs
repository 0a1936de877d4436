use phantom_types::Type;

use crate::insn::LabelId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalyzerError {
    #[error("instruction {insn}: operand stack underflow")]
    StackUnderflow { insn: usize },
    #[error("instruction {insn}: operand stack exceeds max_stack {max}")]
    StackOverflow { insn: usize, max: usize },
    #[error("instruction {insn}: local {index} out of range (max_locals {max_locals})")]
    BadLocal {
        insn: usize,
        index: usize,
        max_locals: usize,
    },
    #[error("reference to undefined label {label}")]
    UnknownLabel { label: LabelId },
    #[error("label {label} is defined more than once")]
    DuplicateLabel { label: LabelId },
    #[error("instruction {insn}: incompatible stack heights {expected} and {found} at merge")]
    StackHeightMismatch {
        insn: usize,
        expected: usize,
        found: usize,
    },
    #[error("instruction {insn}: execution falls off the end of the code")]
    FallsOffEnd { insn: usize },
    #[error("instruction {insn}: expected an array, found `{ty}`")]
    NotAnArray { insn: usize, ty: Type },
    #[error("instruction {insn}: {detail}")]
    MalformedOperand { insn: usize, detail: String },
}

pub type Result<T, E = AnalyzerError> = std::result::Result<T, E>;
