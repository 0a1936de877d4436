//! Method-body IR and the abstract interpreter that computes, for every
//! instruction, the set of types each stack slot and local may hold.

#![forbid(unsafe_code)]

mod error;
mod frame;
mod insn;
mod interp;
mod value;

pub use crate::error::{AnalyzerError, Result};
pub use crate::frame::Frame;
pub use crate::insn::{
    ArithOp, ArrayKind, Constant, FieldOp, Insn, InvokeOp, JumpOp, LabelId, LocalVariable,
    MethodBody, NumKind, TryCatchBlock, ValueKind,
};
pub use crate::interp::{analyze, Analysis, MethodSignature};
pub use crate::value::CompoundValue;
