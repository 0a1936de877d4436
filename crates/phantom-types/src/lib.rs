//! JVM type references, descriptors, and the assignment-conversion lattice.

#![forbid(unsafe_code)]

mod conversion;
mod descriptor;
mod error;
pub mod internal_name;
mod ty;

pub use crate::conversion::{classify, Conversion, ConversionCache};
pub use crate::descriptor::{
    parse_field_descriptor, parse_method_descriptor, MethodDescriptor, ReturnType,
};
pub use crate::error::{Error, Result};
pub use crate::ty::{BaseType, Type};
