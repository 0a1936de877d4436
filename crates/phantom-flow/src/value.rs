use std::collections::BTreeSet;
use std::fmt;

use phantom_types::{BaseType, Type};

use crate::error::{AnalyzerError, Result};

/// Abstract value of one stack slot or local variable.
///
/// A reference value is the set of exact types it may hold at a program point.
/// The set is a singleton except after a control-flow merge of unrelated
/// references; the empty set is the `null` constant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CompoundValue {
    /// Unset local, second half of a long/double local, or the merge of a
    /// primitive with something else.
    Uninitialized,
    /// Always a computational type (`int`, `long`, `float` or `double`).
    Primitive(BaseType),
    Reference(BTreeSet<Type>),
}

impl CompoundValue {
    #[must_use]
    pub fn null() -> Self {
        CompoundValue::Reference(BTreeSet::new())
    }

    /// The value produced by something statically typed `ty`.
    #[must_use]
    pub fn of(ty: &Type) -> Self {
        match ty {
            Type::Base(base) => CompoundValue::Primitive(base.stack_type()),
            Type::Null => CompoundValue::null(),
            ty => CompoundValue::Reference(BTreeSet::from([ty.clone()])),
        }
    }

    #[must_use]
    pub fn reference(types: impl IntoIterator<Item = Type>) -> Self {
        CompoundValue::Reference(types.into_iter().collect())
    }

    #[must_use]
    pub fn is_reference(&self) -> bool {
        matches!(self, CompoundValue::Reference(_))
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, CompoundValue::Reference(types) if types.is_empty())
    }

    /// Operand stack / local variable slots taken by the value.
    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            CompoundValue::Primitive(base) => base.size(),
            _ => 1,
        }
    }

    /// The concrete types the value stands for. Empty for `null` and
    /// uninitialized values.
    #[must_use]
    pub fn basic_types(&self) -> Vec<Type> {
        match self {
            CompoundValue::Uninitialized => Vec::new(),
            CompoundValue::Primitive(base) => vec![Type::Base(*base)],
            CompoundValue::Reference(types) => types.iter().cloned().collect(),
        }
    }

    /// Least upper bound of two values.
    #[must_use]
    pub fn merge(&self, other: &CompoundValue) -> CompoundValue {
        if self == other {
            return self.clone();
        }
        match (self, other) {
            (CompoundValue::Reference(left), CompoundValue::Reference(right)) => {
                if left.is_empty() || right.is_superset(left) {
                    other.clone()
                } else if right.is_empty() || left.is_superset(right) {
                    self.clone()
                } else {
                    CompoundValue::Reference(left.union(right).cloned().collect())
                }
            }
            _ => CompoundValue::Uninitialized,
        }
    }

    /// Value loaded from an array held by `self` (`aaload`).
    pub fn element(&self, insn: usize) -> Result<CompoundValue> {
        match self {
            CompoundValue::Uninitialized => Ok(CompoundValue::Uninitialized),
            CompoundValue::Primitive(base) => Err(AnalyzerError::NotAnArray {
                insn,
                ty: Type::Base(*base),
            }),
            CompoundValue::Reference(types) => {
                let mut out = CompoundValue::null();
                for ty in types {
                    let component = ty.component().ok_or_else(|| AnalyzerError::NotAnArray {
                        insn,
                        ty: ty.clone(),
                    })?;
                    out = out.merge(&CompoundValue::of(component));
                }
                Ok(out)
            }
        }
    }
}

impl fmt::Display for CompoundValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompoundValue::Uninitialized => f.write_str("uninitialized"),
            CompoundValue::Primitive(base) => f.write_str(base.name()),
            CompoundValue::Reference(types) if types.is_empty() => f.write_str("null"),
            CompoundValue::Reference(types) if types.len() == 1 => {
                types.iter().try_for_each(|ty| write!(f, "{ty}"))
            }
            CompoundValue::Reference(types) => {
                f.write_str("{")?;
                for (idx, ty) in types.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{ty}")?;
                }
                f.write_str("}")
            }
        }
    }
}
