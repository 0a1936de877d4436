use std::collections::HashMap;

use serde::Serialize;

use crate::ty::{BaseType, Type};

/// Classification of an assignment from one type to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Conversion {
    Identity,
    WideningPrimitive,
    NarrowingPrimitive,
    /// Reference widening. Whether it actually holds is up to the class
    /// hierarchy; see the extractor.
    WideningReference,
    Null,
    Illegal,
}

impl Conversion {
    #[must_use]
    pub const fn is_legal(self) -> bool {
        !matches!(self, Conversion::Illegal)
    }
}

/// Classifies the assignment `from -> to`.
#[must_use]
pub fn classify(from: &Type, to: &Type) -> Conversion {
    if from == to {
        return Conversion::Identity;
    }

    match (from, to) {
        (Type::Base(from), Type::Base(to)) => classify_primitive(*from, *to),
        (Type::Null, Type::Base(_)) | (_, Type::Null) => Conversion::Illegal,
        (Type::Null, _) => Conversion::Null,
        (Type::Base(_), _) | (_, Type::Base(_)) => Conversion::Illegal,
        (Type::Array(from), Type::Array(to)) => match classify(from, to) {
            // Primitive arrays are only assignable to themselves.
            Conversion::Identity | Conversion::WideningReference => Conversion::WideningReference,
            _ => Conversion::Illegal,
        },
        (Type::Array(_), to) => {
            if is_array_supertype(to) {
                Conversion::WideningReference
            } else {
                Conversion::Illegal
            }
        }
        (Type::Object(_), Type::Array(_)) => Conversion::Illegal,
        (Type::Object(_), Type::Object(_)) => Conversion::WideningReference,
    }
}

/// The only non-array supertypes of every array type.
fn is_array_supertype(ty: &Type) -> bool {
    *ty == Type::OBJECT || *ty == Type::CLONEABLE || *ty == Type::SERIALIZABLE
}

fn classify_primitive(from: BaseType, to: BaseType) -> Conversion {
    use BaseType::*;

    if matches!(
        (from, to),
        (Byte, Short | Int | Long | Float | Double)
            | (Short, Int | Long | Float | Double)
            | (Char, Int | Long | Float | Double)
            | (Int, Long | Float | Double)
            | (Long, Float | Double)
            | (Float, Double)
    ) {
        return Conversion::WideningPrimitive;
    }

    // Stores into sub-int slots: the bytecode already carries the narrowing.
    if matches!((from, to), (Int, Char | Short | Byte | Boolean)) {
        return Conversion::NarrowingPrimitive;
    }

    Conversion::Illegal
}

/// Memoizing front-end for [`classify`].
#[derive(Debug, Default)]
pub struct ConversionCache {
    memo: HashMap<(Type, Type), Conversion>,
}

impl ConversionCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn classify(&mut self, from: &Type, to: &Type) -> Conversion {
        if let Some(conv) = self.memo.get(&(from.clone(), to.clone())) {
            return *conv;
        }
        let conv = classify(from, to);
        self.memo.insert((from.clone(), to.clone()), conv);
        conv
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.memo.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.memo.is_empty()
    }
}
