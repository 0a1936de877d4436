use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smol_str::SmolStr;

use crate::descriptor::parse_field_descriptor;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseType {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl BaseType {
    pub const ALL: [BaseType; 8] = [
        BaseType::Boolean,
        BaseType::Byte,
        BaseType::Char,
        BaseType::Short,
        BaseType::Int,
        BaseType::Long,
        BaseType::Float,
        BaseType::Double,
    ];

    #[must_use]
    pub const fn descriptor(self) -> char {
        match self {
            BaseType::Boolean => 'Z',
            BaseType::Byte => 'B',
            BaseType::Char => 'C',
            BaseType::Short => 'S',
            BaseType::Int => 'I',
            BaseType::Long => 'J',
            BaseType::Float => 'F',
            BaseType::Double => 'D',
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            BaseType::Boolean => "boolean",
            BaseType::Byte => "byte",
            BaseType::Char => "char",
            BaseType::Short => "short",
            BaseType::Int => "int",
            BaseType::Long => "long",
            BaseType::Float => "float",
            BaseType::Double => "double",
        }
    }

    /// The computational type used on the operand stack: everything narrower
    /// than `int` is widened to `int`.
    #[must_use]
    pub const fn stack_type(self) -> BaseType {
        match self {
            BaseType::Boolean | BaseType::Byte | BaseType::Char | BaseType::Short => BaseType::Int,
            other => other,
        }
    }

    /// Number of local-variable / operand-stack slots.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            BaseType::Long | BaseType::Double => 2,
            _ => 1,
        }
    }
}

/// A JVM type reference.
///
/// Object types carry their internal (slash-separated) name. Arrays are
/// represented by their component type, so `[[I` is
/// `Array(Array(Base(Int)))`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Type {
    Base(BaseType),
    Object(SmolStr),
    Array(Box<Type>),
    /// Type of the `null` literal. Only ever the source of a conversion.
    Null,
}

impl Type {
    pub const OBJECT: Type = Type::Object(SmolStr::new_inline("java/lang/Object"));
    pub const STRING: Type = Type::Object(SmolStr::new_inline("java/lang/String"));
    pub const CLASS: Type = Type::Object(SmolStr::new_inline("java/lang/Class"));
    pub const THROWABLE: Type = Type::Object(SmolStr::new_inline("java/lang/Throwable"));
    pub const CLONEABLE: Type = Type::Object(SmolStr::new_inline("java/lang/Cloneable"));
    pub const SERIALIZABLE: Type = Type::Object(SmolStr::new_inline("java/io/Serializable"));
    pub const METHOD_TYPE: Type =
        Type::Object(SmolStr::new_static("java/lang/invoke/MethodType"));
    pub const METHOD_HANDLE: Type =
        Type::Object(SmolStr::new_static("java/lang/invoke/MethodHandle"));

    #[must_use]
    pub fn object(internal_name: impl Into<SmolStr>) -> Type {
        Type::Object(internal_name.into())
    }

    #[must_use]
    pub fn array_of(component: Type) -> Type {
        Type::Array(Box::new(component))
    }

    /// Builds an array type with `dimensions` levels around `element`.
    #[must_use]
    pub fn array(element: Type, dimensions: usize) -> Type {
        (0..dimensions).fold(element, |ty, _| Type::array_of(ty))
    }

    /// Parses a name as it appears in `CONSTANT_Class` entries: either an
    /// internal object name (`java/lang/String`) or an array descriptor
    /// (`[Ljava/lang/String;`).
    pub fn from_internal_name(name: &str) -> Result<Type> {
        if name.is_empty() || (name.contains(';') && !name.starts_with('[')) {
            return Err(Error::InvalidInternalName(name.to_string()));
        }
        if name.starts_with('[') {
            return parse_field_descriptor(name);
        }
        Ok(Type::object(name))
    }

    #[must_use]
    pub fn is_reference(&self) -> bool {
        !matches!(self, Type::Base(_))
    }

    #[must_use]
    pub fn is_primitive(&self) -> bool {
        matches!(self, Type::Base(_))
    }

    #[must_use]
    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array(_))
    }

    #[must_use]
    pub fn is_object(&self) -> bool {
        matches!(self, Type::Object(_))
    }

    /// Component type of an array (one dimension stripped).
    #[must_use]
    pub fn component(&self) -> Option<&Type> {
        match self {
            Type::Array(component) => Some(component),
            _ => None,
        }
    }

    /// Innermost element type of an array, or the type itself.
    #[must_use]
    pub fn element(&self) -> &Type {
        let mut ty = self;
        while let Type::Array(component) = ty {
            ty = component;
        }
        ty
    }

    #[must_use]
    pub fn dimensions(&self) -> usize {
        let mut dims = 0;
        let mut ty = self;
        while let Type::Array(component) = ty {
            dims += 1;
            ty = component;
        }
        dims
    }

    /// Internal name of an object type.
    #[must_use]
    pub fn internal_name(&self) -> Option<&str> {
        match self {
            Type::Object(name) => Some(name.as_str()),
            _ => None,
        }
    }

    /// Name used in `CONSTANT_Class` entries: the internal name for objects,
    /// the descriptor for arrays.
    #[must_use]
    pub fn class_name(&self) -> String {
        match self {
            Type::Object(name) => name.to_string(),
            other => other.descriptor(),
        }
    }

    #[must_use]
    pub fn descriptor(&self) -> String {
        let mut out = String::new();
        self.write_descriptor(&mut out);
        out
    }

    pub(crate) fn write_descriptor(&self, out: &mut String) {
        match self {
            Type::Base(base) => out.push(base.descriptor()),
            Type::Object(name) => {
                out.push('L');
                out.push_str(name);
                out.push(';');
            }
            Type::Array(component) => {
                out.push('[');
                component.write_descriptor(out);
            }
            // Not expressible in class files; keep a readable marker.
            Type::Null => out.push_str("null"),
        }
    }

    /// Number of local-variable / operand-stack slots.
    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            Type::Base(base) => base.size(),
            _ => 1,
        }
    }
}

impl From<BaseType> for Type {
    fn from(base: BaseType) -> Self {
        Type::Base(base)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Base(base) => f.write_str(base.name()),
            Type::Object(name) => f.write_str(name),
            Type::Array(component) => write!(f, "{component}[]"),
            Type::Null => f.write_str("null"),
        }
    }
}

impl Serialize for Type {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.descriptor())
    }
}

impl<'de> Deserialize<'de> for Type {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        if text == "null" {
            return Ok(Type::Null);
        }
        parse_field_descriptor(&text).map_err(serde::de::Error::custom)
    }
}
