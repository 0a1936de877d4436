use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};
use crate::ty::{BaseType, Type};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReturnType {
    Void,
    Type(Type),
}

impl ReturnType {
    #[must_use]
    pub fn as_type(&self) -> Option<&Type> {
        match self {
            ReturnType::Void => None,
            ReturnType::Type(ty) => Some(ty),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    pub params: Vec<Type>,
    pub return_type: ReturnType,
}

impl MethodDescriptor {
    /// Local-variable slots taken by the parameters (longs and doubles take
    /// two), not counting the receiver.
    #[must_use]
    pub fn param_slots(&self) -> usize {
        self.params.iter().map(Type::size).sum()
    }

    /// Every type mentioned by the descriptor, parameters first.
    pub fn types(&self) -> impl Iterator<Item = &Type> + '_ {
        self.params.iter().chain(self.return_type.as_type())
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::from("(");
        for param in &self.params {
            param.write_descriptor(&mut out);
        }
        out.push(')');
        match &self.return_type {
            ReturnType::Void => out.push('V'),
            ReturnType::Type(ty) => ty.write_descriptor(&mut out),
        }
        f.write_str(&out)
    }
}

impl Serialize for MethodDescriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MethodDescriptor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse_method_descriptor(&text).map_err(serde::de::Error::custom)
    }
}

pub fn parse_field_descriptor(desc: &str) -> Result<Type> {
    let (ty, rest) = parse_field_type(desc)?;
    if !rest.is_empty() {
        return Err(Error::InvalidDescriptor(desc.to_string()));
    }
    Ok(ty)
}

pub fn parse_method_descriptor(desc: &str) -> Result<MethodDescriptor> {
    let Some(mut rest) = desc.strip_prefix('(') else {
        return Err(Error::InvalidDescriptor(desc.to_string()));
    };

    let mut params = Vec::new();
    loop {
        if let Some(after) = rest.strip_prefix(')') {
            rest = after;
            break;
        }
        if rest.is_empty() {
            return Err(Error::InvalidDescriptor(desc.to_string()));
        }
        let (param, after) = parse_field_type(rest)?;
        params.push(param);
        rest = after;
    }

    if rest.is_empty() {
        return Err(Error::InvalidDescriptor(desc.to_string()));
    }

    let (return_type, rest) = if let Some(rest) = rest.strip_prefix('V') {
        (ReturnType::Void, rest)
    } else {
        let (ty, rest) = parse_field_type(rest)?;
        (ReturnType::Type(ty), rest)
    };

    if !rest.is_empty() {
        return Err(Error::InvalidDescriptor(desc.to_string()));
    }

    Ok(MethodDescriptor {
        params,
        return_type,
    })
}

fn parse_field_type(input: &str) -> Result<(Type, &str)> {
    let bytes = input.as_bytes();
    if bytes.is_empty() {
        return Err(Error::InvalidDescriptor(input.to_string()));
    }
    let base = |base: BaseType| Ok((Type::Base(base), &input[1..]));
    match bytes[0] as char {
        'B' => base(BaseType::Byte),
        'C' => base(BaseType::Char),
        'D' => base(BaseType::Double),
        'F' => base(BaseType::Float),
        'I' => base(BaseType::Int),
        'J' => base(BaseType::Long),
        'S' => base(BaseType::Short),
        'Z' => base(BaseType::Boolean),
        'L' => match input.find(';') {
            Some(end) if end > 1 => Ok((Type::object(&input[1..end]), &input[end + 1..])),
            _ => Err(Error::InvalidDescriptor(input.to_string())),
        },
        '[' => {
            let (component, rest) = parse_field_type(&input[1..])?;
            Ok((Type::array_of(component), rest))
        }
        _ => Err(Error::InvalidDescriptor(input.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_field_descriptor_primitives_and_arrays() {
        assert_eq!(parse_field_descriptor("I").unwrap(), Type::Base(BaseType::Int));
        assert_eq!(
            parse_field_descriptor("[[Ljava/lang/String;").unwrap(),
            Type::array_of(Type::array_of(Type::STRING))
        );
        assert!(parse_field_descriptor("L;").is_err());
        assert!(parse_field_descriptor("II").is_err());
    }

    #[test]
    fn parse_method_descriptor_basic() {
        let desc = parse_method_descriptor("(ILjava/lang/String;)[I").unwrap();
        assert_eq!(desc.params, vec![Type::Base(BaseType::Int), Type::STRING]);
        assert_eq!(
            desc.return_type,
            ReturnType::Type(Type::array_of(Type::Base(BaseType::Int)))
        );
        assert_eq!(desc.to_string(), "(ILjava/lang/String;)[I");
    }

    #[test]
    fn param_slots_count_wide_types_twice() {
        let desc = parse_method_descriptor("(JDLjava/lang/Object;)V").unwrap();
        assert_eq!(desc.param_slots(), 5);
        assert_eq!(desc.return_type, ReturnType::Void);
    }

    #[test]
    fn rejects_unterminated_parameter_list() {
        assert!(parse_method_descriptor("(I").is_err());
        assert!(parse_method_descriptor("I)V").is_err());
        assert!(parse_method_descriptor("()").is_err());
        assert!(parse_method_descriptor("()VV").is_err());
    }
}
