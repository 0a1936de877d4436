//! Serde adapters for types written as class names (`java/lang/String`, or a
//! descriptor for arrays) instead of field descriptors.
//!
//! ```ignore
//! #[serde(with = "phantom_types::internal_name")]
//! owner: Type,
//! ```

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::ty::Type;

pub fn serialize<S: Serializer>(ty: &Type, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ty.class_name())
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Type, D::Error> {
    let text = String::deserialize(deserializer)?;
    Type::from_internal_name(&text).map_err(de::Error::custom)
}

struct Named(Type);

impl<'de> Deserialize<'de> for Named {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        self::deserialize(deserializer).map(Named)
    }
}

struct NamedRef<'a>(&'a Type);

impl Serialize for NamedRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self::serialize(self.0, serializer)
    }
}

/// `Option<Type>`, `null` or absent meaning `None`.
pub mod option {
    use super::*;

    pub fn serialize<S: Serializer>(ty: &Option<Type>, serializer: S) -> Result<S::Ok, S::Error> {
        ty.as_ref().map(NamedRef).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Type>, D::Error> {
        Ok(Option::<Named>::deserialize(deserializer)?.map(|named| named.0))
    }
}

/// `Vec<Type>` as a list of class names.
pub mod seq {
    use super::*;

    pub fn serialize<S: Serializer>(types: &[Type], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(types.iter().map(NamedRef))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Type>, D::Error> {
        Ok(Vec::<Named>::deserialize(deserializer)?
            .into_iter()
            .map(|named| named.0)
            .collect())
    }
}
