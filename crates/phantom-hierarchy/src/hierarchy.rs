use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use phantom_types::Type;
use serde::Serialize;

use crate::error::{HierarchyError, Kind, Result};
use crate::snapshot::Snapshot;

/// Declared supertypes of one type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeInfo {
    pub interface: bool,
    /// `None` only for `java/lang/Object`. Interfaces always point at
    /// `java/lang/Object`.
    pub superclass: Option<Type>,
    pub interfaces: IndexSet<Type>,
}

impl TypeInfo {
    #[must_use]
    pub fn kind(&self) -> Kind {
        if self.interface {
            Kind::Interface
        } else {
            Kind::Class
        }
    }
}

/// Append-only mapping from types to their declared supertypes.
///
/// `java/lang/Object` is always present. Supertypes may reference types that
/// were never added; those are the hierarchy's unknown (phantom) types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ClassHierarchy {
    types: IndexMap<Type, TypeInfo>,
}

impl Default for ClassHierarchy {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassHierarchy {
    #[must_use]
    pub fn new() -> Self {
        let mut types = IndexMap::new();
        types.insert(
            Type::OBJECT,
            TypeInfo {
                interface: false,
                superclass: None,
                interfaces: IndexSet::new(),
            },
        );
        Self { types }
    }

    pub fn add_class(
        &mut self,
        ty: Type,
        superclass: Type,
        interfaces: impl IntoIterator<Item = Type>,
    ) -> Result<()> {
        self.check_absent(&ty)?;
        if self.types.get(&superclass).is_some_and(|info| info.interface) {
            return Err(HierarchyError::BadKind {
                ty: superclass,
                expected: Kind::Class,
            });
        }
        let interfaces = self.checked_interfaces(interfaces)?;
        self.types.insert(
            ty,
            TypeInfo {
                interface: false,
                superclass: Some(superclass),
                interfaces,
            },
        );
        Ok(())
    }

    pub fn add_interface(
        &mut self,
        ty: Type,
        super_interfaces: impl IntoIterator<Item = Type>,
    ) -> Result<()> {
        self.check_absent(&ty)?;
        let interfaces = self.checked_interfaces(super_interfaces)?;
        self.types.insert(
            ty,
            TypeInfo {
                interface: true,
                superclass: Some(Type::OBJECT),
                interfaces,
            },
        );
        Ok(())
    }

    fn check_absent(&self, ty: &Type) -> Result<()> {
        if self.types.contains_key(ty) {
            return Err(HierarchyError::DuplicateType { ty: ty.clone() });
        }
        Ok(())
    }

    fn checked_interfaces(
        &self,
        interfaces: impl IntoIterator<Item = Type>,
    ) -> Result<IndexSet<Type>> {
        let mut out = IndexSet::new();
        for iface in interfaces {
            if self.types.get(&iface).is_some_and(|info| !info.interface) {
                return Err(HierarchyError::BadKind {
                    ty: iface,
                    expected: Kind::Interface,
                });
            }
            out.insert(iface);
        }
        Ok(out)
    }

    #[must_use]
    pub fn contains(&self, ty: &Type) -> bool {
        self.types.contains_key(ty)
    }

    #[must_use]
    pub fn get(&self, ty: &Type) -> Option<&TypeInfo> {
        self.types.get(ty)
    }

    fn info(&self, ty: &Type) -> Result<&TypeInfo> {
        self.types
            .get(ty)
            .ok_or_else(|| HierarchyError::UnknownType { ty: ty.clone() })
    }

    pub fn is_interface(&self, ty: &Type) -> Result<bool> {
        Ok(self.info(ty)?.interface)
    }

    pub fn superclass(&self, ty: &Type) -> Result<Option<&Type>> {
        Ok(self.info(ty)?.superclass.as_ref())
    }

    pub fn interfaces(&self, ty: &Type) -> Result<&IndexSet<Type>> {
        Ok(&self.info(ty)?.interfaces)
    }

    /// Types in insertion order.
    pub fn types(&self) -> impl Iterator<Item = &Type> + '_ {
        self.types.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Type, &TypeInfo)> + '_ {
        self.types.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Supertypes referenced by some entry but never added themselves.
    #[must_use]
    pub fn unknown_types(&self) -> IndexSet<Type> {
        let mut unknown = IndexSet::new();
        for info in self.types.values() {
            for ty in info.superclass.iter().chain(&info.interfaces) {
                if !self.contains(ty) {
                    unknown.insert(ty.clone());
                }
            }
        }
        unknown
    }

    /// Known types ordered so that every type comes after all of its known
    /// supertypes. Edges to unknown types are ignored; types caught in a
    /// declared cycle are left out.
    #[must_use]
    pub fn supertypes_first(&self) -> Vec<Type> {
        let mut pending: IndexMap<&Type, usize> = IndexMap::new();
        let mut subtypes: IndexMap<&Type, Vec<&Type>> = IndexMap::new();
        for (ty, info) in &self.types {
            let known = info
                .superclass
                .iter()
                .chain(&info.interfaces)
                .filter(|sup| self.contains(sup))
                .collect::<IndexSet<_>>();
            pending.insert(ty, known.len());
            for sup in known {
                subtypes.entry(sup).or_default().push(ty);
            }
        }

        let mut queue: VecDeque<&Type> = pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(ty, _)| *ty)
            .collect();
        let mut order = Vec::with_capacity(self.types.len());
        while let Some(ty) = queue.pop_front() {
            order.push(ty.clone());
            for &sub in subtypes.get(ty).into_iter().flatten() {
                if let Some(count) = pending.get_mut(&sub) {
                    *count -= 1;
                    if *count == 0 {
                        queue.push_back(sub);
                    }
                }
            }
        }
        order
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot::new(self)
    }

    /// Freezes the hierarchy into a cheaply clonable, read-only handle.
    #[must_use]
    pub fn freeze(self) -> UnmodifiableHierarchy {
        UnmodifiableHierarchy(Arc::new(self))
    }
}

/// Read-only view handed to components that must not touch ground truth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmodifiableHierarchy(Arc<ClassHierarchy>);

impl Serialize for UnmodifiableHierarchy {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl UnmodifiableHierarchy {
    /// A private, growable copy.
    #[must_use]
    pub fn to_incremental(&self) -> ClassHierarchy {
        (*self.0).clone()
    }
}

impl Deref for UnmodifiableHierarchy {
    type Target = ClassHierarchy;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<ClassHierarchy> for UnmodifiableHierarchy {
    fn from(hierarchy: ClassHierarchy) -> Self {
        hierarchy.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn t(name: &str) -> Type {
        Type::object(name)
    }

    #[test]
    fn object_is_always_present() {
        let h = ClassHierarchy::new();
        assert!(h.contains(&Type::OBJECT));
        assert_eq!(h.superclass(&Type::OBJECT).unwrap(), None);
        assert!(!h.is_interface(&Type::OBJECT).unwrap());
    }

    #[test]
    fn rejects_duplicates_and_bad_kinds() {
        let mut h = ClassHierarchy::new();
        h.add_interface(t("I"), []).unwrap();
        h.add_class(t("A"), Type::OBJECT, [t("I")]).unwrap();

        assert_eq!(
            h.add_class(t("A"), Type::OBJECT, []),
            Err(HierarchyError::DuplicateType { ty: t("A") })
        );
        assert_eq!(
            h.add_class(t("B"), t("I"), []),
            Err(HierarchyError::BadKind {
                ty: t("I"),
                expected: Kind::Class
            })
        );
        assert_eq!(
            h.add_interface(t("J"), [t("A")]),
            Err(HierarchyError::BadKind {
                ty: t("A"),
                expected: Kind::Interface
            })
        );
        assert!(!h.contains(&t("B")));
    }

    #[test]
    fn unknown_type_queries_fail() {
        let h = ClassHierarchy::new();
        assert_eq!(
            h.is_interface(&t("Nope")),
            Err(HierarchyError::UnknownType { ty: t("Nope") })
        );
        assert!(h.superclass(&t("Nope")).is_err());
        assert!(h.interfaces(&t("Nope")).is_err());
    }

    #[test]
    fn interfaces_extend_object() {
        let mut h = ClassHierarchy::new();
        h.add_interface(t("I"), []).unwrap();
        assert_eq!(h.superclass(&t("I")).unwrap(), Some(&Type::OBJECT));
    }

    #[test]
    fn unknown_types_are_referenced_but_absent() {
        let mut h = ClassHierarchy::new();
        h.add_class(t("A"), t("Missing"), [t("MissingIface")]).unwrap();
        let unknown: Vec<_> = h.unknown_types().into_iter().collect();
        assert_eq!(unknown, vec![t("Missing"), t("MissingIface")]);
    }

    #[test]
    fn supertypes_first_orders_known_types() {
        let mut h = ClassHierarchy::new();
        h.add_class(t("C"), t("B"), []).unwrap();
        h.add_class(t("B"), t("A"), [t("I")]).unwrap();
        h.add_class(t("A"), Type::OBJECT, []).unwrap();
        h.add_interface(t("I"), []).unwrap();

        let order = h.supertypes_first();
        let pos = |name: &str| order.iter().position(|ty| *ty == t(name)).unwrap();
        assert_eq!(order.len(), 5);
        assert!(pos("A") < pos("B"));
        assert!(pos("I") < pos("B"));
        assert!(pos("B") < pos("C"));
        assert_eq!(order[0], Type::OBJECT);
    }

    #[test]
    fn frozen_view_can_be_copied_back() {
        let mut h = ClassHierarchy::new();
        h.add_class(t("A"), Type::OBJECT, []).unwrap();
        let frozen = h.freeze();
        assert!(frozen.contains(&t("A")));

        let mut copy = frozen.to_incremental();
        copy.add_class(t("B"), t("A"), []).unwrap();
        assert!(!frozen.contains(&t("B")));
    }
}
