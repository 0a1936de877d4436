use std::collections::HashSet;

use indexmap::IndexMap;
use phantom_hierarchy::{ClassHierarchy, Result};
use phantom_types::{MethodDescriptor, Type};

use crate::flags::{ACC_ABSTRACT, ACC_PRIVATE, ACC_STATIC};
use crate::model::{ArchiveModel, FieldModel, MethodModel};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredField {
    pub access: u16,
    pub descriptor: Type,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredMethod {
    pub access: u16,
    pub name: String,
    pub descriptor: MethodDescriptor,
}

impl DeclaredMethod {
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.access & ACC_ABSTRACT != 0
    }

    #[must_use]
    pub fn is_static(&self) -> bool {
        self.access & ACC_STATIC != 0
    }

    #[must_use]
    pub fn is_private(&self) -> bool {
        self.access & ACC_PRIVATE != 0
    }
}

/// Outcome of a member lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<'a, T> {
    Found { owner: Type, member: &'a T },
    /// Every type searched is known and none declares the member.
    Missing,
    /// The search reached this phantom type before finding the member, so the
    /// member can be attributed to it.
    Phantom(Type),
}

#[derive(Debug, Clone, Default)]
struct Record {
    fields: IndexMap<String, DeclaredField>,
    methods: IndexMap<(String, MethodDescriptor), DeclaredMethod>,
}

/// Declared fields and methods of the known (archive and library) types.
#[derive(Debug, Clone, Default)]
pub struct ClassMembers {
    records: IndexMap<Type, Record>,
}

impl ClassMembers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_archive(archive: &ArchiveModel) -> Self {
        let mut members = Self::new();
        let declared = archive
            .library
            .iter()
            .map(|ty| (&ty.name, &ty.fields, &ty.methods))
            .chain(
                archive
                    .classes
                    .iter()
                    .map(|class| (&class.name, &class.fields, &class.methods)),
            );
        for (owner, fields, methods) in declared {
            members.declare(owner, fields, methods);
        }
        members
    }

    pub fn declare(&mut self, owner: &Type, fields: &[FieldModel], methods: &[MethodModel]) {
        let record = self.records.entry(owner.clone()).or_default();
        for field in fields {
            record.fields.insert(
                field.name.clone(),
                DeclaredField {
                    access: field.access,
                    descriptor: field.descriptor.clone(),
                },
            );
        }
        for method in methods {
            record.methods.insert(
                (method.name.clone(), method.descriptor.clone()),
                DeclaredMethod {
                    access: method.access,
                    name: method.name.clone(),
                    descriptor: method.descriptor.clone(),
                },
            );
        }
    }

    pub fn methods<'a>(&'a self, owner: &Type) -> impl Iterator<Item = &'a DeclaredMethod> + 'a {
        self.records
            .get(owner)
            .into_iter()
            .flat_map(|record| record.methods.values())
    }

    fn field(&self, owner: &Type, name: &str) -> Option<&DeclaredField> {
        self.records.get(owner)?.fields.get(name)
    }

    fn method(&self, owner: &Type, name: &str, descriptor: &MethodDescriptor) -> Option<&DeclaredMethod> {
        self.records
            .get(owner)?
            .methods
            .get(&(name.to_owned(), descriptor.clone()))
    }

    /// Instance field resolution: `owner`, then its superclasses.
    pub fn lookup_field(
        &self,
        hierarchy: &ClassHierarchy,
        owner: &Type,
        name: &str,
    ) -> Result<Lookup<'_, DeclaredField>> {
        self.walk_superclasses(hierarchy, owner, |ty| self.field(ty, name))
    }

    /// Static fields may also come from interfaces, so every supertype is
    /// searched.
    pub fn lookup_static_field(
        &self,
        hierarchy: &ClassHierarchy,
        owner: &Type,
        name: &str,
    ) -> Result<Lookup<'_, DeclaredField>> {
        self.search_supertypes(hierarchy, owner, |ty| self.field(ty, name))
    }

    /// Method resolution through the superclass chain of a class. Interfaces
    /// are searched like [`ClassMembers::lookup_interface_method`].
    pub fn lookup_method(
        &self,
        hierarchy: &ClassHierarchy,
        owner: &Type,
        name: &str,
        descriptor: &MethodDescriptor,
    ) -> Result<Lookup<'_, DeclaredMethod>> {
        if hierarchy.is_interface(owner)? {
            return self.lookup_interface_method(hierarchy, owner, name, descriptor);
        }
        self.walk_superclasses(hierarchy, owner, |ty| self.method(ty, name, descriptor))
    }

    pub fn lookup_interface_method(
        &self,
        hierarchy: &ClassHierarchy,
        owner: &Type,
        name: &str,
        descriptor: &MethodDescriptor,
    ) -> Result<Lookup<'_, DeclaredMethod>> {
        self.search_supertypes(hierarchy, owner, |ty| self.method(ty, name, descriptor))
    }

    fn walk_superclasses<'a, T>(
        &'a self,
        hierarchy: &ClassHierarchy,
        owner: &Type,
        find: impl Fn(&Type) -> Option<&'a T>,
    ) -> Result<Lookup<'a, T>> {
        let mut visited = HashSet::new();
        let mut current = owner.clone();
        loop {
            if let Some(member) = find(&current) {
                return Ok(Lookup::Found {
                    owner: current,
                    member,
                });
            }
            if !visited.insert(current.clone()) {
                return Ok(Lookup::Missing);
            }
            match hierarchy.superclass(&current)? {
                None => return Ok(Lookup::Missing),
                Some(sup) if !hierarchy.contains(sup) => return Ok(Lookup::Phantom(sup.clone())),
                Some(sup) => current = sup.clone(),
            }
        }
    }

    /// Breadth-first over every supertype. When the member is not found the
    /// first phantom met is blamed.
    fn search_supertypes<'a, T>(
        &'a self,
        hierarchy: &ClassHierarchy,
        owner: &Type,
        find: impl Fn(&Type) -> Option<&'a T>,
    ) -> Result<Lookup<'a, T>> {
        // Fails for unknown owners, like the other lookups.
        hierarchy.is_interface(owner)?;
        let closure = hierarchy.snapshot().all_supertypes(owner);
        let mut phantom = None;
        for ty in &closure.resolved {
            if !hierarchy.contains(ty) {
                phantom.get_or_insert_with(|| ty.clone());
                continue;
            }
            if let Some(member) = find(ty) {
                return Ok(Lookup::Found {
                    owner: ty.clone(),
                    member,
                });
            }
        }
        Ok(phantom.map_or(Lookup::Missing, Lookup::Phantom))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phantom_hierarchy::HierarchyError;
    use phantom_types::parse_method_descriptor;
    use pretty_assertions::assert_eq;

    use crate::flags::ACC_PUBLIC;

    fn t(name: &str) -> Type {
        Type::object(name)
    }

    fn method(name: &str, desc: &str) -> MethodModel {
        MethodModel {
            access: ACC_PUBLIC,
            name: name.into(),
            descriptor: parse_method_descriptor(desc).unwrap(),
            exceptions: Vec::new(),
            annotations: Vec::new(),
            body: None,
        }
    }

    fn field(name: &str, static_: bool) -> FieldModel {
        FieldModel {
            access: if static_ { ACC_PUBLIC | ACC_STATIC } else { ACC_PUBLIC },
            name: name.into(),
            descriptor: Type::STRING,
            annotations: Vec::new(),
        }
    }

    /// `lib/Base <- app/Mid (implements ph/I, lib/J) <- app/Leaf`, and
    /// `app/Orphan extends ph/P`.
    fn fixture() -> (ClassHierarchy, ClassMembers) {
        let mut h = ClassHierarchy::new();
        h.add_interface(t("lib/J"), []).unwrap();
        h.add_class(t("lib/Base"), Type::OBJECT, []).unwrap();
        h.add_class(t("app/Mid"), t("lib/Base"), [t("ph/I"), t("lib/J")])
            .unwrap();
        h.add_class(t("app/Leaf"), t("app/Mid"), []).unwrap();
        h.add_class(t("app/Orphan"), t("ph/P"), []).unwrap();

        let mut members = ClassMembers::new();
        members.declare(&t("lib/Base"), &[field("size", false)], &[method("run", "()V")]);
        members.declare(&t("lib/J"), &[field("ID", true)], &[method("call", "()I")]);
        (h, members)
    }

    #[test]
    fn fields_resolve_through_superclasses() {
        let (h, members) = fixture();
        let Lookup::Found { owner, member } = members.lookup_field(&h, &t("app/Leaf"), "size").unwrap()
        else {
            panic!("expected to find `size`");
        };
        assert_eq!(owner, t("lib/Base"));
        assert_eq!(member.descriptor, Type::STRING);

        assert_eq!(members.lookup_field(&h, &t("app/Leaf"), "nope").unwrap(), Lookup::Missing);
        assert_eq!(
            members.lookup_field(&h, &t("app/Orphan"), "size").unwrap(),
            Lookup::Phantom(t("ph/P"))
        );
    }

    #[test]
    fn static_fields_and_interface_methods_search_every_supertype() {
        let (h, members) = fixture();
        assert!(matches!(
            members.lookup_static_field(&h, &t("app/Leaf"), "ID").unwrap(),
            Lookup::Found { owner, .. } if owner == t("lib/J")
        ));
        // `ph/I` is met before the search is exhausted.
        assert_eq!(
            members.lookup_static_field(&h, &t("app/Leaf"), "OTHER").unwrap(),
            Lookup::Phantom(t("ph/I"))
        );

        let call = parse_method_descriptor("()I").unwrap();
        assert!(matches!(
            members.lookup_interface_method(&h, &t("app/Leaf"), "call", &call).unwrap(),
            Lookup::Found { owner, .. } if owner == t("lib/J")
        ));
        assert!(matches!(
            members.lookup_method(&h, &t("lib/J"), "call", &call).unwrap(),
            Lookup::Found { .. }
        ));
    }

    #[test]
    fn methods_resolve_through_superclasses_only() {
        let (h, members) = fixture();
        let run = parse_method_descriptor("()V").unwrap();
        let call = parse_method_descriptor("()I").unwrap();
        assert!(matches!(
            members.lookup_method(&h, &t("app/Leaf"), "run", &run).unwrap(),
            Lookup::Found { member, .. } if member.name == "run"
        ));
        assert_eq!(
            members.lookup_method(&h, &t("app/Leaf"), "call", &call).unwrap(),
            Lookup::Missing
        );
        assert_eq!(
            members.lookup_method(&h, &t("app/Orphan"), "run", &run).unwrap(),
            Lookup::Phantom(t("ph/P"))
        );
        assert_eq!(
            members.lookup_method(&h, &t("ph/P"), "run", &run),
            Err(HierarchyError::UnknownType { ty: t("ph/P") })
        );
    }
}
