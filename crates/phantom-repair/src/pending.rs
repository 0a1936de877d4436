use indexmap::{IndexMap, IndexSet};
use phantom_hierarchy::ClassHierarchy;
use phantom_types::{MethodDescriptor, Type};

use crate::flags::{ACC_ABSTRACT, ACC_PRIVATE, ACC_STATIC};
use crate::members::ClassMembers;
use crate::phantoms::Phantoms;

type Signature = (String, MethodDescriptor);

#[derive(Debug, Default)]
struct Inherited {
    /// Abstract methods no class on the way implements.
    pending: IndexSet<Signature>,
    /// Instance methods with code, declared here or inherited.
    implemented: IndexSet<Signature>,
}

/// Abstract methods every type of `hierarchy` inherits without implementing
/// them. Known types' methods come from `members`, phantom types' from the
/// registry. Private and static methods do not take part.
#[must_use]
pub fn pending_methods(
    hierarchy: &ClassHierarchy,
    members: &ClassMembers,
    phantoms: &Phantoms,
) -> IndexMap<Type, IndexSet<Signature>> {
    let mut inherited: IndexMap<Type, Inherited> = IndexMap::new();

    for ty in hierarchy.supertypes_first() {
        let Some(info) = hierarchy.get(&ty) else {
            continue;
        };
        let mut state = Inherited::default();
        let mut declared = IndexSet::new();

        for (name, descriptor, access) in declared_methods(&ty, members, phantoms) {
            if access & (ACC_PRIVATE | ACC_STATIC) != 0 {
                continue;
            }
            let signature = (name, descriptor);
            declared.insert(signature.clone());
            if info.interface || access & ACC_ABSTRACT != 0 {
                state.pending.insert(signature);
            } else {
                state.implemented.insert(signature);
            }
        }

        if !info.interface {
            if let Some(parent) = info.superclass.as_ref().and_then(|sup| inherited.get(sup)) {
                state.implemented.extend(
                    parent
                        .implemented
                        .iter()
                        .filter(|signature| !declared.contains(*signature))
                        .cloned(),
                );
                state.pending.extend(
                    parent
                        .pending
                        .iter()
                        .filter(|signature| !declared.contains(*signature))
                        .cloned(),
                );
            }
        }
        for iface in &info.interfaces {
            if let Some(parent) = inherited.get(iface) {
                state.pending.extend(
                    parent
                        .pending
                        .iter()
                        .filter(|signature| !declared.contains(*signature))
                        .cloned(),
                );
            }
        }
        let implemented = state.implemented.clone();
        state.pending.retain(|signature| !implemented.contains(signature));
        inherited.insert(ty, state);
    }

    inherited
        .into_iter()
        .filter(|(_, state)| !state.pending.is_empty())
        .map(|(ty, state)| (ty, state.pending))
        .collect()
}

fn declared_methods(
    ty: &Type,
    members: &ClassMembers,
    phantoms: &Phantoms,
) -> Vec<(String, MethodDescriptor, u16)> {
    match phantoms.get(ty) {
        Some(phantom) => phantom
            .methods()
            .map(|(name, descriptor, access)| (name.to_owned(), descriptor.clone(), access))
            .collect(),
        None => members
            .methods(ty)
            .map(|method| (method.name.clone(), method.descriptor.clone(), method.access))
            .collect(),
    }
}
