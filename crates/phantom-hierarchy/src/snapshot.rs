use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexSet;
use phantom_types::Type;

use crate::hierarchy::ClassHierarchy;

/// Result of a closure query.
///
/// `resolved` holds every type reached so far, in discovery order. When
/// `fully_known` is false the walk ran into at least one type that is not part
/// of the hierarchy; those types are included in `resolved` and can be listed
/// with [`Closure::unresolved`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Closure {
    pub resolved: IndexSet<Type>,
    pub fully_known: bool,
}

impl Closure {
    #[must_use]
    pub fn contains(&self, ty: &Type) -> bool {
        self.resolved.contains(ty)
    }

    /// Reached types that the hierarchy does not know about.
    pub fn unresolved<'a>(
        &'a self,
        hierarchy: &'a ClassHierarchy,
    ) -> impl Iterator<Item = &'a Type> + 'a {
        self.resolved.iter().filter(|ty| !hierarchy.contains(ty))
    }
}

/// Three-valued answer of [`Snapshot::is_subtype_of`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subtyping {
    Holds,
    Refuted,
    /// The known part of the hierarchy neither proves nor refutes the
    /// relation: some supertype on the way is unknown.
    Undecided,
}

/// Transitive queries over a hierarchy at a point in time.
///
/// Closures are memoized per type, so a snapshot must not outlive changes to
/// the hierarchy it was taken from; the borrow enforces that.
#[derive(Debug)]
pub struct Snapshot<'h> {
    hierarchy: &'h ClassHierarchy,
    supertypes: RefCell<HashMap<Type, Closure>>,
}

impl<'h> Snapshot<'h> {
    #[must_use]
    pub fn new(hierarchy: &'h ClassHierarchy) -> Self {
        Self {
            hierarchy,
            supertypes: RefCell::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn hierarchy(&self) -> &'h ClassHierarchy {
        self.hierarchy
    }

    /// Superclass chain of `ty`, nearest first, excluding `ty` itself.
    /// Stops (incomplete) at the first superclass that is not known.
    #[must_use]
    pub fn all_superclasses(&self, ty: &Type) -> Closure {
        let mut resolved = IndexSet::new();
        let Some(mut info) = self.hierarchy.get(ty) else {
            return Closure {
                resolved,
                fully_known: false,
            };
        };
        while let Some(sup) = &info.superclass {
            if !resolved.insert(sup.clone()) {
                break;
            }
            match self.hierarchy.get(sup) {
                Some(next) => info = next,
                None => {
                    return Closure {
                        resolved,
                        fully_known: false,
                    }
                }
            }
        }
        Closure {
            resolved,
            fully_known: true,
        }
    }

    /// Every supertype of `ty`, classes and interfaces, including `ty`.
    ///
    /// Walks the superclass chain; from each class on the chain a breadth
    /// first search collects its interfaces. Unknown types are recorded and
    /// not expanded.
    #[must_use]
    pub fn all_supertypes(&self, ty: &Type) -> Closure {
        if let Some(cached) = self.supertypes.borrow().get(ty) {
            return cached.clone();
        }
        let closure = self.compute_supertypes(ty);
        self.supertypes
            .borrow_mut()
            .insert(ty.clone(), closure.clone());
        closure
    }

    fn compute_supertypes(&self, ty: &Type) -> Closure {
        let mut resolved = IndexSet::new();
        let mut fully_known = true;
        let mut visited_chain = HashSet::new();
        let mut current = Some(ty.clone());

        while let Some(class) = current.take() {
            if !visited_chain.insert(class.clone()) {
                break;
            }
            let mut queue = VecDeque::from([class.clone()]);
            while let Some(next) = queue.pop_front() {
                if !resolved.insert(next.clone()) {
                    continue;
                }
                match self.hierarchy.get(&next) {
                    Some(info) => queue.extend(info.interfaces.iter().cloned()),
                    None => fully_known = false,
                }
            }
            current = self
                .hierarchy
                .get(&class)
                .and_then(|info| info.superclass.clone());
        }

        // Interfaces only ever reach `Object` through their declared superclass,
        // which the loop above already followed.
        Closure {
            resolved,
            fully_known,
        }
    }

    /// All super-interfaces of `ty` (transitively), excluding the superclass
    /// chain and `ty` itself.
    #[must_use]
    pub fn all_interfaces(&self, ty: &Type) -> Closure {
        let superclasses = self.all_superclasses(ty);
        let supertypes = self.all_supertypes(ty);
        Closure {
            resolved: supertypes
                .resolved
                .into_iter()
                .filter(|sup| sup != ty && !superclasses.contains(sup))
                .collect(),
            fully_known: supertypes.fully_known,
        }
    }

    #[must_use]
    pub fn is_subtype_of(&self, ty: &Type, supertype: &Type) -> Subtyping {
        if ty == supertype || *supertype == Type::OBJECT {
            return Subtyping::Holds;
        }
        let closure = self.all_supertypes(ty);
        if closure.contains(supertype) {
            Subtyping::Holds
        } else if closure.fully_known {
            Subtyping::Refuted
        } else {
            Subtyping::Undecided
        }
    }

    /// Nearest class that both `a` and `b` extend, walking both superclass
    /// chains in lockstep. `None` when a chain runs into an unknown type
    /// before the two meet.
    #[must_use]
    pub fn first_common_superclass(&self, a: &Type, b: &Type) -> Option<Type> {
        let mut visited = HashSet::new();
        let mut a = Some(a.clone());
        let mut b = Some(b.clone());

        while a.is_some() || b.is_some() {
            for side in [&mut a, &mut b] {
                if let Some(ty) = side.take() {
                    if !visited.insert(ty.clone()) {
                        return Some(ty);
                    }
                    *side = self
                        .hierarchy
                        .get(&ty)
                        .and_then(|info| info.superclass.clone());
                }
            }
        }
        None
    }
}
