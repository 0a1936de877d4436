use std::collections::HashSet;

use phantom_types::Type;

use crate::error::Result;
use crate::hierarchy::ClassHierarchy;

/// Copies types (and, first, their known supertypes) from one hierarchy into
/// another.
///
/// Types unknown to the source are skipped: they stay unknown in the target
/// too. Types already present in the target are left untouched.
#[derive(Debug)]
pub struct Importer<'a> {
    target: &'a mut ClassHierarchy,
    source: &'a ClassHierarchy,
    in_progress: HashSet<Type>,
}

impl<'a> Importer<'a> {
    pub fn new(target: &'a mut ClassHierarchy, source: &'a ClassHierarchy) -> Self {
        Self {
            target,
            source,
            in_progress: HashSet::new(),
        }
    }

    pub fn import(&mut self, ty: &Type) -> Result<()> {
        if self.target.contains(ty) || self.in_progress.contains(ty) {
            return Ok(());
        }
        let source = self.source;
        let Some(info) = source.get(ty) else {
            return Ok(());
        };

        self.in_progress.insert(ty.clone());
        for sup in info.superclass.iter().chain(&info.interfaces) {
            self.import(sup)?;
        }
        self.in_progress.remove(ty);

        let interfaces = info.interfaces.iter().cloned();
        match &info.superclass {
            _ if info.interface => self.target.add_interface(ty.clone(), interfaces),
            Some(sup) => self.target.add_class(ty.clone(), sup.clone(), interfaces),
            // Only `Object` has no superclass and every hierarchy starts with it.
            None => Ok(()),
        }
    }

    pub fn import_all<'t>(&mut self, types: impl IntoIterator<Item = &'t Type>) -> Result<()> {
        for ty in types {
            self.import(ty)?;
        }
        Ok(())
    }
}
