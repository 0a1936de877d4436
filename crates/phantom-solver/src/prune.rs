use phantom_hierarchy::{ClassHierarchy, Importer};
use phantom_types::Type;

use crate::error::Result;

/// Restricts `hierarchy` to the given types and their known supertypes.
///
/// Types the hierarchy does not know are ignored; they stay phantoms.
pub fn pruned_hierarchy<'t>(
    hierarchy: &ClassHierarchy,
    interesting: impl IntoIterator<Item = &'t Type>,
) -> Result<ClassHierarchy> {
    let mut pruned = ClassHierarchy::new();
    Importer::new(&mut pruned, hierarchy).import_all(interesting)?;
    tracing::debug!(
        before = hierarchy.len(),
        after = pruned.len(),
        "pruned class hierarchy"
    );
    Ok(pruned)
}
