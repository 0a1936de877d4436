use indexmap::{IndexMap, IndexSet};
use phantom_hierarchy::ClassHierarchy;
use phantom_types::Type;

use crate::error::{Result, SolverError};

/// Merges the class tree and the interface graph into one hierarchy.
///
/// Every vertex of the interface graph is emitted with its interface
/// successors; classes additionally get their parent from `class_solution`.
/// Classes that never touched the interface graph follow with no interfaces.
pub fn synthesize(
    classes: &IndexSet<Type>,
    class_solution: &IndexMap<Type, Type>,
    iface_solution: &IndexMap<Type, Vec<Type>>,
) -> Result<ClassHierarchy> {
    let mut out = ClassHierarchy::new();

    // Emit interfaces before the classes that implement them so kinds are
    // checked against types that already exist.
    for (ty, ifaces) in iface_solution {
        if !classes.contains(ty) && !out.contains(ty) {
            out.add_interface(ty.clone(), ifaces.iter().cloned())?;
        }
    }
    for (ty, ifaces) in iface_solution {
        if !classes.contains(ty) || *ty == Type::OBJECT {
            continue;
        }
        let Some(parent) = class_solution.get(ty) else {
            return Err(SolverError::InvariantViolation {
                ty: ty.clone(),
                detail: "class was never placed in the class tree".into(),
            });
        };
        out.add_class(ty.clone(), parent.clone(), ifaces.iter().cloned())?;
    }
    for (ty, parent) in class_solution {
        if !out.contains(ty) {
            out.add_class(ty.clone(), parent.clone(), [])?;
        }
    }
    Ok(out)
}

/// Checks that `solution` preserves every declaration of `hierarchy` and
/// leaves no type unresolved.
pub fn validate(hierarchy: &ClassHierarchy, solution: &ClassHierarchy) -> Result<()> {
    for (ty, declared) in hierarchy.iter() {
        let Some(solved) = solution.get(ty) else {
            return Err(SolverError::InvariantViolation {
                ty: ty.clone(),
                detail: "type is missing from the solution".into(),
            });
        };
        if solved.superclass != declared.superclass {
            return Err(SolverError::InvariantViolation {
                ty: ty.clone(),
                detail: format!(
                    "superclass changed from {} to {}",
                    display(declared.superclass.as_ref()),
                    display(solved.superclass.as_ref()),
                ),
            });
        }
        if solved.interfaces != declared.interfaces {
            return Err(SolverError::InvariantViolation {
                ty: ty.clone(),
                detail: "interfaces changed".into(),
            });
        }
    }

    let missing = solution.unknown_types();
    if !missing.is_empty() {
        return Err(SolverError::IncompleteSolution {
            missing: missing.into_iter().collect(),
        });
    }
    Ok(())
}

fn display(ty: Option<&Type>) -> String {
    ty.map_or_else(|| "nothing".to_owned(), |ty| format!("`{ty}`"))
}
