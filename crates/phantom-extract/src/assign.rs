use phantom_hierarchy::{ClassHierarchy, Snapshot, Subtyping};
use phantom_solver::{Constraint, ConstraintSink, SolverError};
use phantom_types::{Conversion, ConversionCache, Type};

use crate::error::{ExtractError, Result};

/// Decides what an assignment `from -> to` demands of the hierarchy.
///
/// Primitive, identity and `null` assignments demand nothing. Reference
/// widenings between known types are checked right away; anything that
/// involves a phantom, or a known type whose supertypes are not all known,
/// becomes a subtype constraint for the solver.
#[derive(Debug)]
pub(crate) struct Assignments<'h> {
    snapshot: Snapshot<'h>,
    cache: ConversionCache,
}

impl<'h> Assignments<'h> {
    pub(crate) fn new(hierarchy: &'h ClassHierarchy) -> Self {
        Self {
            snapshot: hierarchy.snapshot(),
            cache: ConversionCache::new(),
        }
    }

    pub(crate) fn snapshot(&self) -> &Snapshot<'h> {
        &self.snapshot
    }

    pub(crate) fn require<S: ConstraintSink + ?Sized>(
        &mut self,
        from: &Type,
        to: &Type,
        sink: &mut S,
    ) -> Result<()> {
        match self.cache.classify(from, to) {
            Conversion::Identity
            | Conversion::WideningPrimitive
            | Conversion::NarrowingPrimitive
            | Conversion::Null => Ok(()),
            Conversion::Illegal => Err(ExtractError::IllegalConversion {
                from: from.clone(),
                to: to.clone(),
            }),
            Conversion::WideningReference => self.widen(from, to, sink),
        }
    }

    fn widen<S: ConstraintSink + ?Sized>(&mut self, from: &Type, to: &Type, sink: &mut S) -> Result<()> {
        if *to == Type::OBJECT {
            return Ok(());
        }
        match (from, to) {
            (Type::Array(from), Type::Array(to)) => return self.require(from, to, sink),
            // Arrays only widen to `Object`, `Cloneable` and `Serializable`.
            (Type::Array(_), _) | (_, Type::Array(_)) => return Ok(()),
            _ => {}
        }

        let hierarchy = self.snapshot.hierarchy();
        if hierarchy.contains(from) && hierarchy.contains(to) {
            match self.snapshot.is_subtype_of(from, to) {
                Subtyping::Holds => return Ok(()),
                Subtyping::Refuted => {
                    return Err(ExtractError::Solver(SolverError::UnsatisfiableConstraint {
                        constraint: Constraint::subtype(from.clone(), to.clone()),
                        reason: "the known hierarchy rules it out".into(),
                    }))
                }
                Subtyping::Undecided => {}
            }
        }

        let constraint = Constraint::subtype(from.clone(), to.clone());
        tracing::trace!(%constraint, "extracted constraint");
        sink.add_constraint(constraint)?;
        Ok(())
    }
}
