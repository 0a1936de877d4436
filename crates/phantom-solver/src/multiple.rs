use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use phantom_types::Type;

use crate::error::{Result, SolverError};
use crate::graph::TypeGraph;

/// Reads an acyclic interface graph as a multiple-inheritance solution: each
/// vertex extends its direct successors.
///
/// With `minimize` set, an edge `s -> t` is dropped when another successor of
/// `s` already reaches `t`, unless the caller marks it as fixed.
#[derive(Debug, Clone, Copy)]
pub struct MultipleInheritanceSolver {
    minimize: bool,
}

impl MultipleInheritanceSolver {
    #[must_use]
    pub fn new(minimize: bool) -> Self {
        Self { minimize }
    }

    pub fn solve(
        &self,
        mut graph: TypeGraph,
        removable: impl Fn(&Type, &Type) -> bool,
    ) -> Result<IndexMap<Type, Vec<Type>>> {
        if graph.is_cyclic() {
            return Err(SolverError::GraphCycle {
                remaining: graph.constraints(),
            });
        }

        if self.minimize {
            let closure: HashMap<Type, IndexSet<Type>> = graph
                .vertices()
                .map(|v| (v.clone(), graph.reachable_from(v)))
                .collect();

            for (source, target) in graph.edges() {
                if !removable(&source, &target) {
                    continue;
                }
                let redundant = graph.successors(&source).iter().any(|n| {
                    *n != target && closure.get(n).is_some_and(|reach| reach.contains(&target))
                });
                if redundant {
                    graph.remove_edge(&source, &target);
                }
            }
        }

        Ok(graph
            .vertices()
            .map(|v| (v.clone(), graph.successors(v)))
            .collect())
    }
}
