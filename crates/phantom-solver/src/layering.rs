use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use phantom_types::Type;

use crate::constraint::Constraint;
use crate::error::{Result, SolverError};
use crate::graph::TypeGraph;
use crate::multiple::MultipleInheritanceSolver;

/// Interface solving for edges whose source is a known type.
///
/// A known type cannot gain new direct supertypes, so a *special* edge
/// `s -> t` must instead be realized by one of the phantom supertypes of `s`
/// (its projections). The graph is stratified bottom-up and each special edge
/// is moved to the first projection that sits strictly below `t`, which keeps
/// the graph acyclic.
#[derive(Debug, Clone)]
pub struct LayeringSolver {
    special: IndexSet<(Type, Type)>,
    projections: IndexMap<Type, Vec<Type>>,
    inner: MultipleInheritanceSolver,
}

impl LayeringSolver {
    #[must_use]
    pub fn new(
        special: IndexSet<(Type, Type)>,
        projections: IndexMap<Type, Vec<Type>>,
        minimize: bool,
    ) -> Self {
        Self {
            special,
            projections,
            inner: MultipleInheritanceSolver::new(minimize),
        }
    }

    fn projections_of(&self, source: &Type) -> &[Type] {
        self.projections.get(source).map_or(&[], Vec::as_slice)
    }

    pub fn solve(
        &self,
        mut graph: TypeGraph,
        removable: impl Fn(&Type, &Type) -> bool,
    ) -> Result<IndexMap<Type, Vec<Type>>> {
        let strata = self.stratify(&graph)?;

        for (source, target) in &self.special {
            let t_stratum = strata.get(target).copied().unwrap_or_default();
            let projection = self
                .projections_of(source)
                .iter()
                .find(|proj| strata.get(*proj).copied().unwrap_or_default() < t_stratum);
            let Some(projection) = projection else {
                return Err(SolverError::InvariantViolation {
                    ty: source.clone(),
                    detail: format!("no phantom supertype can carry `{source} <: {target}`"),
                });
            };
            tracing::trace!(%source, %target, via = %projection, "redirecting special edge");
            graph.remove_edge(source, target);
            graph.add_edge(projection, target);
        }

        self.inner.solve(graph, removable)
    }

    /// Height of every vertex: the number of peeling rounds it survives when
    /// vertices without remaining subtypes are stripped away layer by layer.
    fn stratify(&self, graph: &TypeGraph) -> Result<HashMap<Type, usize>> {
        let mut path_edges: Vec<(Type, Type)> = graph.edges();
        let mut special_edges: Vec<(Type, Type)> = Vec::new();
        let mut strata: Vec<IndexSet<Type>> = vec![graph.vertices().cloned().collect()];

        loop {
            let next: IndexSet<Type> = path_edges
                .iter()
                .chain(&special_edges)
                .map(|(_, target)| target.clone())
                .collect();
            let prev_len = strata.last().map_or(0, IndexSet::len);

            if next.is_empty() {
                break;
            }
            if next.len() == prev_len {
                let mut remaining: Vec<_> = path_edges.clone();
                remaining.extend(special_edges.iter().cloned());
                return Err(SolverError::GraphCycle {
                    remaining: remaining
                        .into_iter()
                        .map(|(sub, sup)| Constraint::subtype(sub, sup))
                        .collect(),
                });
            }

            let mut kept = Vec::with_capacity(path_edges.len());
            for edge in path_edges.drain(..) {
                if next.contains(&edge.0) {
                    kept.push(edge);
                } else if self.special.contains(&edge) {
                    special_edges.push(edge);
                }
            }
            path_edges = kept;

            special_edges.retain(|(source, _)| {
                self.projections_of(source)
                    .iter()
                    .all(|proj| next.contains(proj))
            });

            strata.push(next);
        }

        let mut heights = HashMap::new();
        for (i, stratum) in strata.iter().enumerate() {
            for v in stratum {
                heights.insert(v.clone(), i);
            }
        }
        Ok(heights)
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
    fn special_edges_move_to_a_lower_projection() {
        // Known K has phantom supertype P; K <: I must be carried by P.
        let mut g = TypeGraph::new();
        g.add_edge(&t("K"), &t("I"));
        g.add_vertex(&t("P"));
        let special = IndexSet::from([(t("K"), t("I"))]);
        let projections = IndexMap::from([(t("K"), vec![t("P")])]);

        let solution = LayeringSolver::new(special, projections, true)
            .solve(g, |_, _| true)
            .unwrap();
        assert!(solution[&t("K")].is_empty());
        assert_eq!(solution[&t("P")], vec![t("I")]);
    }

    #[test]
    fn projection_above_target_is_a_cycle() {
        // Routing K <: I through P would need P <: I while I <: P.
        let mut g = TypeGraph::new();
        g.add_edge(&t("K"), &t("I"));
        g.add_edge(&t("I"), &t("P"));
        let special = IndexSet::from([(t("K"), t("I"))]);
        let projections = IndexMap::from([(t("K"), vec![t("P")])]);

        let err = LayeringSolver::new(special, projections, true)
            .solve(g, |_, _| true)
            .unwrap_err();
        assert!(matches!(err, SolverError::GraphCycle { .. }));
    }
}
