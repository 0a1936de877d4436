use indexmap::IndexMap;
use phantom_types::Type;

use crate::error::{Result, SolverError};
use crate::graph::TypeGraph;

/// Chooses the order in which unconstrained vertices are placed under a
/// common parent. The first vertex of a connected component becomes the
/// parent of the rest of that component.
pub trait PlacementOrder {
    fn order(&mut self, parent: &Type, unconstrained: Vec<Type>) -> Result<Vec<Type>>;
}

/// Keeps vertices in graph order.
#[derive(Debug, Clone, Copy, Default)]
pub struct InsertionOrder;

impl PlacementOrder for InsertionOrder {
    fn order(&mut self, _parent: &Type, unconstrained: Vec<Type>) -> Result<Vec<Type>> {
        Ok(unconstrained)
    }
}

/// Turns a class graph into a tree rooted at `root`: every vertex gets exactly
/// one parent and every edge `a -> b` ends up as a path from `a` up to `b`.
#[derive(Debug)]
pub struct SingleInheritanceSolver<O> {
    root: Type,
    order: O,
    solution: IndexMap<Type, Type>,
}

impl<O: PlacementOrder> SingleInheritanceSolver<O> {
    pub fn new(root: Type, order: O) -> Self {
        Self {
            root,
            order,
            solution: IndexMap::new(),
        }
    }

    /// Parent of each vertex except the root.
    pub fn solve(mut self, mut graph: TypeGraph) -> Result<IndexMap<Type, Type>> {
        graph.add_vertex(&self.root);
        let root = self.root.clone();
        let others: Vec<Type> = graph.vertices().filter(|v| **v != root).cloned().collect();
        for v in &others {
            graph.add_edge(v, &root);
        }
        self.place_under(&root, graph)?;
        Ok(self.solution)
    }

    fn place_under(&mut self, top: &Type, mut graph: TypeGraph) -> Result<()> {
        graph.remove_vertex(top);

        let unconstrained: Vec<Type> = graph
            .vertices()
            .filter(|v| graph.out_degree(v) == 0)
            .cloned()
            .collect();

        for next in self.order.order(top, unconstrained)? {
            // Already swept into the component of an earlier vertex.
            if !graph.contains_vertex(&next) {
                continue;
            }
            self.solution.insert(next.clone(), top.clone());

            let component = graph.component(&next);
            for v in component.vertices() {
                graph.remove_vertex(v);
            }
            self.place_under(&next, component)?;
        }

        if !graph.is_empty() {
            return Err(SolverError::GraphCycle {
                remaining: graph.constraints(),
            });
        }
        Ok(())
    }
}
