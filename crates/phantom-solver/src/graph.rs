use std::collections::VecDeque;

use indexmap::IndexSet;
use petgraph::algo::is_cyclic_directed;
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::Dfs;
use petgraph::Direction;
use phantom_types::Type;

use crate::constraint::Constraint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct Node(usize);

/// Directed graph over types; an edge `a -> b` is the obligation `a <: b`.
///
/// Types are interned once and never forgotten, so removing and re-adding a
/// vertex is cheap. Iteration follows insertion order.
#[derive(Debug, Clone, Default)]
pub struct TypeGraph {
    interner: IndexSet<Type>,
    graph: DiGraphMap<Node, ()>,
}

impl TypeGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn intern(&mut self, ty: &Type) -> Node {
        match self.interner.get_index_of(ty) {
            Some(idx) => Node(idx),
            None => Node(self.interner.insert_full(ty.clone()).0),
        }
    }

    fn node(&self, ty: &Type) -> Option<Node> {
        self.interner
            .get_index_of(ty)
            .map(Node)
            .filter(|node| self.graph.contains_node(*node))
    }

    fn ty(&self, node: Node) -> &Type {
        &self.interner[node.0]
    }

    pub fn add_vertex(&mut self, ty: &Type) {
        let node = self.intern(ty);
        self.graph.add_node(node);
    }

    /// Adds `sub -> sup` (and both endpoints); returns whether the edge is new.
    pub fn add_edge(&mut self, sub: &Type, sup: &Type) -> bool {
        let a = self.intern(sub);
        let b = self.intern(sup);
        self.graph.add_edge(a, b, ()).is_none()
    }

    pub fn remove_edge(&mut self, sub: &Type, sup: &Type) -> bool {
        match (self.node(sub), self.node(sup)) {
            (Some(a), Some(b)) => self.graph.remove_edge(a, b).is_some(),
            _ => false,
        }
    }

    /// Removes the vertex together with its incident edges.
    pub fn remove_vertex(&mut self, ty: &Type) -> bool {
        match self.node(ty) {
            Some(node) => self.graph.remove_node(node),
            None => false,
        }
    }

    #[must_use]
    pub fn contains_vertex(&self, ty: &Type) -> bool {
        self.node(ty).is_some()
    }

    #[must_use]
    pub fn contains_edge(&self, sub: &Type, sup: &Type) -> bool {
        match (self.node(sub), self.node(sup)) {
            (Some(a), Some(b)) => self.graph.contains_edge(a, b),
            _ => false,
        }
    }

    pub fn vertices(&self) -> impl Iterator<Item = &Type> + '_ {
        self.graph.nodes().map(|node| self.ty(node))
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Snapshot of all edges, so callers can mutate the graph while walking it.
    #[must_use]
    pub fn edges(&self) -> Vec<(Type, Type)> {
        self.graph
            .all_edges()
            .map(|(a, b, _)| (self.ty(a).clone(), self.ty(b).clone()))
            .collect()
    }

    /// Edges as subtype constraints, for diagnostics.
    #[must_use]
    pub fn constraints(&self) -> Vec<Constraint> {
        self.edges()
            .into_iter()
            .map(|(sub, sup)| Constraint::subtype(sub, sup))
            .collect()
    }

    fn neighbors(&self, ty: &Type, dir: Direction) -> Vec<Type> {
        match self.node(ty) {
            Some(node) => self
                .graph
                .neighbors_directed(node, dir)
                .map(|n| self.ty(n).clone())
                .collect(),
            None => Vec::new(),
        }
    }

    #[must_use]
    pub fn successors(&self, ty: &Type) -> Vec<Type> {
        self.neighbors(ty, Direction::Outgoing)
    }

    #[must_use]
    pub fn predecessors(&self, ty: &Type) -> Vec<Type> {
        self.neighbors(ty, Direction::Incoming)
    }

    #[must_use]
    pub fn out_degree(&self, ty: &Type) -> usize {
        self.node(ty).map_or(0, |node| {
            self.graph
                .neighbors_directed(node, Direction::Outgoing)
                .count()
        })
    }

    #[must_use]
    pub fn is_cyclic(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Every vertex reachable from `ty` through one or more edges.
    #[must_use]
    pub fn reachable_from(&self, ty: &Type) -> IndexSet<Type> {
        let mut out = IndexSet::new();
        let Some(start) = self.node(ty) else {
            return out;
        };
        for succ in self.graph.neighbors_directed(start, Direction::Outgoing) {
            let mut dfs = Dfs::new(&self.graph, succ);
            while let Some(node) = dfs.next(&self.graph) {
                out.insert(self.ty(node).clone());
            }
        }
        out
    }

    /// Weakly connected component containing `ty`, as a separate graph.
    #[must_use]
    pub fn component(&self, ty: &Type) -> TypeGraph {
        let mut out = TypeGraph::new();
        let Some(start) = self.node(ty) else {
            return out;
        };
        let mut seen = IndexSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(node) = queue.pop_front() {
            let around = self
                .graph
                .neighbors_directed(node, Direction::Outgoing)
                .chain(self.graph.neighbors_directed(node, Direction::Incoming));
            for next in around {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        for &node in &seen {
            out.add_vertex(self.ty(node));
        }
        for &node in &seen {
            for succ in self.graph.neighbors_directed(node, Direction::Outgoing) {
                out.add_edge(self.ty(node), self.ty(succ));
            }
        }
        out
    }
}
