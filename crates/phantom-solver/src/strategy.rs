use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use phantom_hierarchy::Kind;
use phantom_types::Type;

use crate::error::{Result, SolverError};
use crate::graph::TypeGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Grey,
    Black,
}

/// Decides which vertices of a constraint graph must be classes, keeping that
/// set as small as possible.
///
/// Kinds only flow along edges where they are forced: a subtype of a class is
/// a class and a supertype of an interface is an interface (or
/// `java/lang/Object`). Whatever is left undecided becomes an interface.
#[derive(Debug, Clone, Default)]
pub struct MinClassesStrategy {
    marks: IndexMap<Type, Kind>,
}

impl MinClassesStrategy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_class(&mut self, ty: &Type) -> Result<()> {
        mark(&mut self.marks, ty, Kind::Class)
    }

    pub fn mark_interface(&mut self, ty: &Type) -> Result<()> {
        mark(&mut self.marks, ty, Kind::Interface)
    }

    #[must_use]
    pub fn kind_of(&self, ty: &Type) -> Option<Kind> {
        self.marks.get(ty).copied()
    }

    /// Vertices of `graph` that must be classes, in vertex order.
    pub fn class_subset(&self, graph: &TypeGraph) -> Result<IndexSet<Type>> {
        let mut walk = Walk {
            graph,
            kinds: self.marks.clone(),
            colors: graph.vertices().map(|v| (v.clone(), Color::White)).collect(),
        };

        for (root, kind) in &self.marks {
            if walk.colors.get(root) == Some(&Color::White) {
                walk.visit(root, *kind)?;
            }
        }

        Ok(graph
            .vertices()
            .filter(|v| walk.kinds.get(*v) == Some(&Kind::Class))
            .cloned()
            .collect())
    }
}

fn mark(marks: &mut IndexMap<Type, Kind>, ty: &Type, kind: Kind) -> Result<()> {
    match marks.get(ty) {
        Some(existing) if *existing != kind => {
            Err(SolverError::ConflictingKind { ty: ty.clone() })
        }
        Some(_) => Ok(()),
        None => {
            marks.insert(ty.clone(), kind);
            Ok(())
        }
    }
}

struct Walk<'g> {
    graph: &'g TypeGraph,
    kinds: IndexMap<Type, Kind>,
    colors: HashMap<Type, Color>,
}

impl Walk<'_> {
    fn visit(&mut self, vertex: &Type, kind: Kind) -> Result<()> {
        self.colors.insert(vertex.clone(), Color::Grey);
        mark(&mut self.kinds, vertex, kind)?;

        // `Object` is a class above every interface; nothing flows through it.
        let next = if *vertex == Type::OBJECT {
            Vec::new()
        } else {
            match kind {
                Kind::Interface => self
                    .graph
                    .successors(vertex)
                    .into_iter()
                    .filter(|sup| *sup != Type::OBJECT)
                    .collect(),
                Kind::Class => self.graph.predecessors(vertex),
            }
        };

        for n in next {
            match self.colors.get(&n).copied().unwrap_or(Color::White) {
                Color::White => self.visit(&n, kind)?,
                Color::Grey => {
                    return Err(SolverError::GraphCycle {
                        remaining: self.graph.constraints(),
                    })
                }
                Color::Black => mark(&mut self.kinds, &n, kind)?,
            }
        }

        self.colors.insert(vertex.clone(), Color::Black);
        Ok(())
    }
}
