use indexmap::{IndexMap, IndexSet};
use phantom_hierarchy::{ClassHierarchy, Subtyping, UnmodifiableHierarchy};
use phantom_types::Type;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::constraint::{Constraint, ConstraintSink};
use crate::error::{Result, SolverError};
use crate::graph::TypeGraph;
use crate::layering::LayeringSolver;
use crate::prune::pruned_hierarchy;
use crate::single::{PlacementOrder, SingleInheritanceSolver};
use crate::strategy::MinClassesStrategy;
use crate::synth::{synthesize, validate};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolverOptions {
    /// Single-inheritance placements tried before a crossover conflict is
    /// reported. The first attempt keeps graph order; later ones shuffle the
    /// phantom candidates with a generator seeded from `seed`.
    pub max_placement_attempts: usize,
    pub seed: u64,
    /// Drop interface edges that are implied by other edges.
    pub minimize_interfaces: bool,
    /// Solve against the part of the hierarchy the constraints mention.
    pub prune_hierarchy: bool,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_placement_attempts: 64,
            seed: 0x5eed,
            minimize_interfaces: true,
            prune_hierarchy: true,
        }
    }
}

/// A solved hierarchy: every type of the (pruned) input hierarchy with its
/// declarations untouched, plus every phantom type with a kind, a superclass
/// and its interfaces.
#[derive(Debug, Clone, Serialize)]
pub struct Solution {
    pub hierarchy: UnmodifiableHierarchy,
    /// Types the input hierarchy did not know, in solution order.
    #[serde(with = "phantom_types::internal_name::seq")]
    pub phantoms: Vec<Type>,
    /// Single-inheritance placements it took to find the class tree.
    pub attempts: usize,
}

/// Collects constraints against a ground-truth hierarchy and solves them.
///
/// The hierarchy and the collected constraints are never modified by
/// [`TypeSolver::solve`]; every call works on fresh copies.
#[derive(Debug, Clone)]
pub struct TypeSolver {
    hierarchy: ClassHierarchy,
    options: SolverOptions,
    constraints: IndexSet<Constraint>,
    graph: TypeGraph,
    strategy: MinClassesStrategy,
}

impl ConstraintSink for TypeSolver {
    fn add_constraint(&mut self, constraint: Constraint) -> Result<()> {
        if self.constraints.contains(&constraint) {
            return Ok(());
        }
        tracing::debug!(%constraint, "adding constraint");
        match &constraint {
            Constraint::Subtype { sub, sup } => {
                self.graph.add_edge(sub, sup);
            }
            Constraint::IsaClass { ty } => {
                self.graph.add_vertex(ty);
                self.strategy.mark_class(ty)?;
            }
            Constraint::IsaInterface { ty } => {
                self.graph.add_vertex(ty);
                self.strategy.mark_interface(ty)?;
            }
        }
        self.constraints.insert(constraint);
        Ok(())
    }
}

impl TypeSolver {
    #[must_use]
    pub fn new(hierarchy: ClassHierarchy, options: SolverOptions) -> Self {
        Self {
            hierarchy,
            options,
            constraints: IndexSet::new(),
            graph: TypeGraph::new(),
            strategy: MinClassesStrategy::new(),
        }
    }

    #[must_use]
    pub fn hierarchy(&self) -> &ClassHierarchy {
        &self.hierarchy
    }

    #[must_use]
    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    #[must_use]
    pub fn constraints(&self) -> &IndexSet<Constraint> {
        &self.constraints
    }

    pub fn solve(&self) -> Result<Solution> {
        let hierarchy = if self.options.prune_hierarchy {
            pruned_hierarchy(
                &self.hierarchy,
                self.constraints.iter().flat_map(Constraint::types),
            )?
        } else {
            self.hierarchy.clone()
        };

        let mut graph = self.graph.clone();
        let mut strategy = self.strategy.clone();
        add_hierarchy_edges(&hierarchy, &mut graph, &mut strategy)?;

        let classes = strategy.class_subset(&graph)?;
        let igraph = split_interface_graph(&classes, &mut graph)?;
        tracing::debug!(
            classes = graph.vertex_count(),
            interfaces = igraph.vertex_count(),
            "split constraint graph"
        );

        let (class_solution, attempts) = self.solve_class_graph(&hierarchy, graph)?;
        let iface_solution = self.solve_interface_graph(&hierarchy, igraph)?;

        let solved = synthesize(&classes, &class_solution, &iface_solution)?;
        validate(&hierarchy, &solved)?;

        let phantoms: Vec<Type> = solved
            .types()
            .filter(|ty| !self.hierarchy.contains(ty))
            .cloned()
            .collect();
        tracing::info!(
            phantoms = phantoms.len(),
            constraints = self.constraints.len(),
            attempts,
            "solved phantom hierarchy"
        );
        Ok(Solution {
            hierarchy: solved.freeze(),
            phantoms,
            attempts,
        })
    }

    fn solve_class_graph(
        &self,
        hierarchy: &ClassHierarchy,
        mut graph: TypeGraph,
    ) -> Result<(IndexMap<Type, Type>, usize)> {
        // A known class reaches a supertype only through its declared chain,
        // so every ancestor on that chain must reach it as well.
        for (sub, sup) in graph.edges() {
            let mut source = sub.clone();
            while let Some(info) = hierarchy.get(&source) {
                let Some(parent) = info.superclass.clone() else {
                    return Err(SolverError::UnsatisfiableConstraint {
                        constraint: Constraint::subtype(sub, sup.clone()),
                        reason: format!("the superclass chain ends before reaching `{sup}`"),
                    });
                };
                if parent == sup {
                    break;
                }
                graph.add_edge(&parent, &sup);
                source = parent;
            }
        }

        let max = self.options.max_placement_attempts.max(1);
        let mut attempt = 0;
        loop {
            let order = KnownFirst::new(hierarchy, self.options.seed, attempt);
            match SingleInheritanceSolver::new(Type::OBJECT, order).solve(graph.clone()) {
                Ok(solution) => return Ok((solution, attempt + 1)),
                Err(SolverError::CrossoverConflict {
                    subtype,
                    parent,
                    declared,
                    ..
                }) => {
                    attempt += 1;
                    tracing::debug!(%subtype, %parent, %declared, attempt, "crossover conflict");
                    if attempt >= max {
                        return Err(SolverError::CrossoverConflict {
                            subtype,
                            parent,
                            declared,
                            attempts: attempt,
                        });
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn solve_interface_graph(
        &self,
        hierarchy: &ClassHierarchy,
        mut graph: TypeGraph,
    ) -> Result<IndexMap<Type, Vec<Type>>> {
        let snapshot = hierarchy.snapshot();
        let mut special = IndexSet::new();
        let mut projections = IndexMap::new();

        for (source, target) in graph.edges() {
            let Some(info) = hierarchy.get(&source) else {
                continue;
            };
            if info.interfaces.contains(&target) {
                continue;
            }
            match snapshot.is_subtype_of(&source, &target) {
                Subtyping::Holds => {
                    graph.remove_edge(&source, &target);
                }
                Subtyping::Refuted => {
                    return Err(SolverError::UnsatisfiableConstraint {
                        constraint: Constraint::subtype(source, target),
                        reason: "the supertypes of the subtype are fully known".into(),
                    })
                }
                Subtyping::Undecided => {
                    let closure = snapshot.all_supertypes(&source);
                    let candidates: Vec<Type> = closure.unresolved(hierarchy).cloned().collect();
                    if candidates.is_empty() {
                        return Err(SolverError::UnsatisfiableConstraint {
                            constraint: Constraint::subtype(source, target),
                            reason: "no phantom supertype can carry the edge".into(),
                        });
                    }
                    for candidate in &candidates {
                        graph.add_vertex(candidate);
                    }
                    special.insert((source.clone(), target));
                    projections.insert(source, candidates);
                }
            }
        }

        LayeringSolver::new(special, projections, self.options.minimize_interfaces).solve(
            graph,
            |source, target| {
                hierarchy
                    .get(source)
                    .map_or(true, |info| !info.interfaces.contains(target))
            },
        )
    }
}

/// Seeds the graph with the declarations of every known type.
fn add_hierarchy_edges(
    hierarchy: &ClassHierarchy,
    graph: &mut TypeGraph,
    strategy: &mut MinClassesStrategy,
) -> Result<()> {
    for (ty, info) in hierarchy.iter() {
        graph.add_vertex(ty);
        for iface in &info.interfaces {
            graph.add_edge(ty, iface);
            strategy.mark_interface(iface)?;
        }
        if info.interface {
            strategy.mark_interface(ty)?;
        } else {
            strategy.mark_class(ty)?;
        }
        if let Some(sup) = &info.superclass {
            graph.add_edge(ty, sup);
            strategy.mark_class(sup)?;
        }
    }
    Ok(())
}

/// Moves every edge into an interface, and every interface vertex, out of
/// `graph` into a separate interface graph. Edges from interfaces to
/// `java/lang/Object` carry no information and are dropped.
fn split_interface_graph(classes: &IndexSet<Type>, graph: &mut TypeGraph) -> Result<TypeGraph> {
    let mut igraph = TypeGraph::new();
    for (source, target) in graph.edges() {
        if !classes.contains(&target) {
            igraph.add_edge(&source, &target);
        } else if !classes.contains(&source) {
            if target != Type::OBJECT {
                return Err(SolverError::InvariantViolation {
                    ty: source,
                    detail: format!("interface would extend class `{target}`"),
                });
            }
        } else {
            continue;
        }
        graph.remove_edge(&source, &target);
    }

    let interfaces: Vec<Type> = graph
        .vertices()
        .filter(|v| !classes.contains(*v))
        .cloned()
        .collect();
    for v in &interfaces {
        graph.remove_vertex(v);
        igraph.add_vertex(v);
    }
    Ok(igraph)
}

/// Places known classes first and refuses to put them anywhere but under
/// their declared superclass. Phantoms follow in graph order on the first
/// attempt and in a seeded random order afterwards.
struct KnownFirst<'h> {
    hierarchy: &'h ClassHierarchy,
    rng: Option<ChaCha8Rng>,
}

impl<'h> KnownFirst<'h> {
    fn new(hierarchy: &'h ClassHierarchy, seed: u64, attempt: usize) -> Self {
        let rng = (attempt > 0)
            .then(|| ChaCha8Rng::seed_from_u64(seed.wrapping_add(attempt as u64)));
        Self { hierarchy, rng }
    }
}

impl PlacementOrder for KnownFirst<'_> {
    fn order(&mut self, parent: &Type, unconstrained: Vec<Type>) -> Result<Vec<Type>> {
        let mut ordered = Vec::with_capacity(unconstrained.len());
        let mut phantoms = Vec::new();
        for ty in unconstrained {
            match self.hierarchy.get(&ty) {
                Some(info) => {
                    if let Some(declared) = info.superclass.as_ref().filter(|sc| *sc != parent) {
                        return Err(SolverError::CrossoverConflict {
                            subtype: ty.clone(),
                            parent: parent.clone(),
                            declared: declared.clone(),
                            attempts: 0,
                        });
                    }
                    ordered.push(ty);
                }
                None => phantoms.push(ty),
            }
        }
        if let Some(rng) = self.rng.as_mut() {
            phantoms.shuffle(rng);
        }
        ordered.extend(phantoms);
        Ok(ordered)
    }
}
