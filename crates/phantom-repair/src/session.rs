use indexmap::IndexSet;
use phantom_extract::{ConstraintExtractor, MethodRef};
use phantom_flow::{Constant, FieldOp, Insn, InvokeOp, MethodBody};
use phantom_hierarchy::{ClassHierarchy, Snapshot};
use phantom_solver::{Constraint, ConstraintSink, Solution, TypeSolver};
use phantom_types::{MethodDescriptor, ReturnType, Type};
use serde::Serialize;

use crate::access::{AccessMachines, ClassEvent, MethodEvent};
use crate::config::RepairConfig;
use crate::error::{RepairError, Result};
use crate::flags::{ACC_ABSTRACT, ACC_INTERFACE, ACC_PUBLIC, ACC_STATIC};
use crate::members::{ClassMembers, Lookup};
use crate::model::{AnnotationModel, ArchiveModel, ClassModel, ElementValue};
use crate::pending::pending_methods;
use crate::phantoms::{ClassStub, Patch, Phantoms};

/// Outcome of a successful repair.
#[derive(Debug, Clone, Serialize)]
pub struct RepairReport {
    pub solution: Solution,
    /// One generated class per phantom type.
    pub phantoms: Vec<ClassStub>,
    /// Every constraint the solver was given.
    pub constraints: Vec<Constraint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Stage {
    New,
    Discovered,
    Extracted,
}

/// One repair of one archive: owns the hierarchy, the member table, the
/// phantom registry and the solver.
///
/// The stages run in order; asking for a later stage runs the earlier ones
/// first, and each stage runs at most once.
#[derive(Debug)]
pub struct RepairSession {
    config: RepairConfig,
    archive: ArchiveModel,
    hierarchy: ClassHierarchy,
    members: ClassMembers,
    machines: AccessMachines,
    phantoms: Phantoms,
    solver: TypeSolver,
    stage: Stage,
    solution: Option<Solution>,
}

impl RepairSession {
    pub fn new(config: RepairConfig, archive: ArchiveModel) -> Result<Self> {
        let hierarchy = archive.hierarchy()?;
        let members = ClassMembers::from_archive(&archive);
        let solver = TypeSolver::new(hierarchy.clone(), config.solver.to_options());
        let phantoms = Phantoms::new(&config.output);
        Ok(Self {
            config,
            archive,
            hierarchy,
            members,
            machines: AccessMachines::new(),
            phantoms,
            solver,
            stage: Stage::New,
            solution: None,
        })
    }

    #[must_use]
    pub fn hierarchy(&self) -> &ClassHierarchy {
        &self.hierarchy
    }

    #[must_use]
    pub fn phantoms(&self) -> &Phantoms {
        &self.phantoms
    }

    /// Constraints handed to the solver so far.
    #[must_use]
    pub fn constraints(&self) -> &IndexSet<Constraint> {
        self.solver.constraints()
    }

    /// Finds every phantom type and every member the archive uses on one,
    /// and runs the uses through the access state machines.
    pub fn discover_phantoms(&mut self) -> Result<()> {
        if self.stage >= Stage::Discovered {
            return Ok(());
        }
        let mut discovery = Discovery {
            snapshot: self.hierarchy.snapshot(),
            members: &self.members,
            machines: &mut self.machines,
            phantoms: &mut self.phantoms,
        };
        for ty in self.hierarchy.unknown_types() {
            discovery.phantoms.register(&ty);
        }
        for class in &self.archive.classes {
            tracing::debug!(class = %class.name, "scanning class");
            discovery
                .visit_class(class)
                .map_err(|err| err.in_class(&class.name))?;
        }
        tracing::info!(phantoms = self.phantoms.len(), "discovered phantom types");
        self.stage = Stage::Discovered;
        Ok(())
    }

    /// Collects the constraints of every method body, plus those implied by
    /// declared phantom supertypes and by phantom member uses.
    pub fn extract(&mut self) -> Result<()> {
        self.discover_phantoms()?;
        if self.stage >= Stage::Extracted {
            return Ok(());
        }

        let mut extractor = ConstraintExtractor::new(
            &self.hierarchy,
            &mut self.solver,
            self.config.extract.to_options(),
        );
        for class in &self.archive.classes {
            for method in &class.methods {
                let Some(body) = &method.body else {
                    continue;
                };
                extractor.extract_method(
                    MethodRef {
                        owner: &class.name,
                        name: &method.name,
                        descriptor: &method.descriptor,
                        is_static: method.is_static(),
                    },
                    body,
                )?;
            }
        }
        let methods = extractor.methods_visited();

        // Keeps known subtypes of phantoms in the pruned hierarchy.
        for (ty, info) in self.hierarchy.iter() {
            for sup in info.superclass.iter().chain(&info.interfaces) {
                if !self.hierarchy.contains(sup) {
                    self.solver
                        .add_constraint(Constraint::subtype(ty.clone(), sup.clone()))?;
                }
            }
        }
        for constraint in self.machines.constraints() {
            self.solver.add_constraint(constraint.clone())?;
        }

        tracing::info!(
            methods,
            constraints = self.solver.constraints().len(),
            "extracted constraints"
        );
        self.stage = Stage::Extracted;
        Ok(())
    }

    /// Solves the constraints and shapes the phantom classes after the
    /// solution.
    pub fn solve(&mut self) -> Result<Solution> {
        if let Some(solution) = &self.solution {
            return Ok(solution.clone());
        }
        self.extract()?;
        let solution = self.solver.solve()?;
        self.apply(&solution);
        self.solution = Some(solution.clone());
        Ok(solution)
    }

    pub fn run(&mut self) -> Result<RepairReport> {
        let solution = self.solve()?;
        Ok(RepairReport {
            solution,
            phantoms: self.phantoms.materialize(),
            constraints: self.solver.constraints().iter().cloned().collect(),
        })
    }

    fn apply(&mut self, solution: &Solution) {
        for ty in &solution.phantoms {
            self.phantoms.register(ty);
        }
        let phantoms: Vec<Type> = self.phantoms.types().cloned().collect();
        let is_interface =
            |ty: &Type| solution.hierarchy.get(ty).is_some_and(|info| info.interface);

        for ty in &phantoms {
            let Some(info) = solution.hierarchy.get(ty) else {
                continue;
            };
            if info.interface {
                self.phantoms.patch(ty, Patch::MakeInterface);
            } else if let Some(superclass) = &info.superclass {
                self.phantoms.patch(
                    ty,
                    Patch::SetSuperclass {
                        superclass: superclass.clone(),
                    },
                );
            }
            if !info.interfaces.is_empty() {
                self.phantoms.patch(
                    ty,
                    Patch::AddInterfaces {
                        interfaces: info.interfaces.iter().cloned().collect(),
                    },
                );
            }
        }

        let pending = pending_methods(&solution.hierarchy, &self.members, &self.phantoms);
        for ty in phantoms.iter().filter(|ty| !is_interface(ty)) {
            let Some(methods) = pending.get(ty) else {
                continue;
            };
            for (name, descriptor) in methods {
                tracing::debug!(class = %ty, name = name.as_str(), %descriptor, "adding inherited abstract method");
                self.phantoms.add_method(ty, ACC_PUBLIC, name, descriptor);
            }
        }

        for ty in &phantoms {
            let Some(outer) = outer_class(ty) else {
                continue;
            };
            let access = if is_interface(ty) {
                ACC_PUBLIC | ACC_STATIC | ACC_INTERFACE | ACC_ABSTRACT
            } else {
                ACC_PUBLIC | ACC_STATIC
            };
            let link = Patch::AddInnerClass {
                inner: ty.clone(),
                outer: outer.clone(),
                access,
            };
            if self.phantoms.contains(&outer) {
                self.phantoms.patch(&outer, link.clone());
            }
            self.phantoms.patch(ty, link);
        }
    }
}

/// `a/B$C` is nested in `a/B`.
fn outer_class(ty: &Type) -> Option<Type> {
    let name = ty.internal_name()?;
    let split = name.rfind('$').filter(|&at| at > 0)?;
    Some(Type::object(&name[..split]))
}

struct Discovery<'s> {
    snapshot: Snapshot<'s>,
    members: &'s ClassMembers,
    machines: &'s mut AccessMachines,
    phantoms: &'s mut Phantoms,
}

impl Discovery<'_> {
    fn is_phantom(&self, ty: &Type) -> bool {
        ty.is_object() && !self.snapshot.hierarchy().contains(ty)
    }

    fn note(&mut self, ty: &Type) {
        if self.is_phantom(ty.element()) {
            self.phantoms.register(ty);
        }
    }

    fn note_method_type(&mut self, descriptor: &MethodDescriptor) {
        for ty in descriptor.types() {
            self.note(ty);
        }
    }

    fn visit_annotation(&mut self, annotation: &AnnotationModel) -> Result<()> {
        let ty = &annotation.ty;
        self.note(ty);
        if self.is_phantom(ty) {
            let access = self.machines.class_event(ty, ClassEvent::IsAnnotation);
            self.phantoms.patch(ty, Patch::SetAccess { access });
        }
        for element in &annotation.elements {
            self.visit_element_value(&element.value)?;
            self.annotation_element(ty, &element.name, element.value.value_type())?;
        }
        Ok(())
    }

    fn visit_element_value(&mut self, value: &ElementValue) -> Result<()> {
        match value {
            ElementValue::Const { .. } => {}
            ElementValue::Enum { ty, .. } | ElementValue::Class { class: ty } => self.note(ty),
            ElementValue::Annotation { annotation } => self.visit_annotation(annotation)?,
            ElementValue::Array { component, values } => {
                self.note(component);
                for value in values {
                    self.visit_element_value(value)?;
                }
            }
        }
        Ok(())
    }

    /// An element `name = value` reads the abstract method `name()` of the
    /// annotation type.
    fn annotation_element(&mut self, owner: &Type, name: &str, value_type: Type) -> Result<()> {
        let descriptor = MethodDescriptor {
            params: Vec::new(),
            return_type: ReturnType::Type(value_type),
        };
        let target = if self.is_phantom(owner) {
            owner.clone()
        } else {
            if self.fully_known(owner) {
                return Ok(());
            }
            let hierarchy = self.snapshot.hierarchy();
            match self
                .members
                .lookup_interface_method(hierarchy, owner, name, &descriptor)?
            {
                Lookup::Found { .. } => return Ok(()),
                Lookup::Phantom(phantom) => phantom,
                Lookup::Missing => {
                    return Err(RepairError::MemberLookup {
                        owner: owner.clone(),
                        name: name.to_owned(),
                        descriptor: descriptor.to_string(),
                    })
                }
            }
        };

        let access = self
            .machines
            .invoke(&target, name, &descriptor, MethodEvent::Interface)?;
        tracing::debug!(owner = %target, name, %descriptor, access, "phantom annotation element");
        self.phantoms.add_method(&target, access, name, &descriptor);
        Ok(())
    }

    fn visit_class(&mut self, class: &ClassModel) -> Result<()> {
        for sup in class.superclass.iter().chain(&class.interfaces) {
            self.note(sup);
        }
        for annotation in &class.annotations {
            self.visit_annotation(annotation)?;
        }
        for field in &class.fields {
            self.note(&field.descriptor);
            for annotation in &field.annotations {
                self.visit_annotation(annotation)?;
            }
        }
        for method in &class.methods {
            self.note_method_type(&method.descriptor);
            for exception in &method.exceptions {
                self.note(exception);
            }
            for annotation in &method.annotations {
                self.visit_annotation(annotation)?;
            }
            if let Some(body) = &method.body {
                self.visit_body(body)?;
            }
        }
        Ok(())
    }

    fn visit_body(&mut self, body: &MethodBody) -> Result<()> {
        for tcb in &body.try_catch {
            if let Some(catch_type) = &tcb.catch_type {
                self.note(catch_type);
            }
        }
        for local in &body.local_variables {
            self.note(&local.descriptor);
        }
        for insn in &body.instructions {
            match insn {
                Insn::Ldc {
                    value: Constant::Type(ty),
                } => self.note(ty),
                Insn::Ldc {
                    value: Constant::MethodType(descriptor),
                }
                | Insn::InvokeDynamic { descriptor, .. } => self.note_method_type(descriptor),
                Insn::Field {
                    field,
                    owner,
                    name,
                    descriptor,
                } => {
                    self.note(owner);
                    self.note(descriptor);
                    self.field_use(*field, owner, name, descriptor)?;
                }
                Insn::Invoke {
                    invoke,
                    owner,
                    name,
                    descriptor,
                } => {
                    self.note(owner);
                    self.note_method_type(descriptor);
                    self.method_use(*invoke, owner, name, descriptor)?;
                }
                Insn::New { ty }
                | Insn::Checkcast { ty }
                | Insn::Instanceof { ty }
                | Insn::Multianewarray { ty, .. }
                | Insn::Anewarray { component: ty } => self.note(ty),
                _ => {}
            }
        }
        Ok(())
    }

    /// A known owner whose supertypes are all known declares everything it
    /// can be asked for.
    fn fully_known(&self, owner: &Type) -> bool {
        self.snapshot.all_supertypes(owner).fully_known
    }

    fn field_use(&mut self, op: FieldOp, owner: &Type, name: &str, descriptor: &Type) -> Result<()> {
        if owner.is_array() {
            return Ok(());
        }
        let target = if self.is_phantom(owner) {
            owner.clone()
        } else {
            if self.fully_known(owner) {
                return Ok(());
            }
            let hierarchy = self.snapshot.hierarchy();
            let lookup = if op.is_static() {
                self.members.lookup_static_field(hierarchy, owner, name)?
            } else {
                self.members.lookup_field(hierarchy, owner, name)?
            };
            match lookup {
                Lookup::Found { .. } => return Ok(()),
                Lookup::Phantom(phantom) => phantom,
                Lookup::Missing => {
                    return Err(RepairError::MemberLookup {
                        owner: owner.clone(),
                        name: name.to_owned(),
                        descriptor: descriptor.descriptor(),
                    })
                }
            }
        };

        let access = self.machines.access_field(&target, name, descriptor, op)?;
        tracing::debug!(owner = %target, name, %descriptor, access, "phantom field");
        self.phantoms.add_field(&target, access, name, descriptor);
        Ok(())
    }

    fn method_use(
        &mut self,
        invoke: InvokeOp,
        owner: &Type,
        name: &str,
        descriptor: &MethodDescriptor,
    ) -> Result<()> {
        if owner.is_array() {
            return Ok(());
        }
        let mut event = MethodEvent::from(invoke);
        let target = if self.is_phantom(owner) {
            if invoke == InvokeOp::Interface {
                let access = self.machines.class_event(owner, ClassEvent::IsInterface);
                self.phantoms.patch(owner, Patch::SetAccess { access });
            }
            owner.clone()
        } else {
            if self.fully_known(owner) {
                return Ok(());
            }
            let hierarchy = self.snapshot.hierarchy();
            match self.members.lookup_method(hierarchy, owner, name, descriptor)? {
                Lookup::Found { .. } => return Ok(()),
                Lookup::Phantom(phantom) => phantom,
                Lookup::Missing => {
                    match self
                        .members
                        .lookup_interface_method(hierarchy, owner, name, descriptor)?
                    {
                        Lookup::Found { .. } => return Ok(()),
                        Lookup::Phantom(phantom) => {
                            event = MethodEvent::Interface;
                            phantom
                        }
                        Lookup::Missing => {
                            return Err(RepairError::MemberLookup {
                                owner: owner.clone(),
                                name: name.to_owned(),
                                descriptor: descriptor.to_string(),
                            })
                        }
                    }
                }
            }
        };

        let access = self.machines.invoke(&target, name, descriptor, event)?;
        tracing::debug!(owner = %target, name, %descriptor, access, "phantom method");
        self.phantoms.add_method(&target, access, name, descriptor);
        Ok(())
    }
}
