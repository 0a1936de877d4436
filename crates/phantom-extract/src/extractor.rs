use std::collections::HashMap;

use phantom_flow::{
    analyze, AnalyzerError, Analysis, ArrayKind, CompoundValue, FieldOp, Frame, Insn, InvokeOp,
    LabelId, MethodBody, MethodSignature, ValueKind,
};
use phantom_hierarchy::{ClassHierarchy, Subtyping};
use phantom_solver::ConstraintSink;
use phantom_types::{MethodDescriptor, Type};

use crate::assign::Assignments;
use crate::error::{ExtractError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Use local variable tables to constrain loads and stores of declared
    /// locals. Obfuscated code often carries bogus tables.
    pub trust_local_variable_tables: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            trust_local_variable_tables: true,
        }
    }
}

/// Identifies the method whose body is being visited.
#[derive(Debug, Clone, Copy)]
pub struct MethodRef<'a> {
    pub owner: &'a Type,
    pub name: &'a str,
    pub descriptor: &'a MethodDescriptor,
    pub is_static: bool,
}

/// Walks method bodies and feeds every assignment they perform to a
/// constraint sink.
#[derive(Debug)]
pub struct ConstraintExtractor<'h, S> {
    assignments: Assignments<'h>,
    sink: S,
    options: ExtractOptions,
    methods: usize,
}

impl<'h, S: ConstraintSink> ConstraintExtractor<'h, S> {
    pub fn new(hierarchy: &'h ClassHierarchy, sink: S, options: ExtractOptions) -> Self {
        Self {
            assignments: Assignments::new(hierarchy),
            sink,
            options,
            methods: 0,
        }
    }

    /// Number of method bodies visited so far.
    #[must_use]
    pub fn methods_visited(&self) -> usize {
        self.methods
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Analyzes `body` and emits its constraints. Failures carry the owning
    /// class and method, and the instruction when one is to blame.
    pub fn extract_method(&mut self, method: MethodRef<'_>, body: &MethodBody) -> Result<()> {
        tracing::debug!(
            class = %method.owner,
            method = method.name,
            descriptor = %method.descriptor,
            "extracting constraints"
        );
        self.methods += 1;

        let signature = MethodSignature {
            owner: method.owner,
            is_static: method.is_static,
            descriptor: method.descriptor,
        };
        let analysis = analyze(signature, body).map_err(|err| {
            ExtractError::from(err).in_method(method.owner, method.name, method.descriptor, None)
        })?;

        let mut walk = MethodWalk::new(self, method, body, &analysis);
        walk.run().map_err(|(insn, err)| {
            err.in_method(method.owner, method.name, method.descriptor, insn)
        })
    }
}

#[derive(Debug, Clone)]
enum LocalChange {
    Declare { index: u16, ty: Type },
    Forget { index: u16 },
}

struct MethodWalk<'x, 'h, S> {
    assignments: &'x mut Assignments<'h>,
    sink: &'x mut S,
    body: &'x MethodBody,
    analysis: &'x Analysis,
    return_type: Option<Type>,
    /// Declared types of the receiver and parameters, by slot.
    params: HashMap<u16, Type>,
    /// Local variable table entries currently in scope.
    declarations: HashMap<u16, Type>,
    changes: HashMap<LabelId, Vec<LocalChange>>,
}

type Step<T = ()> = std::result::Result<T, (Option<usize>, ExtractError)>;

impl<'x, 'h, S: ConstraintSink> MethodWalk<'x, 'h, S> {
    fn new(
        extractor: &'x mut ConstraintExtractor<'h, S>,
        method: MethodRef<'_>,
        body: &'x MethodBody,
        analysis: &'x Analysis,
    ) -> Self {
        let mut params = HashMap::new();
        let mut slot = 0u16;
        if !method.is_static {
            params.insert(0, method.owner.clone());
            slot = 1;
        }
        for param in &method.descriptor.params {
            params.insert(slot, param.clone());
            slot = slot.saturating_add(param.size() as u16);
        }

        let mut walk = Self {
            assignments: &mut extractor.assignments,
            sink: &mut extractor.sink,
            body,
            analysis,
            return_type: method.descriptor.return_type.as_type().cloned(),
            params,
            declarations: HashMap::new(),
            changes: HashMap::new(),
        };
        if extractor.options.trust_local_variable_tables {
            walk.schedule_locals();
        }
        walk
    }

    fn schedule_locals(&mut self) {
        for local in &self.body.local_variables {
            if !self.matches_expected(local.index, &local.descriptor) {
                tracing::warn!(
                    name = %local.name,
                    index = local.index,
                    declared = %local.descriptor,
                    "ignoring local variable entry that contradicts the method signature"
                );
                continue;
            }
            if self.analysis.label_index(local.start).is_none()
                || self.analysis.label_index(local.end).is_none()
            {
                tracing::warn!(name = %local.name, "ignoring local variable entry with unknown labels");
                continue;
            }
            self.changes
                .entry(local.start)
                .or_default()
                .push(LocalChange::Declare {
                    index: local.index,
                    ty: local.descriptor.clone(),
                });
            self.changes
                .entry(local.end)
                .or_default()
                .push(LocalChange::Forget { index: local.index });
        }
        // Scopes ending at a label close before scopes starting there open.
        for changes in self.changes.values_mut() {
            changes.sort_by_key(|change| matches!(change, LocalChange::Declare { .. }));
        }
    }

    /// Whether a type seen in slot `index` agrees with the declared type of
    /// the parameter living there. Slots past the parameters always agree.
    fn matches_expected(&self, index: u16, actual: &Type) -> bool {
        let Some(expected) = self.params.get(&index) else {
            return true;
        };
        if *actual == Type::OBJECT && expected.is_reference() {
            return true;
        }
        self.assignments.snapshot().is_subtype_of(actual, expected) == Subtyping::Holds
    }

    fn run(&mut self) -> Step {
        for tcb in &self.body.try_catch {
            if let Some(catch_type) = &tcb.catch_type {
                self.require(catch_type, &Type::THROWABLE)
                    .map_err(|err| (None, err))?;
            }
        }

        for (index, insn) in self.body.instructions.iter().enumerate() {
            tracing::trace!(index, ?insn, "visiting instruction");
            if let Insn::Label { id } = insn {
                self.apply_changes(*id);
                continue;
            }
            // Unreachable code constrains nothing.
            let Some(frame) = self.analysis.frame(index) else {
                continue;
            };
            self.visit(index, insn, frame).map_err(|err| (Some(index), err))?;
        }
        Ok(())
    }

    fn apply_changes(&mut self, label: LabelId) {
        let Some(changes) = self.changes.remove(&label) else {
            return;
        };
        for change in changes {
            match change {
                LocalChange::Declare { index, ty } => {
                    tracing::trace!(index, %ty, %label, "local variable in scope");
                    self.declarations.insert(index, ty);
                }
                LocalChange::Forget { index } => {
                    self.declarations.remove(&index);
                }
            }
        }
    }

    fn visit(&mut self, index: usize, insn: &Insn, frame: &Frame) -> Result<()> {
        match insn {
            Insn::Athrow => {
                let exception = stack(frame, 0, index)?;
                self.require_value(exception, &Type::THROWABLE)?;
            }
            Insn::Return {
                kind: Some(ValueKind::Reference),
            } => {
                let Some(return_type) = self.return_type.clone() else {
                    return Err(AnalyzerError::MalformedOperand {
                        insn: index,
                        detail: "areturn in a method returning void".into(),
                    }
                    .into());
                };
                let value = stack(frame, 0, index)?;
                self.require_value(value, &return_type)?;
            }
            Insn::ArrayStore {
                kind: ArrayKind::Reference,
            } => self.visit_aastore(index, frame)?,
            Insn::Load {
                kind: ValueKind::Reference,
                var,
            } => {
                if let Some(value) = frame.local(usize::from(*var)) {
                    self.require_declared(*var, value)?;
                }
            }
            Insn::Store {
                kind: ValueKind::Reference,
                var,
            } => {
                let value = stack(frame, 0, index)?;
                self.require_declared(*var, value)?;
            }
            Insn::Field {
                field,
                owner,
                descriptor,
                ..
            } => match field {
                FieldOp::Getstatic => {}
                FieldOp::Getfield => {
                    self.require_value(stack(frame, 0, index)?, owner)?;
                }
                FieldOp::Putfield => {
                    self.require_value(stack(frame, 1, index)?, owner)?;
                    self.require_value(stack(frame, 0, index)?, descriptor)?;
                }
                FieldOp::Putstatic => {
                    self.require_value(stack(frame, 0, index)?, descriptor)?;
                }
            },
            Insn::Invoke {
                invoke,
                owner,
                name,
                descriptor,
            } => {
                // Arguments sit on the stack in reverse, the last one on top.
                let mut depth = 0;
                for param in descriptor.params.iter().rev() {
                    self.require_value(stack(frame, depth, index)?, param)?;
                    depth += 1;
                }
                let constrains_receiver = match invoke {
                    InvokeOp::Virtual | InvokeOp::Interface => true,
                    InvokeOp::Special => name == "<init>",
                    InvokeOp::Static => false,
                };
                if constrains_receiver {
                    self.require_value(stack(frame, depth, index)?, owner)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// `aastore`: a declared local that holds the stored value must fit the
    /// component type of the array.
    fn visit_aastore(&mut self, index: usize, frame: &Frame) -> Result<()> {
        let value = stack(frame, 0, index)?;
        let array = stack(frame, 2, index)?;

        let CompoundValue::Reference(arrays) = array else {
            return Ok(());
        };
        if arrays.len() != 1 || !value.is_reference() || value.is_null() {
            return Ok(());
        }
        let Some(component) = arrays.iter().next().and_then(Type::component).cloned() else {
            return Ok(());
        };

        let declared: Vec<Type> = frame
            .locals()
            .iter()
            .enumerate()
            .filter(|(_, local)| *local == value)
            .filter_map(|(slot, _)| {
                u16::try_from(slot)
                    .ok()
                    .and_then(|slot| self.declarations.get(&slot).cloned())
            })
            .collect();
        for ty in declared {
            self.require(&ty, &component)?;
        }
        Ok(())
    }

    /// Loads and stores of a local in scope of a table entry: every type the
    /// slot may hold must fit the declared type.
    fn require_declared(&mut self, var: u16, value: &CompoundValue) -> Result<()> {
        let Some(declared) = self.declarations.get(&var).cloned() else {
            return Ok(());
        };
        for actual in value.basic_types() {
            if self.matches_expected(var, &declared) && self.matches_expected(var, &actual) {
                self.require(&actual, &declared)?;
            } else {
                tracing::debug!(
                    var,
                    %declared,
                    %actual,
                    "local variable type disagrees with its declaration, ignoring it"
                );
            }
        }
        Ok(())
    }

    fn require_value(&mut self, value: &CompoundValue, to: &Type) -> Result<()> {
        for from in value.basic_types() {
            self.require(&from, to)?;
        }
        Ok(())
    }

    fn require(&mut self, from: &Type, to: &Type) -> Result<()> {
        self.assignments.require(from, to, &mut *self.sink)
    }
}

fn stack(frame: &Frame, depth: usize, insn: usize) -> Result<&CompoundValue> {
    frame
        .peek(depth)
        .ok_or(ExtractError::Analyzer(AnalyzerError::StackUnderflow { insn }))
}
