use std::collections::{HashMap, VecDeque};

use phantom_types::{BaseType, MethodDescriptor, Type};

use crate::error::{AnalyzerError, Result};
use crate::frame::Frame;
use crate::insn::{ArrayKind, Insn, LabelId, MethodBody};
use crate::value::CompoundValue;

/// What the interpreter needs to know about the analyzed method besides its
/// body: the receiver type and the parameters that seed the entry frame.
#[derive(Debug, Clone, Copy)]
pub struct MethodSignature<'a> {
    pub owner: &'a Type,
    pub is_static: bool,
    pub descriptor: &'a MethodDescriptor,
}

/// Fixed point of the abstract interpretation of one method body.
#[derive(Debug, Clone)]
pub struct Analysis {
    frames: Vec<Option<Frame>>,
    labels: HashMap<LabelId, usize>,
}

impl Analysis {
    /// Frame before instruction `insn`; `None` when the instruction is
    /// unreachable.
    #[must_use]
    pub fn frame(&self, insn: usize) -> Option<&Frame> {
        self.frames.get(insn).and_then(Option::as_ref)
    }

    #[must_use]
    pub fn frames(&self) -> &[Option<Frame>] {
        &self.frames
    }

    #[must_use]
    pub fn label_index(&self, label: LabelId) -> Option<usize> {
        self.labels.get(&label).copied()
    }

    #[must_use]
    pub fn is_reachable(&self, insn: usize) -> bool {
        self.frame(insn).is_some()
    }
}

#[derive(Debug)]
struct Handler {
    start: usize,
    end: usize,
    target: usize,
    exception: CompoundValue,
}

/// Runs the worklist interpretation of `body` to a fixed point.
pub fn analyze(signature: MethodSignature<'_>, body: &MethodBody) -> Result<Analysis> {
    let labels = label_positions(body)?;
    let handlers = resolve_handlers(body, &labels)?;
    let insns = &body.instructions;

    let mut frames: Vec<Option<Frame>> = vec![None; insns.len()];
    if insns.is_empty() {
        return Ok(Analysis { frames, labels });
    }
    frames[0] = Some(entry_frame(signature, usize::from(body.max_locals))?);

    let max_stack = body.max_stack.map(usize::from);
    let mut queued = vec![false; insns.len()];
    let mut worklist = VecDeque::from([0usize]);
    queued[0] = true;
    let mut steps = 0usize;

    while let Some(index) = worklist.pop_front() {
        queued[index] = false;
        steps += 1;
        let Some(before) = frames[index].clone() else {
            continue;
        };

        let insn = &insns[index];
        let mut after = before.clone();
        execute(index, insn, &mut after)?;
        if let Some(max) = max_stack {
            if after.stack_slots() > max {
                return Err(AnalyzerError::StackOverflow { insn: index, max });
            }
        }

        let mut targets = Vec::new();
        if !insn.ends_flow() {
            if index + 1 >= insns.len() {
                return Err(AnalyzerError::FallsOffEnd { insn: index });
            }
            targets.push(index + 1);
        }
        match insn {
            Insn::Jump { target, .. } => targets.push(label_target(&labels, *target)?),
            Insn::Switch { default, targets: cases } => {
                targets.push(label_target(&labels, *default)?);
                for case in cases {
                    targets.push(label_target(&labels, *case)?);
                }
            }
            _ => {}
        }

        for target in targets {
            merge_into(&mut frames, &mut worklist, &mut queued, target, &after)?;
        }

        // Handlers see the locals both before and after the instruction.
        for handler in handlers
            .iter()
            .filter(|handler| (handler.start..handler.end).contains(&index))
        {
            for state in [&before, &after] {
                let mut caught = state.clone();
                caught.clear_stack();
                caught.push(handler.exception.clone());
                merge_into(&mut frames, &mut worklist, &mut queued, handler.target, &caught)?;
            }
        }
    }

    tracing::trace!(
        instructions = insns.len(),
        steps,
        "dataflow reached a fixed point"
    );
    Ok(Analysis { frames, labels })
}

fn merge_into(
    frames: &mut [Option<Frame>],
    worklist: &mut VecDeque<usize>,
    queued: &mut [bool],
    target: usize,
    incoming: &Frame,
) -> Result<()> {
    let changed = if let Some(existing) = frames[target].as_mut() {
        existing.merge_from(incoming, target)?
    } else {
        frames[target] = Some(incoming.clone());
        true
    };
    if changed && !queued[target] {
        queued[target] = true;
        worklist.push_back(target);
    }
    Ok(())
}

fn label_positions(body: &MethodBody) -> Result<HashMap<LabelId, usize>> {
    let mut labels = HashMap::new();
    for (index, insn) in body.instructions.iter().enumerate() {
        if let Insn::Label { id } = insn {
            if labels.insert(*id, index).is_some() {
                return Err(AnalyzerError::DuplicateLabel { label: *id });
            }
        }
    }
    Ok(labels)
}

fn label_target(labels: &HashMap<LabelId, usize>, label: LabelId) -> Result<usize> {
    labels
        .get(&label)
        .copied()
        .ok_or(AnalyzerError::UnknownLabel { label })
}

fn resolve_handlers(body: &MethodBody, labels: &HashMap<LabelId, usize>) -> Result<Vec<Handler>> {
    body.try_catch
        .iter()
        .map(|block| {
            Ok(Handler {
                start: label_target(labels, block.start)?,
                end: label_target(labels, block.end)?,
                target: label_target(labels, block.handler)?,
                exception: CompoundValue::of(block.catch_type.as_ref().unwrap_or(&Type::THROWABLE)),
            })
        })
        .collect()
}

fn entry_frame(signature: MethodSignature<'_>, max_locals: usize) -> Result<Frame> {
    let mut frame = Frame::new(max_locals);
    let mut slot = 0;
    if !signature.is_static {
        frame.store(0, slot, CompoundValue::of(signature.owner))?;
        slot += 1;
    }
    for param in &signature.descriptor.params {
        frame.store(0, slot, CompoundValue::of(param))?;
        slot += param.size();
    }
    Ok(frame)
}

fn require_category1(insn: usize, value: &CompoundValue) -> Result<()> {
    if value.size() != 1 {
        return Err(AnalyzerError::MalformedOperand {
            insn,
            detail: format!("expected a one-slot value, found `{value}`"),
        });
    }
    Ok(())
}

fn pop1(frame: &mut Frame, insn: usize) -> Result<CompoundValue> {
    let value = frame.pop(insn)?;
    require_category1(insn, &value)?;
    Ok(value)
}

fn primitive(base: BaseType) -> CompoundValue {
    CompoundValue::Primitive(base.stack_type())
}

fn execute(index: usize, insn: &Insn, frame: &mut Frame) -> Result<()> {
    match insn {
        Insn::Label { .. } | Insn::LineNumber { .. } | Insn::Frame | Insn::Nop => {}
        Insn::AconstNull => frame.push(CompoundValue::null()),
        Insn::Ldc { value } => frame.push(CompoundValue::of(&value.value_type())),
        Insn::Load { var, .. } => {
            let value = frame.load(index, usize::from(*var))?;
            frame.push(value);
        }
        Insn::Store { var, .. } => {
            let value = frame.pop(index)?;
            frame.store(index, usize::from(*var), value)?;
        }
        Insn::ArrayLoad { kind } => {
            frame.pop(index)?;
            let array = frame.pop(index)?;
            let value = match kind {
                ArrayKind::Reference => array.element(index)?,
                ArrayKind::Long => primitive(BaseType::Long),
                ArrayKind::Float => primitive(BaseType::Float),
                ArrayKind::Double => primitive(BaseType::Double),
                ArrayKind::Int | ArrayKind::Byte | ArrayKind::Char | ArrayKind::Short => {
                    primitive(BaseType::Int)
                }
            };
            frame.push(value);
        }
        Insn::ArrayStore { .. } => frame.pop_n(index, 3)?,
        Insn::Pop => {
            pop1(frame, index)?;
        }
        Insn::Pop2 => {
            if frame.pop(index)?.size() == 1 {
                pop1(frame, index)?;
            }
        }
        Insn::Dup => {
            let v1 = pop1(frame, index)?;
            frame.push(v1.clone());
            frame.push(v1);
        }
        Insn::DupX1 => {
            let v1 = pop1(frame, index)?;
            let v2 = pop1(frame, index)?;
            frame.push(v1.clone());
            frame.push(v2);
            frame.push(v1);
        }
        Insn::DupX2 => {
            let v1 = pop1(frame, index)?;
            let v2 = frame.pop(index)?;
            if v2.size() == 2 {
                frame.push(v1.clone());
                frame.push(v2);
            } else {
                let v3 = pop1(frame, index)?;
                frame.push(v1.clone());
                frame.push(v3);
                frame.push(v2);
            }
            frame.push(v1);
        }
        Insn::Dup2 => {
            let v1 = frame.pop(index)?;
            if v1.size() == 2 {
                frame.push(v1.clone());
            } else {
                let v2 = pop1(frame, index)?;
                frame.push(v2.clone());
                frame.push(v1.clone());
                frame.push(v2);
            }
            frame.push(v1);
        }
        Insn::Dup2X1 => {
            let v1 = frame.pop(index)?;
            if v1.size() == 2 {
                let v2 = pop1(frame, index)?;
                frame.push(v1.clone());
                frame.push(v2);
            } else {
                let v2 = pop1(frame, index)?;
                let v3 = pop1(frame, index)?;
                frame.push(v2.clone());
                frame.push(v1.clone());
                frame.push(v3);
                frame.push(v2);
            }
            frame.push(v1);
        }
        Insn::Dup2X2 => dup2_x2(index, frame)?,
        Insn::Swap => {
            let v1 = pop1(frame, index)?;
            let v2 = pop1(frame, index)?;
            frame.push(v1);
            frame.push(v2);
        }
        Insn::Arith { kind, .. } => {
            frame.pop_n(index, 2)?;
            frame.push(primitive(kind.base_type()));
        }
        Insn::Neg { kind } => {
            frame.pop(index)?;
            frame.push(primitive(kind.base_type()));
        }
        Insn::Iinc { var, .. } => {
            frame.load(index, usize::from(*var))?;
            frame.store(index, usize::from(*var), primitive(BaseType::Int))?;
        }
        Insn::Convert { to, .. } => {
            frame.pop(index)?;
            frame.push(primitive(*to));
        }
        Insn::Compare { .. } => {
            frame.pop_n(index, 2)?;
            frame.push(primitive(BaseType::Int));
        }
        Insn::Jump { jump, .. } => frame.pop_n(index, jump.operands())?,
        Insn::Switch { .. } => {
            frame.pop(index)?;
        }
        Insn::Return { kind } => {
            if kind.is_some() {
                frame.pop(index)?;
            }
        }
        Insn::Field {
            field, descriptor, ..
        } => {
            if field.is_put() {
                frame.pop(index)?;
            }
            if !field.is_static() {
                frame.pop(index)?;
            }
            if !field.is_put() {
                frame.push(CompoundValue::of(descriptor));
            }
        }
        Insn::Invoke {
            invoke, descriptor, ..
        } => {
            frame.pop_n(index, descriptor.params.len())?;
            if invoke.has_receiver() {
                frame.pop(index)?;
            }
            if let Some(ret) = descriptor.return_type.as_type() {
                frame.push(CompoundValue::of(ret));
            }
        }
        Insn::InvokeDynamic { descriptor, .. } => {
            frame.pop_n(index, descriptor.params.len())?;
            if let Some(ret) = descriptor.return_type.as_type() {
                frame.push(CompoundValue::of(ret));
            }
        }
        Insn::New { ty } => frame.push(CompoundValue::of(ty)),
        Insn::NewArray { element } => {
            frame.pop(index)?;
            frame.push(CompoundValue::of(&Type::array_of(Type::Base(*element))));
        }
        Insn::Anewarray { component } => {
            frame.pop(index)?;
            frame.push(CompoundValue::of(&Type::array_of(component.clone())));
        }
        Insn::Multianewarray { ty, dims } => {
            let dims = usize::from(*dims);
            if dims == 0 || dims > ty.dimensions() {
                return Err(AnalyzerError::MalformedOperand {
                    insn: index,
                    detail: format!("cannot allocate {dims} dimensions of `{ty}`"),
                });
            }
            frame.pop_n(index, dims)?;
            frame.push(CompoundValue::of(ty));
        }
        Insn::ArrayLength | Insn::Instanceof { .. } => {
            frame.pop(index)?;
            frame.push(primitive(BaseType::Int));
        }
        Insn::Checkcast { ty } => {
            frame.pop(index)?;
            frame.push(CompoundValue::of(ty));
        }
        Insn::Athrow | Insn::MonitorEnter | Insn::MonitorExit => {
            frame.pop(index)?;
        }
    }
    Ok(())
}

fn dup2_x2(index: usize, frame: &mut Frame) -> Result<()> {
    let v1 = frame.pop(index)?;
    let v2 = frame.pop(index)?;
    match (v1.size(), v2.size()) {
        (2, 2) => {
            frame.push(v1.clone());
            frame.push(v2);
            frame.push(v1);
        }
        (2, _) => {
            let v3 = pop1(frame, index)?;
            frame.push(v1.clone());
            frame.push(v3);
            frame.push(v2);
            frame.push(v1);
        }
        (_, 2) => {
            return Err(AnalyzerError::MalformedOperand {
                insn: index,
                detail: "dup2_x2 splits a wide value".to_string(),
            })
        }
        _ => {
            let v3 = frame.pop(index)?;
            if v3.size() == 2 {
                frame.push(v2.clone());
                frame.push(v1.clone());
                frame.push(v3);
            } else {
                let v4 = pop1(frame, index)?;
                frame.push(v2.clone());
                frame.push(v1.clone());
                frame.push(v4);
                frame.push(v3);
            }
            frame.push(v2);
            frame.push(v1);
        }
    }
    Ok(())
}
