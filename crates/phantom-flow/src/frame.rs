use crate::error::{AnalyzerError, Result};
use crate::value::CompoundValue;

/// Locals and operand stack before an instruction executes.
///
/// Each stack entry holds one value regardless of its size; longs and doubles
/// take two local slots, the second one `Uninitialized`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    locals: Vec<CompoundValue>,
    stack: Vec<CompoundValue>,
}

impl Frame {
    #[must_use]
    pub fn new(max_locals: usize) -> Self {
        Self {
            locals: vec![CompoundValue::Uninitialized; max_locals],
            stack: Vec::new(),
        }
    }

    #[must_use]
    pub fn locals(&self) -> &[CompoundValue] {
        &self.locals
    }

    #[must_use]
    pub fn local(&self, index: usize) -> Option<&CompoundValue> {
        self.locals.get(index)
    }

    #[must_use]
    pub fn stack(&self) -> &[CompoundValue] {
        &self.stack
    }

    #[must_use]
    pub fn stack_size(&self) -> usize {
        self.stack.len()
    }

    /// Stack entry `depth` positions below the top; `peek(0)` is the top.
    #[must_use]
    pub fn peek(&self, depth: usize) -> Option<&CompoundValue> {
        self.stack
            .len()
            .checked_sub(depth + 1)
            .and_then(|idx| self.stack.get(idx))
    }

    pub(crate) fn push(&mut self, value: CompoundValue) {
        self.stack.push(value);
    }

    pub(crate) fn pop(&mut self, insn: usize) -> Result<CompoundValue> {
        self.stack
            .pop()
            .ok_or(AnalyzerError::StackUnderflow { insn })
    }

    pub(crate) fn pop_n(&mut self, insn: usize, count: usize) -> Result<()> {
        for _ in 0..count {
            self.pop(insn)?;
        }
        Ok(())
    }

    pub(crate) fn clear_stack(&mut self) {
        self.stack.clear();
    }

    /// Sum of value sizes on the stack, as counted against `max_stack`.
    pub(crate) fn stack_slots(&self) -> usize {
        self.stack.iter().map(CompoundValue::size).sum()
    }

    pub(crate) fn load(&self, insn: usize, index: usize) -> Result<CompoundValue> {
        self.locals
            .get(index)
            .cloned()
            .ok_or(AnalyzerError::BadLocal {
                insn,
                index,
                max_locals: self.locals.len(),
            })
    }

    pub(crate) fn store(&mut self, insn: usize, index: usize, value: CompoundValue) -> Result<()> {
        let size = value.size();
        let fits = index
            .checked_add(size)
            .is_some_and(|end| end <= self.locals.len());
        if !fits {
            return Err(AnalyzerError::BadLocal {
                insn,
                index: index.saturating_add(size.saturating_sub(1)),
                max_locals: self.locals.len(),
            });
        }
        // Overwriting the second half of a wide value invalidates its first half.
        if index > 0 && self.locals[index - 1].size() == 2 {
            self.locals[index - 1] = CompoundValue::Uninitialized;
        }
        self.locals[index] = value;
        if size == 2 {
            self.locals[index + 1] = CompoundValue::Uninitialized;
        }
        Ok(())
    }

    /// Merges `other` into `self`; returns whether anything changed.
    pub(crate) fn merge_from(&mut self, other: &Frame, insn: usize) -> Result<bool> {
        if self.stack.len() != other.stack.len() {
            return Err(AnalyzerError::StackHeightMismatch {
                insn,
                expected: self.stack.len(),
                found: other.stack.len(),
            });
        }
        let mut changed = false;
        let slots = self
            .locals
            .iter_mut()
            .zip(&other.locals)
            .chain(self.stack.iter_mut().zip(&other.stack));
        for (mine, theirs) in slots {
            let merged = mine.merge(theirs);
            if merged != *mine {
                *mine = merged;
                changed = true;
            }
        }
        Ok(changed)
    }
}
