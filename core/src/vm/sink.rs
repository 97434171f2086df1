//! The instruction sink nodes emit into.

use hashbrown::HashMap;

use crate::{
    String, ToString, Vec,
    errors::CompileError,
    vm::{Code, Instruction, Label},
};

/// Append-only destination for emitted instructions.
///
/// Nodes only ever append: there is no read-back and no patching. Branch
/// targets are expressed as [`Label`]s; resolving them to addresses is the
/// sink's job.
pub trait InstructionSink {
    fn emit(&mut self, instruction: Instruction);

    /// Create a label that is not yet bound to an address.
    fn define_label(&mut self) -> Label;

    /// Bind `label` to the address of the next emitted instruction.
    fn mark_label(&mut self, label: Label);

    /// Index of `value` in the string pool, adding it if needed.
    fn intern_string(&mut self, value: &str) -> u32;
}

/// In-memory sink producing a [`Code`] body.
///
/// Tracks the evaluation stack depth as instructions arrive so the finished
/// code carries an exact `max_stack_size`.
#[derive(Debug, Default)]
pub struct CodeBuffer {
    instructions: Vec<Instruction>,
    labels: Vec<Option<usize>>,
    /// Stack depth expected at each label, recorded by the first branch to it.
    label_depths: Vec<Option<usize>>,
    strings: Vec<String>,
    string_map: HashMap<String, u32>,
    current_stack_depth: usize,
    max_stack_size: usize,
}

impl CodeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn current_stack_depth(&self) -> usize {
        self.current_stack_depth
    }

    /// Resolve labels and hand out the finished body.
    pub fn finish(self) -> Result<Code, CompileError> {
        let labels = self
            .labels
            .iter()
            .enumerate()
            .map(|(index, address)| address.ok_or(CompileError::UnresolvedLabel(index as u32)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Code {
            instructions: self.instructions,
            labels,
            strings: self.strings,
            max_stack_size: self.max_stack_size,
        })
    }

    fn pop_stack_n(&mut self, n: usize) {
        debug_assert!(
            self.current_stack_depth >= n,
            "Stack underflow: trying to pop {} but depth is {}",
            n,
            self.current_stack_depth
        );
        self.current_stack_depth = self.current_stack_depth.saturating_sub(n);
    }

    fn push_stack_n(&mut self, n: usize) {
        self.current_stack_depth += n;
        if self.current_stack_depth > self.max_stack_size {
            self.max_stack_size = self.current_stack_depth;
        }
    }
}

impl InstructionSink for CodeBuffer {
    fn emit(&mut self, instruction: Instruction) {
        let (pops, pushes) = instruction.stack_effect();
        self.pop_stack_n(pops);
        self.push_stack_n(pushes);

        if let Some(Label(target)) = instruction.branch_target() {
            if let Some(depth) = self.label_depths.get_mut(target as usize) {
                depth.get_or_insert(self.current_stack_depth);
            }
        }
        // Whatever follows is only reached through a label, which restores
        // its own depth.
        if instruction.ends_block() {
            self.current_stack_depth = 0;
        }

        self.instructions.push(instruction);
    }

    fn define_label(&mut self) -> Label {
        let label = Label(self.labels.len() as u32);
        self.labels.push(None);
        self.label_depths.push(None);
        label
    }

    fn mark_label(&mut self, label: Label) {
        let index = label.0 as usize;
        if let Some(address) = self.labels.get_mut(index) {
            debug_assert!(address.is_none(), "{:?} marked twice", label);
            *address = Some(self.instructions.len());
        }
        if let Some(Some(depth)) = self.label_depths.get(index) {
            self.current_stack_depth = *depth;
        }
    }

    fn intern_string(&mut self, value: &str) -> u32 {
        if let Some(&index) = self.string_map.get(value) {
            return index;
        }
        let index = self.strings.len() as u32;
        self.strings.push(value.to_string());
        self.string_map.insert(value.to_string(), index);
        index
    }
}
