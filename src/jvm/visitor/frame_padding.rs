use crate::jvm::code::{
    FrameDirective, InstructionSink, Label, LoadableConstant, Opcode,
};
use crate::jvm::{BinaryName, FieldType, MethodDescriptor, UnqualifiedName};
use log::debug;
use std::collections::HashMap;

/// Where the visitor stands relative to the last explicit frame declaration
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum PaddingState {
    /// No frame has been declared yet
    AwaitingFirstFrame,
    /// A frame was declared and no real instruction has followed it
    FramePending,
    /// The last declared frame has been followed by an instruction
    Normal,
}

/// An instruction sink wrapper that keeps explicit frame declarations apart
///
/// Some verifiers reject two frame declarations for the same bytecode
/// offset. When a second frame arrives before any real instruction followed
/// the first, this visitor injects a `nop` between them, and re-places every
/// label that was emitted in the gap under a fresh synthetic label so that
/// the second frame (and all later ones) can refer to the position after the
/// `nop`. Labels, line numbers, and exception-handler registrations are not
/// instructions and do not count as separation.
pub struct FramePaddingVisitor<S> {
    /// Next stage of the sink chain
    inner: S,

    state: PaddingState,

    /// Labels placed since the pending frame declaration
    gap_labels: Vec<Label>,

    /// Accumulated re-placements, applied to every forwarded frame
    substitutions: HashMap<Label, Label>,
}

impl<S: InstructionSink> FramePaddingVisitor<S> {
    pub fn new(inner: S) -> FramePaddingVisitor<S> {
        FramePaddingVisitor {
            inner,
            state: PaddingState::AwaitingFirstFrame,
            gap_labels: vec![],
            substitutions: HashMap::new(),
        }
    }

    /// Unwrap the inner sink
    pub fn into_inner(self) -> S {
        self.inner
    }

    /// A real instruction separates frames
    fn note_instruction(&mut self) {
        self.state = PaddingState::Normal;
        self.gap_labels.clear();
    }

    fn translate(&self, frame: &FrameDirective) -> FrameDirective {
        if self.substitutions.is_empty() {
            return frame.clone();
        }
        let substitutions = &self.substitutions;
        frame
            .try_map_uninitialized::<Label, std::convert::Infallible, _>(&mut |label| {
                Ok(substitutions.get(label).copied().unwrap_or(*label))
            })
            .unwrap_or_else(|never| match never {})
    }
}

impl<S: InstructionSink> InstructionSink for FramePaddingVisitor<S> {
    fn fresh_label(&mut self) -> Label {
        self.inner.fresh_label()
    }

    fn visit_insn(&mut self, opcode: Opcode) {
        self.note_instruction();
        self.inner.visit_insn(opcode);
    }

    fn visit_int_insn(&mut self, opcode: Opcode, operand: i32) {
        self.note_instruction();
        self.inner.visit_int_insn(opcode, operand);
    }

    fn visit_var_insn(&mut self, opcode: Opcode, variable: u16) {
        self.note_instruction();
        self.inner.visit_var_insn(opcode, variable);
    }

    fn visit_type_insn(&mut self, opcode: Opcode, class: &BinaryName) {
        self.note_instruction();
        self.inner.visit_type_insn(opcode, class);
    }

    fn visit_field_insn(
        &mut self,
        opcode: Opcode,
        owner: &BinaryName,
        name: &UnqualifiedName,
        descriptor: &FieldType<BinaryName>,
    ) {
        self.note_instruction();
        self.inner.visit_field_insn(opcode, owner, name, descriptor);
    }

    fn visit_method_insn(
        &mut self,
        opcode: Opcode,
        owner: &BinaryName,
        name: &UnqualifiedName,
        descriptor: &MethodDescriptor<BinaryName>,
        is_interface: bool,
    ) {
        self.note_instruction();
        self.inner
            .visit_method_insn(opcode, owner, name, descriptor, is_interface);
    }

    fn visit_invoke_dynamic_insn(
        &mut self,
        name: &UnqualifiedName,
        descriptor: &MethodDescriptor<BinaryName>,
        bootstrap_method: u16,
    ) {
        self.note_instruction();
        self.inner
            .visit_invoke_dynamic_insn(name, descriptor, bootstrap_method);
    }

    fn visit_ldc_insn(&mut self, constant: &LoadableConstant) {
        self.note_instruction();
        self.inner.visit_ldc_insn(constant);
    }

    fn visit_iinc_insn(&mut self, variable: u16, increment: i16) {
        self.note_instruction();
        self.inner.visit_iinc_insn(variable, increment);
    }

    fn visit_jump_insn(&mut self, opcode: Opcode, target: Label) {
        self.note_instruction();
        self.inner.visit_jump_insn(opcode, target);
    }

    fn visit_label(&mut self, label: Label) {
        if self.state == PaddingState::FramePending {
            self.gap_labels.push(label);
        }
        self.inner.visit_label(label);
    }

    fn visit_table_switch_insn(&mut self, low: i32, high: i32, default: Label, targets: &[Label]) {
        self.note_instruction();
        self.inner
            .visit_table_switch_insn(low, high, default, targets);
    }

    fn visit_lookup_switch_insn(&mut self, default: Label, keys: &[i32], targets: &[Label]) {
        self.note_instruction();
        self.inner.visit_lookup_switch_insn(default, keys, targets);
    }

    fn visit_multi_new_array_insn(&mut self, descriptor: &FieldType<BinaryName>, dimensions: u8) {
        self.note_instruction();
        self.inner.visit_multi_new_array_insn(descriptor, dimensions);
    }

    fn visit_try_catch(
        &mut self,
        start: Label,
        end: Label,
        handler: Label,
        catch_type: Option<&BinaryName>,
    ) {
        self.inner.visit_try_catch(start, end, handler, catch_type);
    }

    fn visit_frame(&mut self, frame: &FrameDirective) {
        if self.state == PaddingState::FramePending {
            self.inner.visit_insn(Opcode::Nop);
            for label in std::mem::take(&mut self.gap_labels) {
                let fresh = self.inner.fresh_label();
                self.inner.visit_label(fresh);
                self.substitutions.insert(label, fresh);
            }
            debug!("padded adjacent frame declarations with a nop");
        } else {
            self.state = PaddingState::FramePending;
        }
        let translated = self.translate(frame);
        self.inner.visit_frame(&translated);
    }

    fn visit_line_number(&mut self, line: u16, start: Label) {
        self.inner.visit_line_number(line, start);
    }

    fn visit_maxs(&mut self, max_stack: u16, max_locals: u16) {
        self.inner.visit_maxs(max_stack, max_locals);
    }

    fn visit_end(&mut self) {
        self.inner.visit_end();
    }
}
