use crate::jvm::code::{
    FrameDirective, InstructionSink, Label, LoadableConstant, Opcode, StackSize,
};
use crate::jvm::{BinaryName, Error, FieldType, MethodDescriptor, UnqualifiedName};
use crate::util::Width;
use log::debug;
use std::collections::HashMap;

/// An instruction sink wrapper that knows the contents of the operand stack
/// at all times, along with the next unused index of the local variable
/// array
///
/// As instructions pass through, the tracked slot-size sequence is updated
/// from each instruction's stack effect; callers never declare effects
/// manually. Divergent control flow is reconciled through labels: a jump,
/// switch, or exception-handler registration records the slot sequence
/// expected at its target, and placing a label with a recorded sequence
/// resets the tracked state to it. There is no fixed-point pass — the
/// tracker trusts that all paths into a label registered consistent shapes,
/// which is the emitting code's obligation.
///
/// The tracked stack is what makes [`StackTrackingVisitor::drain_stack`] and
/// [`StackTrackingVisitor::drain_stack_keeping_top`] possible: injected code
/// (say, cleanup that must run with an empty stack) can ask for the stack to
/// be reduced to nothing, or to just its topmost value, without knowing what
/// the surrounding code left there.
pub struct StackTrackingVisitor<S> {
    /// Next stage of the sink chain
    inner: S,

    /// Sizes of the values currently on the operand stack, bottom first
    current: Vec<StackSize>,

    /// Slot sequences expected at labels that were branched to but not yet
    /// placed. Last registration for a label wins.
    shapes: HashMap<Label, Vec<StackSize>>,

    /// Lowest local-variable index not used by any store seen so far
    free_index: u16,
}

impl<S: InstructionSink> StackTrackingVisitor<S> {
    /// Wrap a sink, seeding the local-variable watermark
    ///
    /// `initial_frame_size` is the slot footprint of the method's parameters
    /// (including `this` for instance methods); see
    /// [`StackTrackingVisitor::for_method`].
    pub fn new(inner: S, initial_frame_size: u16) -> StackTrackingVisitor<S> {
        StackTrackingVisitor {
            inner,
            current: vec![],
            shapes: HashMap::new(),
            free_index: initial_frame_size,
        }
    }

    /// Wrap a sink for a method with the given descriptor
    pub fn for_method(
        inner: S,
        descriptor: &MethodDescriptor<BinaryName>,
        is_static: bool,
    ) -> StackTrackingVisitor<S> {
        StackTrackingVisitor::new(inner, descriptor.parameter_length(!is_static) as u16)
    }

    /// Sizes of the values currently tracked on the operand stack, bottom
    /// first
    pub fn stack(&self) -> &[StackSize] {
        &self.current
    }

    /// Lowest local-variable index not claimed by the parameters or any
    /// store seen so far
    pub fn free_index(&self) -> u16 {
        self.free_index
    }

    /// Unwrap the inner sink
    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Explicitly record the slot sequence to assume when a label is placed
    pub fn register(&mut self, label: Label, shape: Vec<StackSize>) {
        self.record_shape(label, shape);
    }

    fn record_shape(&mut self, label: Label, shape: Vec<StackSize>) {
        if let Some(previous) = self.shapes.insert(label, shape) {
            if previous != self.shapes[&label] {
                debug!(
                    "stack shape at {:?} re-registered: {:?} -> {:?}",
                    label, previous, self.shapes[&label]
                );
            }
        }
    }

    /// Adjust the tracked stack by a delta, at an offset from the top
    ///
    /// A positive delta inserts one value of that width at the position
    /// found by walking back over `offset` slots of width from the top
    /// (needed by the duplicate-beneath instructions). A negative delta pops
    /// values until their widths cover it; popping may legally underflow
    /// while traversing dead code, and a double popped against a single-slot
    /// request leaves a single behind.
    fn adjust_stack_at(&mut self, delta: i32, offset: usize) {
        if delta > 0 {
            let mut position = self.current.len();
            let mut offset = offset as isize;
            while offset > 0 && position > 0 {
                position -= 1;
                offset -= self.current[position].size() as isize;
            }
            self.current
                .insert(position, StackSize::of_width(delta as usize));
        } else {
            let mut delta = delta;
            while delta < 0 {
                match self.current.pop() {
                    None => return,
                    Some(popped) => delta += popped.size() as i32,
                }
            }
            if delta == 1 {
                self.current.push(StackSize::Single);
            }
        }
    }

    fn adjust_stack(&mut self, delta: i32) {
        self.adjust_stack_at(delta, 0);
    }

    /// Pop every tracked value off the operand stack, top first
    pub fn drain_stack(&mut self) {
        debug!("draining {} stack values", self.current.len());
        for size in std::mem::take(&mut self.current).into_iter().rev() {
            match size {
                StackSize::Zero => {}
                StackSize::Single => self.inner.visit_insn(Opcode::Pop),
                StackSize::Double => self.inner.visit_insn(Opcode::Pop2),
            }
        }
    }

    /// Drain the stack down to only its topmost value
    ///
    /// The top value is stashed into a scratch local-variable slot past the
    /// current watermark, everything beneath it is popped, and the stashed
    /// value is reloaded. Returns the minimal local-variable-array size that
    /// made this safe, or 0 if the stack already held exactly one value of
    /// the requested width and nothing had to be emitted.
    ///
    /// An empty tracked stack means the emitting code miscounted — a value
    /// was expected here — and fails loudly, as does a top value of the
    /// wrong width.
    pub fn drain_stack_keeping_top(
        &mut self,
        store: Opcode,
        load: Opcode,
        size: StackSize,
    ) -> Result<u16, Error> {
        let top = match self.current.last() {
            None => return Err(Error::DrainedValueMissing),
            Some(top) => *top,
        };
        let difference = top.size() as i32 - size.size() as i32;
        if self.current.len() == 1 && difference == 0 {
            return Ok(0);
        }
        if !(0..=1).contains(&difference) {
            return Err(Error::DrainedStackMismatch {
                expected: size,
                found: top,
            });
        }

        debug!(
            "draining {} stack values below the top into local {}",
            self.current.len() - 1,
            self.free_index
        );
        self.inner.visit_var_insn(store, self.free_index);
        if difference == 1 {
            self.inner.visit_insn(Opcode::Pop);
        }
        for below in self.current[..self.current.len() - 1].iter().rev() {
            match below {
                StackSize::Zero => {}
                StackSize::Single => self.inner.visit_insn(Opcode::Pop),
                StackSize::Double => self.inner.visit_insn(Opcode::Pop2),
            }
        }
        self.inner.visit_var_insn(load, self.free_index);

        self.current.clear();
        self.current.push(size);
        Ok(self.free_index + size.size() as u16)
    }
}

impl<S: InstructionSink> InstructionSink for StackTrackingVisitor<S> {
    fn fresh_label(&mut self) -> Label {
        self.inner.fresh_label()
    }

    fn visit_insn(&mut self, opcode: Opcode) {
        match opcode {
            Opcode::Athrow => self.current.clear(),
            op if op.is_return() => self.current.clear(),

            // Duplicates inserted beneath other values
            Opcode::DupX1 | Opcode::Dup2X1 => {
                let delta = opcode.stack_delta().unwrap_or(0);
                self.adjust_stack_at(delta, delta as usize + 1);
            }
            Opcode::DupX2 | Opcode::Dup2X2 => {
                let delta = opcode.stack_delta().unwrap_or(0);
                self.adjust_stack_at(delta, delta as usize + 2);
            }

            // Width-changing conversions pop and push discretely, since the
            // interim states differ from a single signed delta
            Opcode::D2i | Opcode::D2f | Opcode::L2i | Opcode::L2f => {
                self.adjust_stack(-2);
                self.adjust_stack(1);
            }
            Opcode::I2d | Opcode::I2l | Opcode::F2d | Opcode::F2l => {
                self.adjust_stack(-1);
                self.adjust_stack(2);
            }

            // Wide array reads swap an array + index pair for a wide value
            Opcode::Laload | Opcode::Daload => {
                self.adjust_stack(-2);
                self.adjust_stack(2);
            }

            _ => {
                // Operand-dependent instructions arrive through their
                // dedicated visit methods, so the static delta is available
                self.adjust_stack(opcode.stack_delta().unwrap_or(0));
            }
        }
        self.inner.visit_insn(opcode);
    }

    fn visit_int_insn(&mut self, opcode: Opcode, operand: i32) {
        self.adjust_stack(opcode.stack_delta().unwrap_or(0));
        self.inner.visit_int_insn(opcode, operand);
    }

    fn visit_var_insn(&mut self, opcode: Opcode, variable: u16) {
        match opcode {
            Opcode::Istore | Opcode::Fstore | Opcode::Astore => {
                self.free_index = self.free_index.max(variable + 1);
            }
            Opcode::Lstore | Opcode::Dstore => {
                self.free_index = self.free_index.max(variable + 2);
            }
            Opcode::Ret => self.current.clear(),
            _ => {}
        }
        self.adjust_stack(opcode.stack_delta().unwrap_or(0));
        self.inner.visit_var_insn(opcode, variable);
    }

    fn visit_type_insn(&mut self, opcode: Opcode, class: &BinaryName) {
        self.adjust_stack(opcode.stack_delta().unwrap_or(0));
        self.inner.visit_type_insn(opcode, class);
    }

    fn visit_field_insn(
        &mut self,
        opcode: Opcode,
        owner: &BinaryName,
        name: &UnqualifiedName,
        descriptor: &FieldType<BinaryName>,
    ) {
        let width = descriptor.width() as i32;
        match opcode {
            Opcode::Getfield => {
                self.adjust_stack(-1);
                self.adjust_stack(width);
            }
            Opcode::Getstatic => self.adjust_stack(width),
            Opcode::Putfield => self.adjust_stack(-width - 1),
            Opcode::Putstatic => self.adjust_stack(-width),
            _ => panic!("not a field access instruction: {:?}", opcode),
        }
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
        let has_this = !matches!(opcode, Opcode::Invokestatic);
        self.adjust_stack(-(descriptor.parameter_length(has_this) as i32));
        self.adjust_stack(descriptor.return_width() as i32);
        self.inner
            .visit_method_insn(opcode, owner, name, descriptor, is_interface);
    }

    fn visit_invoke_dynamic_insn(
        &mut self,
        name: &UnqualifiedName,
        descriptor: &MethodDescriptor<BinaryName>,
        bootstrap_method: u16,
    ) {
        self.adjust_stack(-(descriptor.parameter_length(false) as i32));
        self.adjust_stack(descriptor.return_width() as i32);
        self.inner
            .visit_invoke_dynamic_insn(name, descriptor, bootstrap_method);
    }

    fn visit_ldc_insn(&mut self, constant: &LoadableConstant) {
        self.adjust_stack(constant.width() as i32);
        self.inner.visit_ldc_insn(constant);
    }

    fn visit_iinc_insn(&mut self, variable: u16, increment: i16) {
        self.inner.visit_iinc_insn(variable, increment);
    }

    fn visit_jump_insn(&mut self, opcode: Opcode, target: Label) {
        self.adjust_stack(opcode.stack_delta().unwrap_or(0));
        let mut shape = self.current.clone();
        if matches!(opcode, Opcode::Jsr | Opcode::JsrW) {
            // The subroutine sees its return address on top of the stack
            shape.push(StackSize::Single);
        }
        self.record_shape(target, shape);
        if matches!(opcode, Opcode::Goto | Opcode::GotoW) {
            // Code after an unconditional transfer is unreachable until a
            // label re-establishes a known state
            self.current.clear();
        }
        self.inner.visit_jump_insn(opcode, target);
    }

    fn visit_label(&mut self, label: Label) {
        if let Some(shape) = self.shapes.get(&label) {
            self.current = shape.clone();
        }
        self.inner.visit_label(label);
    }

    fn visit_table_switch_insn(&mut self, low: i32, high: i32, default: Label, targets: &[Label]) {
        self.adjust_stack(-1);
        let shape = self.current.clone();
        self.record_shape(default, shape.clone());
        for target in targets {
            self.record_shape(*target, shape.clone());
        }
        self.inner
            .visit_table_switch_insn(low, high, default, targets);
    }

    fn visit_lookup_switch_insn(&mut self, default: Label, keys: &[i32], targets: &[Label]) {
        self.adjust_stack(-1);
        let shape = self.current.clone();
        self.record_shape(default, shape.clone());
        for target in targets {
            self.record_shape(*target, shape.clone());
        }
        self.inner.visit_lookup_switch_insn(default, keys, targets);
    }

    fn visit_multi_new_array_insn(&mut self, descriptor: &FieldType<BinaryName>, dimensions: u8) {
        self.adjust_stack(1 - dimensions as i32);
        self.inner.visit_multi_new_array_insn(descriptor, dimensions);
    }

    fn visit_try_catch(
        &mut self,
        start: Label,
        end: Label,
        handler: Label,
        catch_type: Option<&BinaryName>,
    ) {
        // The handler is entered with just the caught reference on the stack
        self.record_shape(handler, vec![StackSize::Single]);
        self.inner.visit_try_catch(start, end, handler, catch_type);
    }

    fn visit_frame(&mut self, frame: &FrameDirective) {
        match frame {
            FrameDirective::Same | FrameDirective::Chop(_) | FrameDirective::Append(_) => {
                self.current.clear();
            }
            FrameDirective::Same1(item) => {
                self.current.clear();
                self.current.push(StackSize::of_width(item.width()));
            }
            FrameDirective::Full { stack, .. } => {
                self.current.clear();
                self.current
                    .extend(stack.iter().map(|item| StackSize::of_width(item.width())));
            }
        }
        self.inner.visit_frame(frame);
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
