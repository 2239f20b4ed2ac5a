use crate::jvm::code::{InstructionSink, LoadableConstant, Opcode, Size, StackSize};

/// Push an `int` constant, using the shortest encoding available
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct IntegerConstant {
    value: i32,
}

impl IntegerConstant {
    pub const fn new(value: i32) -> IntegerConstant {
        IntegerConstant { value }
    }

    pub const fn size(self) -> Size {
        StackSize::Single.to_increasing_size()
    }

    pub fn apply(self, sink: &mut dyn InstructionSink) -> Size {
        match self.value {
            -1 => sink.visit_insn(Opcode::IconstM1),
            0 => sink.visit_insn(Opcode::Iconst0),
            1 => sink.visit_insn(Opcode::Iconst1),
            2 => sink.visit_insn(Opcode::Iconst2),
            3 => sink.visit_insn(Opcode::Iconst3),
            4 => sink.visit_insn(Opcode::Iconst4),
            5 => sink.visit_insn(Opcode::Iconst5),
            value if i8::try_from(value).is_ok() => sink.visit_int_insn(Opcode::Bipush, value),
            value if i16::try_from(value).is_ok() => sink.visit_int_insn(Opcode::Sipush, value),
            value => sink.visit_ldc_insn(&LoadableConstant::Integer(value)),
        }
        self.size()
    }
}

/// Push a `long` constant
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct LongConstant {
    value: i64,
}

impl LongConstant {
    pub const fn new(value: i64) -> LongConstant {
        LongConstant { value }
    }

    pub const fn size(self) -> Size {
        StackSize::Double.to_increasing_size()
    }

    pub fn apply(self, sink: &mut dyn InstructionSink) -> Size {
        match self.value {
            0 => sink.visit_insn(Opcode::Lconst0),
            1 => sink.visit_insn(Opcode::Lconst1),
            value => sink.visit_ldc_insn(&LoadableConstant::Long(value)),
        }
        self.size()
    }
}

/// Push a `float` constant
///
/// The short encodings are only used for exact bit patterns: `-0.0` is not
/// `fconst_0` even though it compares equal to `0.0`.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct FloatConstant {
    value: f32,
}

impl FloatConstant {
    pub const fn new(value: f32) -> FloatConstant {
        FloatConstant { value }
    }

    pub const fn size(self) -> Size {
        StackSize::Single.to_increasing_size()
    }

    pub fn apply(self, sink: &mut dyn InstructionSink) -> Size {
        if self.value.to_bits() == 0.0f32.to_bits() {
            sink.visit_insn(Opcode::Fconst0);
        } else if self.value.to_bits() == 1.0f32.to_bits() {
            sink.visit_insn(Opcode::Fconst1);
        } else if self.value.to_bits() == 2.0f32.to_bits() {
            sink.visit_insn(Opcode::Fconst2);
        } else {
            sink.visit_ldc_insn(&LoadableConstant::Float(self.value));
        }
        self.size()
    }
}

/// Push a `double` constant
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct DoubleConstant {
    value: f64,
}

impl DoubleConstant {
    pub const fn new(value: f64) -> DoubleConstant {
        DoubleConstant { value }
    }

    pub const fn size(self) -> Size {
        StackSize::Double.to_increasing_size()
    }

    pub fn apply(self, sink: &mut dyn InstructionSink) -> Size {
        if self.value.to_bits() == 0.0f64.to_bits() {
            sink.visit_insn(Opcode::Dconst0);
        } else if self.value.to_bits() == 1.0f64.to_bits() {
            sink.visit_insn(Opcode::Dconst1);
        } else {
            sink.visit_ldc_insn(&LoadableConstant::Double(self.value));
        }
        self.size()
    }
}
