use crate::jvm::code::{InstructionSink, Opcode, Size, StackSize};

/// Throw the reference on top of the operand stack
///
/// The thrown value is consumed and control does not fall through, so
/// nothing is pushed back.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Throw;

impl Throw {
    pub const fn size(self) -> Size {
        StackSize::Single.to_decreasing_size()
    }

    pub fn apply(self, sink: &mut dyn InstructionSink) -> Size {
        sink.visit_insn(Opcode::Athrow);
        self.size()
    }
}
