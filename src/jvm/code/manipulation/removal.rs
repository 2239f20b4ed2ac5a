use crate::jvm::code::{InstructionSink, Opcode, Size, StackSize};

/// Remove the value on top of the operand stack
///
/// Like duplication, the `Zero` variant emits nothing at all.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Removal {
    Zero,
    Single,
    Double,
}

impl Removal {
    /// Removal for a value of the given width
    pub const fn of(size: StackSize) -> Removal {
        match size {
            StackSize::Zero => Removal::Zero,
            StackSize::Single => Removal::Single,
            StackSize::Double => Removal::Double,
        }
    }

    pub const fn size(self) -> Size {
        match self {
            Removal::Zero => Size::ZERO,
            Removal::Single => StackSize::Single.to_decreasing_size(),
            Removal::Double => StackSize::Double.to_decreasing_size(),
        }
    }

    pub fn apply(self, sink: &mut dyn InstructionSink) -> Size {
        match self {
            Removal::Zero => {}
            Removal::Single => sink.visit_insn(Opcode::Pop),
            Removal::Double => sink.visit_insn(Opcode::Pop2),
        }
        self.size()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::recording::{Event, RecordingSink};

    #[test]
    fn zero_removal_emits_nothing() {
        let mut sink = RecordingSink::new();
        assert_eq!(Removal::of(StackSize::Zero).apply(&mut sink), Size::ZERO);
        assert!(sink.events.is_empty());
    }

    #[test]
    fn removal_instructions() {
        let mut sink = RecordingSink::new();
        assert_eq!(
            Removal::of(StackSize::Single).apply(&mut sink),
            Size::new(-1, 0)
        );
        assert_eq!(
            Removal::of(StackSize::Double).apply(&mut sink),
            Size::new(-2, 0)
        );
        assert_eq!(
            sink.events,
            vec![Event::Insn(Opcode::Pop), Event::Insn(Opcode::Pop2)]
        );
    }
}
