use crate::jvm::code::{InstructionSink, Opcode, Size, StackSize};
use crate::jvm::Error;

/// Duplicate the value on top of the operand stack
///
/// The size to duplicate is chosen by inspecting the value's type at the call
/// site. The `Zero` variant is a true no-op: it must not emit a placeholder
/// instruction, since any extra instruction would corrupt frame computation.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Duplication {
    Zero,
    Single,
    Double,
}

impl Duplication {
    /// Duplication for a value of the given width
    pub const fn of(size: StackSize) -> Duplication {
        match size {
            StackSize::Zero => Duplication::Zero,
            StackSize::Single => Duplication::Single,
            StackSize::Double => Duplication::Double,
        }
    }

    /// The width this duplication copies
    pub const fn duplicated(self) -> StackSize {
        match self {
            Duplication::Zero => StackSize::Zero,
            Duplication::Single => StackSize::Single,
            Duplication::Double => StackSize::Double,
        }
    }

    pub const fn size(self) -> Size {
        self.duplicated().to_increasing_size()
    }

    /// Duplicate the top value beneath the value that sits under it
    ///
    /// A zero-sized value cannot be duplicated and nothing can be flipped
    /// beneath one.
    pub fn flip_over(self, beneath: StackSize) -> Result<FlippingDuplication, Error> {
        match (self, beneath) {
            (Duplication::Single, StackSize::Single) => Ok(FlippingDuplication::SingleBelowSingle),
            (Duplication::Single, StackSize::Double) => Ok(FlippingDuplication::SingleBelowDouble),
            (Duplication::Double, StackSize::Single) => Ok(FlippingDuplication::DoubleBelowSingle),
            (Duplication::Double, StackSize::Double) => Ok(FlippingDuplication::DoubleBelowDouble),
            (Duplication::Zero, _) | (_, StackSize::Zero) => Err(Error::IllegalDuplicationFlip),
        }
    }

    pub fn apply(self, sink: &mut dyn InstructionSink) -> Size {
        match self {
            Duplication::Zero => {}
            Duplication::Single => sink.visit_insn(Opcode::Dup),
            Duplication::Double => sink.visit_insn(Opcode::Dup2),
        }
        self.size()
    }
}

/// Duplicate the top value and insert the copy beneath the value under it
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum FlippingDuplication {
    SingleBelowSingle,
    SingleBelowDouble,
    DoubleBelowSingle,
    DoubleBelowDouble,
}

impl FlippingDuplication {
    const fn opcode(self) -> Opcode {
        match self {
            FlippingDuplication::SingleBelowSingle => Opcode::DupX1,
            FlippingDuplication::SingleBelowDouble => Opcode::DupX2,
            FlippingDuplication::DoubleBelowSingle => Opcode::Dup2X1,
            FlippingDuplication::DoubleBelowDouble => Opcode::Dup2X2,
        }
    }

    pub const fn size(self) -> Size {
        match self {
            FlippingDuplication::SingleBelowSingle | FlippingDuplication::SingleBelowDouble => {
                StackSize::Single.to_increasing_size()
            }
            FlippingDuplication::DoubleBelowSingle | FlippingDuplication::DoubleBelowDouble => {
                StackSize::Double.to_increasing_size()
            }
        }
    }

    pub fn apply(self, sink: &mut dyn InstructionSink) -> Size {
        sink.visit_insn(self.opcode());
        self.size()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::recording::{Event, RecordingSink};

    #[test]
    fn zero_duplication_emits_nothing() {
        let mut sink = RecordingSink::new();
        let size = Duplication::of(StackSize::Zero).apply(&mut sink);
        assert_eq!(size, Size::ZERO);
        assert!(sink.events.is_empty());
    }

    #[test]
    fn duplication_instructions() {
        let mut sink = RecordingSink::new();
        assert_eq!(
            Duplication::of(StackSize::Single).apply(&mut sink),
            Size::new(1, 1)
        );
        assert_eq!(
            Duplication::of(StackSize::Double).apply(&mut sink),
            Size::new(2, 2)
        );
        assert_eq!(
            sink.events,
            vec![Event::Insn(Opcode::Dup), Event::Insn(Opcode::Dup2)]
        );
    }

    #[test]
    fn flipped_duplications() {
        let mut sink = RecordingSink::new();
        let flip = Duplication::Single.flip_over(StackSize::Double).unwrap();
        assert_eq!(flip.apply(&mut sink), Size::new(1, 1));
        let flip = Duplication::Double.flip_over(StackSize::Single).unwrap();
        assert_eq!(flip.apply(&mut sink), Size::new(2, 2));
        assert_eq!(
            sink.events,
            vec![Event::Insn(Opcode::DupX2), Event::Insn(Opcode::Dup2X1)]
        );

        assert!(Duplication::Zero.flip_over(StackSize::Single).is_err());
        assert!(Duplication::Single.flip_over(StackSize::Zero).is_err());
    }
}
