use crate::jvm::code::{InstructionSink, Opcode, Size, StackSize};
use crate::jvm::{BaseType, FieldType};

/// Return from the method, consuming the returned value if there is one
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum MethodReturn {
    Void,
    Integer,
    Long,
    Float,
    Double,
    Reference,
}

impl MethodReturn {
    /// The return matching a method's declared return type (`None` = `void`)
    pub fn of<C>(return_type: Option<&FieldType<C>>) -> MethodReturn {
        match return_type {
            None => MethodReturn::Void,
            Some(FieldType::Ref(_)) => MethodReturn::Reference,
            Some(FieldType::Base(BaseType::Long)) => MethodReturn::Long,
            Some(FieldType::Base(BaseType::Float)) => MethodReturn::Float,
            Some(FieldType::Base(BaseType::Double)) => MethodReturn::Double,
            Some(FieldType::Base(_)) => MethodReturn::Integer,
        }
    }

    const fn opcode(self) -> Opcode {
        match self {
            MethodReturn::Void => Opcode::Return,
            MethodReturn::Integer => Opcode::Ireturn,
            MethodReturn::Long => Opcode::Lreturn,
            MethodReturn::Float => Opcode::Freturn,
            MethodReturn::Double => Opcode::Dreturn,
            MethodReturn::Reference => Opcode::Areturn,
        }
    }

    pub const fn size(self) -> Size {
        match self {
            MethodReturn::Void => Size::ZERO,
            MethodReturn::Integer | MethodReturn::Float | MethodReturn::Reference => {
                StackSize::Single.to_decreasing_size()
            }
            MethodReturn::Long | MethodReturn::Double => StackSize::Double.to_decreasing_size(),
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
    use crate::jvm::BinaryName;

    #[test]
    fn return_for_declared_type() {
        type FT = FieldType<BinaryName>;
        assert_eq!(MethodReturn::of::<BinaryName>(None), MethodReturn::Void);
        assert_eq!(MethodReturn::of(Some(&FT::int())), MethodReturn::Integer);
        assert_eq!(MethodReturn::of(Some(&FT::boolean())), MethodReturn::Integer);
        assert_eq!(MethodReturn::of(Some(&FT::long())), MethodReturn::Long);
        assert_eq!(
            MethodReturn::of(Some(&FT::object(BinaryName::OBJECT))),
            MethodReturn::Reference
        );
    }

    #[test]
    fn return_sizes() {
        let mut sink = RecordingSink::new();
        assert_eq!(MethodReturn::Void.apply(&mut sink), Size::ZERO);
        assert_eq!(MethodReturn::Double.apply(&mut sink), Size::new(-2, 0));
        assert_eq!(MethodReturn::Reference.apply(&mut sink), Size::new(-1, 0));
        assert_eq!(
            sink.events,
            vec![
                Event::Insn(Opcode::Return),
                Event::Insn(Opcode::Dreturn),
                Event::Insn(Opcode::Areturn),
            ]
        );
    }
}
