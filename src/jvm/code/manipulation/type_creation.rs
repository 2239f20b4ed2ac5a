use crate::jvm::code::{InstructionSink, Opcode, Size};
use crate::jvm::{BinaryName, Error, Name, TypeDescription};

/// Allocate an uninitialized instance of a class
///
/// Only concrete, non-array class types can be instantiated; anything else is
/// rejected when the manipulation is constructed, before any instruction is
/// emitted.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct TypeCreation {
    class: BinaryName,
}

impl TypeCreation {
    pub fn of(target: &TypeDescription) -> Result<TypeCreation, Error> {
        if target.is_array()
            || target.is_primitive()
            || target.is_interface()
            || target.is_abstract()
        {
            return Err(Error::InvalidTypeCreation(
                target.internal_name().as_str().to_owned(),
            ));
        }
        Ok(TypeCreation {
            class: target.internal_name().clone(),
        })
    }

    pub const fn size(&self) -> Size {
        Size::new(1, 1)
    }

    pub fn apply(&self, sink: &mut dyn InstructionSink) -> Size {
        sink.visit_type_insn(Opcode::New, &self.class);
        self.size()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::recording::{Event, RecordingSink};
    use crate::jvm::{BaseType, ClassAccessFlags, TypeSort};

    #[test]
    fn concrete_classes_can_be_created() {
        let target = TypeDescription::class(BinaryName::OBJECT, ClassAccessFlags::PUBLIC);
        let creation = TypeCreation::of(&target).unwrap();

        let mut sink = RecordingSink::new();
        assert_eq!(creation.apply(&mut sink), Size::new(1, 1));
        assert_eq!(
            sink.events,
            vec![Event::TypeInsn(Opcode::New, BinaryName::OBJECT)]
        );
    }

    #[test]
    fn invalid_targets_fail_at_construction() {
        let interface = TypeDescription::interface(BinaryName::CLASS, ClassAccessFlags::PUBLIC);
        assert!(matches!(
            TypeCreation::of(&interface),
            Err(Error::InvalidTypeCreation(_))
        ));

        let primitive = TypeDescription::new(
            BinaryName::INTEGER,
            TypeSort::Primitive(BaseType::Int),
            ClassAccessFlags::PUBLIC,
        );
        assert!(TypeCreation::of(&primitive).is_err());

        let abstract_class = TypeDescription::new(
            BinaryName::OBJECT,
            TypeSort::Class,
            ClassAccessFlags::PUBLIC | ClassAccessFlags::ABSTRACT,
        );
        assert!(TypeCreation::of(&abstract_class).is_err());

        let array = TypeDescription::new(
            BinaryName::OBJECT,
            TypeSort::Array {
                dimensions: 1,
                element: Box::new(TypeSort::Class),
            },
            ClassAccessFlags::PUBLIC,
        );
        assert!(TypeCreation::of(&array).is_err());
    }
}
