//! Generate a small class end-to-end: method bodies woven from stack
//! manipulations, played through the bookkeeping visitors, assembled by the
//! code writer, and serialized into a class-file buffer.

use classweave::jvm::class_file::{ClassFileWriter, CodeWriter, MethodCode, Version};
use classweave::jvm::code::manipulation::{
    Addition, ComparisonCategory, ComparisonOperator, IntegerConstant, MethodReturn,
    PrimitiveComparison, StackManipulation,
};
use classweave::jvm::code::{ClassSink, InstructionSink, LabelGenerator};
use classweave::jvm::visitor::{
    AuxiliaryContextVisitor, FramePaddingVisitor, MetadataOrderingVisitor, StackTrackingVisitor,
    SyntheticDefaults,
};
use classweave::jvm::{
    BinaryName, ClassAccessFlags, Error, MethodAccessFlags, MethodDescriptor, Name,
    UnqualifiedName,
};

type Descriptor = MethodDescriptor<BinaryName>;

fn int_returning() -> Descriptor {
    MethodDescriptor {
        parameters: vec![],
        return_type: Some(classweave::jvm::FieldType::int()),
    }
}

/// Weave a static method body and assemble it through the full sink chain
fn assemble(body: &StackManipulation, descriptor: &Descriptor) -> Result<MethodCode, Error> {
    assert!(body.is_valid());

    let writer = CodeWriter::new(LabelGenerator::new());
    let padded = FramePaddingVisitor::new(writer);
    let mut tracked = StackTrackingVisitor::for_method(padded, descriptor, true);

    let size = body.apply(&mut tracked)?;
    tracked.visit_maxs(
        size.maximal() as u16,
        descriptor.parameter_length(false) as u16,
    );
    tracked.visit_end();

    tracked.into_inner().into_inner().finish()
}

#[test]
fn sum_body_assembles_to_the_expected_bytes() {
    let body = StackManipulation::compound(vec![
        IntegerConstant::new(2).into(),
        IntegerConstant::new(3).into(),
        Addition::Integer.into(),
        MethodReturn::Integer.into(),
    ]);

    // Validity and size are observable before any emission
    assert!(body.is_valid());

    let code = assemble(&body, &int_returning()).unwrap();
    assert_eq!(code.bytecode, vec![0x05, 0x06, 0x60, 0xac]);
    assert_eq!(code.max_stack, 2);
    assert!(code.frames.is_empty());
    assert!(code.exception_table.is_empty());
}

#[test]
fn comparison_body_carries_frames_and_patched_branches() {
    let body = StackManipulation::compound(vec![
        IntegerConstant::new(1).into(),
        IntegerConstant::new(2).into(),
        PrimitiveComparison::new(ComparisonOperator::LessThan, ComparisonCategory::Integer).into(),
        MethodReturn::Integer.into(),
    ]);

    let code = assemble(&body, &int_returning()).unwrap();

    // Both merge points declared a frame
    assert_eq!(code.frames.len(), 2);
    // The conditional branch survived assembly
    assert!(code.bytecode.contains(&0xa1));
    // Frames attach at increasing offsets inside the body
    assert!(code.frames[0].0 < code.frames[1].0);
    assert_eq!(code.max_stack, 2);
}

#[test]
fn class_with_generated_methods_serializes() {
    let class_name = BinaryName::from_string(String::from("sample/Calculator")).unwrap();

    let writer = ClassFileWriter::new();
    let ordered = MetadataOrderingVisitor::new(writer, SyntheticDefaults::default());
    let mut context = AuxiliaryContextVisitor::new(ordered);
    context.mark_active();

    context.visit(
        Version::JAVA11,
        ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
        &class_name,
        Some(&BinaryName::OBJECT),
        &[],
    );

    let sum_body = StackManipulation::compound(vec![
        IntegerConstant::new(2).into(),
        IntegerConstant::new(3).into(),
        Addition::Integer.into(),
        MethodReturn::Integer.into(),
    ]);
    let sum = assemble(&sum_body, &int_returning()).unwrap();
    context.visit_method(
        MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
        &UnqualifiedName::from_string(String::from("sum")).unwrap(),
        &int_returning(),
        Some(sum),
    );

    let less_body = StackManipulation::compound(vec![
        IntegerConstant::new(1).into(),
        IntegerConstant::new(2).into(),
        PrimitiveComparison::new(ComparisonOperator::LessThan, ComparisonCategory::Integer).into(),
        MethodReturn::Integer.into(),
    ]);
    let less = assemble(&less_body, &int_returning()).unwrap();
    context.visit_method(
        MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
        &UnqualifiedName::from_string(String::from("less")).unwrap(),
        &int_returning(),
        Some(less),
    );

    context.visit_end();

    let (ordered, auxiliary_types, _initializer) = context.finish().unwrap();
    assert!(auxiliary_types.is_empty());

    let bytes = ordered.into_inner().into_bytes().unwrap();
    assert_eq!(&bytes[..4], &[0xca, 0xfe, 0xba, 0xbe]);
    // Both method names made it into the constant pool
    assert!(bytes.windows(3).any(|w| w == b"sum"));
    assert!(bytes.windows(4).any(|w| w == b"less"));
    // The stack-map attribute is present for the branching method
    assert!(bytes
        .windows("StackMapTable".len())
        .any(|w| w == b"StackMapTable"));
}
