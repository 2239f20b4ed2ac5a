use super::{Label, Opcode};
use crate::jvm::class_file::{MethodCode, Version};
use crate::jvm::{
    BinaryName, ClassAccessFlags, FieldAccessFlags, FieldType, InnerClassAccessFlags,
    MethodAccessFlags, MethodDescriptor, UnqualifiedName,
};
use crate::util::Width;

/// A constant that can be pushed with a load-constant instruction
#[derive(Clone, PartialEq, Debug)]
pub enum LoadableConstant {
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    String(String),
    Class(BinaryName),
}

impl Width for LoadableConstant {
    fn width(&self) -> usize {
        match self {
            LoadableConstant::Long(_) | LoadableConstant::Double(_) => 2,
            _ => 1,
        }
    }
}

/// A single entry of a stack-map frame's locals or stack type array
///
/// `U` is the representation of the uninitialized-value annotation: while
/// code is being emitted it is a [`Label`] pointing at the allocation
/// instruction, and once offsets are known it becomes the `u16` bytecode
/// offset the format stores.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum FrameItem<U = Label> {
    Top,
    Integer,
    Float,
    Long,
    Double,
    Null,
    UninitializedThis,
    Object(BinaryName),
    Uninitialized(U),
}

impl<U> FrameItem<U> {
    /// Translate the uninitialized-value annotation, failing if the mapping
    /// does
    pub fn try_map_uninitialized<V, E, F>(&self, map: &mut F) -> Result<FrameItem<V>, E>
    where
        F: FnMut(&U) -> Result<V, E>,
    {
        Ok(match self {
            FrameItem::Top => FrameItem::Top,
            FrameItem::Integer => FrameItem::Integer,
            FrameItem::Float => FrameItem::Float,
            FrameItem::Long => FrameItem::Long,
            FrameItem::Double => FrameItem::Double,
            FrameItem::Null => FrameItem::Null,
            FrameItem::UninitializedThis => FrameItem::UninitializedThis,
            FrameItem::Object(cls) => FrameItem::Object(cls.clone()),
            FrameItem::Uninitialized(u) => FrameItem::Uninitialized(map(u)?),
        })
    }
}

impl<U> Width for FrameItem<U> {
    fn width(&self) -> usize {
        match self {
            FrameItem::Long | FrameItem::Double => 2,
            _ => 1,
        }
    }
}

/// An explicit stack-map frame declaration, in the compressed forms the
/// format offers
///
/// Every directive is relative to the previous declared frame, except
/// [`FrameDirective::Full`] which spells out both arrays.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum FrameDirective<U = Label> {
    /// Same locals as the previous frame, empty stack
    Same,
    /// Same locals as the previous frame, exactly one stack value
    Same1(FrameItem<U>),
    /// Previous locals plus up to three appended ones, empty stack
    Append(Vec<FrameItem<U>>),
    /// Previous locals minus the last 1..=3, empty stack
    Chop(u8),
    /// Complete locals and stack
    Full {
        locals: Vec<FrameItem<U>>,
        stack: Vec<FrameItem<U>>,
    },
}

impl<U> FrameDirective<U> {
    /// Translate every uninitialized-value annotation in the directive
    pub fn try_map_uninitialized<V, E, F>(&self, map: &mut F) -> Result<FrameDirective<V>, E>
    where
        F: FnMut(&U) -> Result<V, E>,
    {
        Ok(match self {
            FrameDirective::Same => FrameDirective::Same,
            FrameDirective::Same1(item) => {
                FrameDirective::Same1(item.try_map_uninitialized(&mut *map)?)
            }
            FrameDirective::Chop(n) => FrameDirective::Chop(*n),
            FrameDirective::Append(items) => FrameDirective::Append(
                items
                    .iter()
                    .map(|item| item.try_map_uninitialized(&mut *map))
                    .collect::<Result<_, E>>()?,
            ),
            FrameDirective::Full { locals, stack } => FrameDirective::Full {
                locals: locals
                    .iter()
                    .map(|item| item.try_map_uninitialized(&mut *map))
                    .collect::<Result<_, E>>()?,
                stack: stack
                    .iter()
                    .map(|item| item.try_map_uninitialized(&mut *map))
                    .collect::<Result<_, E>>()?,
            },
        })
    }
}

/// Visitor surface for the body of a single method
///
/// This is the boundary between code that decides _what_ to emit (stack
/// manipulations, bookkeeping visitors) and code that turns the visitation
/// stream into bytes. Calls must arrive in method order; labels referenced by
/// jumps, switches, exception table entries, and frame items must eventually
/// be placed with [`InstructionSink::visit_label`].
pub trait InstructionSink {
    /// Get a label that has not been handed out for this method before
    ///
    /// The sink is the label authority for the method it assembles: wrapping
    /// visitors forward this call inward, so every label in one visitation
    /// stream comes from a single generator and cannot collide.
    fn fresh_label(&mut self) -> Label;

    /// An instruction carrying no operand
    fn visit_insn(&mut self, opcode: Opcode);

    /// `bipush`, `sipush`, or `newarray`
    fn visit_int_insn(&mut self, opcode: Opcode, operand: i32);

    /// A local-variable load, store, or `ret`
    fn visit_var_insn(&mut self, opcode: Opcode, variable: u16);

    /// `new`, `anewarray`, `checkcast`, or `instanceof`
    fn visit_type_insn(&mut self, opcode: Opcode, class: &BinaryName);

    /// A field access
    fn visit_field_insn(
        &mut self,
        opcode: Opcode,
        owner: &BinaryName,
        name: &UnqualifiedName,
        descriptor: &FieldType<BinaryName>,
    );

    /// A method invocation
    fn visit_method_insn(
        &mut self,
        opcode: Opcode,
        owner: &BinaryName,
        name: &UnqualifiedName,
        descriptor: &MethodDescriptor<BinaryName>,
        is_interface: bool,
    );

    /// An `invokedynamic` call site, referencing a bootstrap method by index
    fn visit_invoke_dynamic_insn(
        &mut self,
        name: &UnqualifiedName,
        descriptor: &MethodDescriptor<BinaryName>,
        bootstrap_method: u16,
    );

    /// A load-constant instruction
    fn visit_ldc_insn(&mut self, constant: &LoadableConstant);

    /// `iinc`
    fn visit_iinc_insn(&mut self, variable: u16, increment: i16);

    /// A conditional or unconditional jump (including `jsr`)
    fn visit_jump_insn(&mut self, opcode: Opcode, target: Label);

    /// Place a label at the current position
    fn visit_label(&mut self, label: Label);

    /// `tableswitch` over the inclusive range `low..=high`
    fn visit_table_switch_insn(&mut self, low: i32, high: i32, default: Label, targets: &[Label]);

    /// `lookupswitch` with sorted keys
    fn visit_lookup_switch_insn(&mut self, default: Label, keys: &[i32], targets: &[Label]);

    /// `multianewarray` popping `dimensions` sizes
    fn visit_multi_new_array_insn(&mut self, descriptor: &FieldType<BinaryName>, dimensions: u8);

    /// Register an exception handler covering `start..end`
    fn visit_try_catch(
        &mut self,
        start: Label,
        end: Label,
        handler: Label,
        catch_type: Option<&BinaryName>,
    );

    /// Declare a stack-map frame at the current position
    fn visit_frame(&mut self, frame: &FrameDirective);

    /// Associate a source line with a placed label
    fn visit_line_number(&mut self, line: u16, start: Label);

    /// Declare the operand stack and local variable array sizes
    fn visit_maxs(&mut self, max_stack: u16, max_locals: u16);

    /// Finish the method body
    fn visit_end(&mut self);
}

/// Visitor surface for the structure of a single class
///
/// The format requires a canonical section order: header, nest host, outer
/// class, attributes, then members and collected metadata, then the end of
/// the unit. Sinks may rely on callers respecting that order; the
/// [`crate::jvm::visitor::MetadataOrderingVisitor`] wrapper enforces it.
pub trait ClassSink {
    /// Begin the class, declaring its header
    fn visit(
        &mut self,
        version: Version,
        access_flags: ClassAccessFlags,
        name: &BinaryName,
        super_class: Option<&BinaryName>,
        interfaces: &[BinaryName],
    );

    /// Declare the host of the nest this class belongs to
    fn visit_nest_host(&mut self, nest_host: &BinaryName);

    /// Declare the method or class this class is syntactically nested in
    fn visit_outer_class(
        &mut self,
        owner: &BinaryName,
        method: Option<(&UnqualifiedName, &MethodDescriptor<BinaryName>)>,
    );

    /// A raw named attribute
    fn visit_attribute(&mut self, name: &str, info: &[u8]);

    /// Declare a member of this class's nest
    fn visit_nest_member(&mut self, nest_member: &BinaryName);

    /// Record an inner-class relationship
    fn visit_inner_class(
        &mut self,
        inner: &BinaryName,
        outer: Option<&BinaryName>,
        inner_name: Option<&UnqualifiedName>,
        access_flags: InnerClassAccessFlags,
    );

    /// Declare a field
    fn visit_field(
        &mut self,
        access_flags: FieldAccessFlags,
        name: &UnqualifiedName,
        descriptor: &FieldType<BinaryName>,
    );

    /// Declare a method, with its assembled body unless it is abstract or
    /// native
    fn visit_method(
        &mut self,
        access_flags: MethodAccessFlags,
        name: &UnqualifiedName,
        descriptor: &MethodDescriptor<BinaryName>,
        code: Option<MethodCode>,
    );

    /// Finish the class
    fn visit_end(&mut self);
}

#[cfg(test)]
pub(crate) mod recording {
    //! Sinks that record their visitation stream, for asserting on emission
    //! sequences in tests

    use super::*;

    #[derive(Clone, PartialEq, Debug)]
    pub(crate) enum Event {
        Insn(Opcode),
        IntInsn(Opcode, i32),
        VarInsn(Opcode, u16),
        TypeInsn(Opcode, BinaryName),
        FieldInsn(Opcode, BinaryName, String, String),
        MethodInsn(Opcode, BinaryName, String, String, bool),
        InvokeDynamicInsn(String, String, u16),
        Ldc(LoadableConstant),
        Iinc(u16, i16),
        Jump(Opcode, Label),
        PlaceLabel(Label),
        TableSwitch(i32, i32, Label, Vec<Label>),
        LookupSwitch(Label, Vec<i32>, Vec<Label>),
        MultiNewArray(String, u8),
        TryCatch(Label, Label, Label, Option<BinaryName>),
        Frame(FrameDirective),
        LineNumber(u16, Label),
        Maxs(u16, u16),
        End,
    }

    /// An [`InstructionSink`] that just remembers what it saw
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub events: Vec<Event>,
        labels: crate::jvm::code::LabelGenerator,
    }

    impl RecordingSink {
        pub fn new() -> RecordingSink {
            RecordingSink::default()
        }
    }

    impl InstructionSink for RecordingSink {
        fn fresh_label(&mut self) -> Label {
            self.labels.fresh_label()
        }

        fn visit_insn(&mut self, opcode: Opcode) {
            self.events.push(Event::Insn(opcode));
        }

        fn visit_int_insn(&mut self, opcode: Opcode, operand: i32) {
            self.events.push(Event::IntInsn(opcode, operand));
        }

        fn visit_var_insn(&mut self, opcode: Opcode, variable: u16) {
            self.events.push(Event::VarInsn(opcode, variable));
        }

        fn visit_type_insn(&mut self, opcode: Opcode, class: &BinaryName) {
            self.events.push(Event::TypeInsn(opcode, class.clone()));
        }

        fn visit_field_insn(
            &mut self,
            opcode: Opcode,
            owner: &BinaryName,
            name: &UnqualifiedName,
            descriptor: &FieldType<BinaryName>,
        ) {
            use crate::jvm::{Name, RenderDescriptor};
            self.events.push(Event::FieldInsn(
                opcode,
                owner.clone(),
                name.as_str().to_owned(),
                descriptor.render(),
            ));
        }

        fn visit_method_insn(
            &mut self,
            opcode: Opcode,
            owner: &BinaryName,
            name: &UnqualifiedName,
            descriptor: &MethodDescriptor<BinaryName>,
            is_interface: bool,
        ) {
            use crate::jvm::{Name, RenderDescriptor};
            self.events.push(Event::MethodInsn(
                opcode,
                owner.clone(),
                name.as_str().to_owned(),
                descriptor.render(),
                is_interface,
            ));
        }

        fn visit_invoke_dynamic_insn(
            &mut self,
            name: &UnqualifiedName,
            descriptor: &MethodDescriptor<BinaryName>,
            bootstrap_method: u16,
        ) {
            use crate::jvm::{Name, RenderDescriptor};
            self.events.push(Event::InvokeDynamicInsn(
                name.as_str().to_owned(),
                descriptor.render(),
                bootstrap_method,
            ));
        }

        fn visit_ldc_insn(&mut self, constant: &LoadableConstant) {
            self.events.push(Event::Ldc(constant.clone()));
        }

        fn visit_iinc_insn(&mut self, variable: u16, increment: i16) {
            self.events.push(Event::Iinc(variable, increment));
        }

        fn visit_jump_insn(&mut self, opcode: Opcode, target: Label) {
            self.events.push(Event::Jump(opcode, target));
        }

        fn visit_label(&mut self, label: Label) {
            self.events.push(Event::PlaceLabel(label));
        }

        fn visit_table_switch_insn(
            &mut self,
            low: i32,
            high: i32,
            default: Label,
            targets: &[Label],
        ) {
            self.events
                .push(Event::TableSwitch(low, high, default, targets.to_vec()));
        }

        fn visit_lookup_switch_insn(&mut self, default: Label, keys: &[i32], targets: &[Label]) {
            self.events
                .push(Event::LookupSwitch(default, keys.to_vec(), targets.to_vec()));
        }

        fn visit_multi_new_array_insn(
            &mut self,
            descriptor: &FieldType<BinaryName>,
            dimensions: u8,
        ) {
            use crate::jvm::RenderDescriptor;
            self.events
                .push(Event::MultiNewArray(descriptor.render(), dimensions));
        }

        fn visit_try_catch(
            &mut self,
            start: Label,
            end: Label,
            handler: Label,
            catch_type: Option<&BinaryName>,
        ) {
            self.events
                .push(Event::TryCatch(start, end, handler, catch_type.cloned()));
        }

        fn visit_frame(&mut self, frame: &FrameDirective) {
            self.events.push(Event::Frame(frame.clone()));
        }

        fn visit_line_number(&mut self, line: u16, start: Label) {
            self.events.push(Event::LineNumber(line, start));
        }

        fn visit_maxs(&mut self, max_stack: u16, max_locals: u16) {
            self.events.push(Event::Maxs(max_stack, max_locals));
        }

        fn visit_end(&mut self) {
            self.events.push(Event::End);
        }
    }

    #[derive(Clone, PartialEq, Debug)]
    pub(crate) enum ClassEvent {
        Visit(Version, ClassAccessFlags, BinaryName),
        NestHost(BinaryName),
        OuterClass(BinaryName, Option<String>),
        Attribute(String, Vec<u8>),
        NestMember(BinaryName),
        InnerClass(BinaryName),
        Field(FieldAccessFlags, String, String),
        Method(MethodAccessFlags, String, String, bool),
        End,
    }

    /// A [`ClassSink`] that just remembers what it saw
    #[derive(Default)]
    pub(crate) struct RecordingClassSink {
        pub events: Vec<ClassEvent>,
    }

    impl RecordingClassSink {
        pub fn new() -> RecordingClassSink {
            RecordingClassSink::default()
        }
    }

    impl ClassSink for RecordingClassSink {
        fn visit(
            &mut self,
            version: Version,
            access_flags: ClassAccessFlags,
            name: &BinaryName,
            _super_class: Option<&BinaryName>,
            _interfaces: &[BinaryName],
        ) {
            self.events
                .push(ClassEvent::Visit(version, access_flags, name.clone()));
        }

        fn visit_nest_host(&mut self, nest_host: &BinaryName) {
            self.events.push(ClassEvent::NestHost(nest_host.clone()));
        }

        fn visit_outer_class(
            &mut self,
            owner: &BinaryName,
            method: Option<(&UnqualifiedName, &MethodDescriptor<BinaryName>)>,
        ) {
            use crate::jvm::Name;
            self.events.push(ClassEvent::OuterClass(
                owner.clone(),
                method.map(|(name, _)| name.as_str().to_owned()),
            ));
        }

        fn visit_attribute(&mut self, name: &str, info: &[u8]) {
            self.events
                .push(ClassEvent::Attribute(name.to_owned(), info.to_vec()));
        }

        fn visit_nest_member(&mut self, nest_member: &BinaryName) {
            self.events.push(ClassEvent::NestMember(nest_member.clone()));
        }

        fn visit_inner_class(
            &mut self,
            inner: &BinaryName,
            _outer: Option<&BinaryName>,
            _inner_name: Option<&UnqualifiedName>,
            _access_flags: InnerClassAccessFlags,
        ) {
            self.events.push(ClassEvent::InnerClass(inner.clone()));
        }

        fn visit_field(
            &mut self,
            access_flags: FieldAccessFlags,
            name: &UnqualifiedName,
            descriptor: &FieldType<BinaryName>,
        ) {
            use crate::jvm::{Name, RenderDescriptor};
            self.events.push(ClassEvent::Field(
                access_flags,
                name.as_str().to_owned(),
                descriptor.render(),
            ));
        }

        fn visit_method(
            &mut self,
            access_flags: MethodAccessFlags,
            name: &UnqualifiedName,
            descriptor: &MethodDescriptor<BinaryName>,
            code: Option<MethodCode>,
        ) {
            use crate::jvm::{Name, RenderDescriptor};
            self.events.push(ClassEvent::Method(
                access_flags,
                name.as_str().to_owned(),
                descriptor.render(),
                code.is_some(),
            ));
        }

        fn visit_end(&mut self) {
            self.events.push(ClassEvent::End);
        }
    }
}
