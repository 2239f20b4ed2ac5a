use super::{
    ClassConstantIndex, ConstantIndex, ConstantsPool, Serialize, Utf8ConstantIndex, Version,
};
use crate::jvm::code::{
    ClassSink, FrameDirective, FrameItem, InstructionSink, Label, LabelGenerator,
    LoadableConstant, Opcode,
};
use crate::jvm::{
    BinaryName, ClassAccessFlags, Error, FieldAccessFlags, FieldType, InnerClassAccessFlags,
    MethodAccessFlags, MethodDescriptor, Name, RenderDescriptor, UnqualifiedName,
};
use crate::util::Width;
use log::debug;
use std::collections::HashMap;

/// A constant-pool reference embedded in not-yet-finalized bytecode
///
/// Method bytes are assembled before the constant pool that will back them
/// is complete, so every pool-referencing operand is written as a two-byte
/// placeholder and resolved when the method joins its class.
#[derive(Clone, PartialEq, Debug)]
pub enum ConstantFixup {
    Class(BinaryName),
    /// Array types are referenced by their rendered descriptor
    ArrayClass(FieldType<BinaryName>),
    FieldRef {
        owner: BinaryName,
        name: UnqualifiedName,
        descriptor: FieldType<BinaryName>,
    },
    MethodRef {
        owner: BinaryName,
        name: UnqualifiedName,
        descriptor: MethodDescriptor<BinaryName>,
        is_interface: bool,
    },
    InvokeDynamic {
        bootstrap_method: u16,
        name: UnqualifiedName,
        descriptor: MethodDescriptor<BinaryName>,
    },
    Loadable(LoadableConstant),
}

/// One entry of a method's exception table, with offsets already resolved
#[derive(Clone, PartialEq, Debug)]
pub struct ExceptionTableEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    /// `None` catches everything (a `finally` range)
    pub catch_type: Option<BinaryName>,
}

/// An assembled method body, ready to join a class
///
/// Offsets are resolved; constant-pool references are still symbolic (see
/// [`ConstantFixup`]) and are patched against the owning class's pool.
#[derive(Clone, PartialEq, Debug)]
pub struct MethodCode {
    pub max_stack: u16,
    pub max_locals: u16,
    pub bytecode: Vec<u8>,
    pub constant_fixups: Vec<(u16, ConstantFixup)>,
    pub exception_table: Vec<ExceptionTableEntry>,
    pub frames: Vec<(u16, FrameDirective<u16>)>,
    /// `(bytecode offset, source line)` pairs
    pub line_numbers: Vec<(u16, u16)>,
}

struct JumpFixup {
    /// Position of the offset operand within the code array
    operand_at: usize,
    /// Position the branch offset is relative to (the opcode byte)
    anchor: usize,
    target: Label,
    /// Whether the operand is four bytes instead of two
    wide: bool,
}

/// Assembles the bytes of one method body from its visitation stream
///
/// Jumps are emitted with placeholder offsets and patched in
/// [`CodeWriter::finish`] once every referenced label is placed; a branch
/// distance that does not fit the 16 bits of the narrow jump encodings is
/// reported as an error rather than silently widened.
pub struct CodeWriter {
    labels: LabelGenerator,
    code: Vec<u8>,
    placed: HashMap<Label, usize>,
    jumps: Vec<JumpFixup>,
    fixups: Vec<(usize, ConstantFixup)>,
    try_catches: Vec<(Label, Label, Label, Option<BinaryName>)>,
    frames: Vec<(usize, FrameDirective)>,
    line_numbers: Vec<(u16, Label)>,
    max_stack: u16,
    max_locals: u16,
    first_error: Option<Error>,
}

impl CodeWriter {
    pub fn new(labels: LabelGenerator) -> CodeWriter {
        CodeWriter {
            labels,
            code: vec![],
            placed: HashMap::new(),
            jumps: vec![],
            fixups: vec![],
            try_catches: vec![],
            frames: vec![],
            line_numbers: vec![],
            max_stack: 0,
            max_locals: 0,
            first_error: None,
        }
    }

    /// Current length of the assembled code array
    pub fn offset(&self) -> usize {
        self.code.len()
    }

    fn push_u16(&mut self, value: u16) {
        self.code.extend_from_slice(&value.to_be_bytes());
    }

    fn push_i32(&mut self, value: i32) {
        self.code.extend_from_slice(&value.to_be_bytes());
    }

    /// Reserve a two-byte constant-pool operand
    fn push_fixup(&mut self, fixup: ConstantFixup) {
        self.fixups.push((self.code.len(), fixup));
        self.push_u16(0);
    }

    /// Reserve a branch offset operand
    fn push_jump(&mut self, anchor: usize, target: Label, wide: bool) {
        self.jumps.push(JumpFixup {
            operand_at: self.code.len(),
            anchor,
            target,
            wide,
        });
        if wide {
            self.push_i32(0);
        } else {
            self.push_u16(0);
        }
    }

    fn lookup(
        placed: &HashMap<Label, usize>,
        unplaced: &mut Vec<Label>,
        label: Label,
    ) -> Option<usize> {
        match placed.get(&label) {
            Some(at) => Some(*at),
            None => {
                unplaced.push(label);
                None
            }
        }
    }

    /// Resolve every label reference and hand over the assembled body
    pub fn finish(mut self) -> Result<MethodCode, Error> {
        if let Some(error) = self.first_error.take() {
            return Err(error);
        }
        if self.code.len() > u16::MAX as usize {
            return Err(Error::MethodCodeOverflow(self.code.len()));
        }

        let mut unplaced: Vec<Label> = vec![];
        let placed = &self.placed;

        // Branch offsets
        let mut patches: Vec<(usize, bool, i64, Label)> = vec![];
        for jump in &self.jumps {
            if let Some(target_at) = Self::lookup(placed, &mut unplaced, jump.target) {
                patches.push((
                    jump.operand_at,
                    jump.wide,
                    target_at as i64 - jump.anchor as i64,
                    jump.target,
                ));
            }
        }

        // Exception table
        let mut exception_table = vec![];
        for (start, end, handler, catch_type) in &self.try_catches {
            let start_pc = Self::lookup(placed, &mut unplaced, *start);
            let end_pc = Self::lookup(placed, &mut unplaced, *end);
            let handler_pc = Self::lookup(placed, &mut unplaced, *handler);
            if let (Some(start_pc), Some(end_pc), Some(handler_pc)) = (start_pc, end_pc, handler_pc)
            {
                exception_table.push(ExceptionTableEntry {
                    start_pc: start_pc as u16,
                    end_pc: end_pc as u16,
                    handler_pc: handler_pc as u16,
                    catch_type: catch_type.clone(),
                });
            }
        }

        // Stack-map frames refer to allocation sites by label
        let mut frames = vec![];
        for (offset, directive) in &self.frames {
            let resolved = directive.try_map_uninitialized::<u16, (), _>(&mut |label| {
                match placed.get(label) {
                    Some(at) => Ok(*at as u16),
                    None => {
                        unplaced.push(*label);
                        Err(())
                    }
                }
            });
            if let Ok(resolved) = resolved {
                frames.push((*offset as u16, resolved));
            }
        }

        // Line numbers
        let mut line_numbers = vec![];
        for (line, start) in &self.line_numbers {
            if let Some(at) = Self::lookup(placed, &mut unplaced, *start) {
                line_numbers.push((at as u16, *line));
            }
        }

        if !unplaced.is_empty() {
            unplaced.sort();
            unplaced.dedup();
            return Err(Error::UnplacedLabels(unplaced));
        }

        for (operand_at, wide, offset, target) in patches {
            if wide {
                let offset = offset as i32;
                self.code[operand_at..operand_at + 4].copy_from_slice(&offset.to_be_bytes());
            } else {
                let offset = i16::try_from(offset)
                    .map_err(|_| Error::JumpOffsetOverflow { target })?;
                self.code[operand_at..operand_at + 2].copy_from_slice(&offset.to_be_bytes());
            }
        }

        debug!(
            "assembled {} bytes of code with {} frames",
            self.code.len(),
            frames.len()
        );
        Ok(MethodCode {
            max_stack: self.max_stack,
            max_locals: self.max_locals,
            bytecode: self.code,
            constant_fixups: self
                .fixups
                .into_iter()
                .map(|(at, fixup)| (at as u16, fixup))
                .collect(),
            exception_table,
            frames,
            line_numbers,
        })
    }
}

impl InstructionSink for CodeWriter {
    fn fresh_label(&mut self) -> Label {
        self.labels.fresh_label()
    }

    fn visit_insn(&mut self, opcode: Opcode) {
        self.code.push(opcode.byte());
    }

    fn visit_int_insn(&mut self, opcode: Opcode, operand: i32) {
        self.code.push(opcode.byte());
        match opcode {
            Opcode::Bipush => self.code.push(operand as i8 as u8),
            Opcode::Sipush => self.push_u16(operand as i16 as u16),
            Opcode::Newarray => self.code.push(operand as u8),
            _ => panic!("not an int-operand instruction: {:?}", opcode),
        }
    }

    fn visit_var_insn(&mut self, opcode: Opcode, variable: u16) {
        let short_base = match opcode {
            Opcode::Iload => Some(0x1a),
            Opcode::Lload => Some(0x1e),
            Opcode::Fload => Some(0x22),
            Opcode::Dload => Some(0x26),
            Opcode::Aload => Some(0x2a),
            Opcode::Istore => Some(0x3b),
            Opcode::Lstore => Some(0x3f),
            Opcode::Fstore => Some(0x43),
            Opcode::Dstore => Some(0x47),
            Opcode::Astore => Some(0x4b),
            Opcode::Ret => None,
            _ => panic!("not a local-variable instruction: {:?}", opcode),
        };
        match short_base {
            Some(base) if variable <= 3 => self.code.push(base + variable as u8),
            _ if variable <= u8::MAX as u16 => {
                self.code.push(opcode.byte());
                self.code.push(variable as u8);
            }
            _ => {
                self.code.push(Opcode::Wide.byte());
                self.code.push(opcode.byte());
                self.push_u16(variable);
            }
        }
    }

    fn visit_type_insn(&mut self, opcode: Opcode, class: &BinaryName) {
        self.code.push(opcode.byte());
        self.push_fixup(ConstantFixup::Class(class.clone()));
    }

    fn visit_field_insn(
        &mut self,
        opcode: Opcode,
        owner: &BinaryName,
        name: &UnqualifiedName,
        descriptor: &FieldType<BinaryName>,
    ) {
        self.code.push(opcode.byte());
        self.push_fixup(ConstantFixup::FieldRef {
            owner: owner.clone(),
            name: name.clone(),
            descriptor: descriptor.clone(),
        });
    }

    fn visit_method_insn(
        &mut self,
        opcode: Opcode,
        owner: &BinaryName,
        name: &UnqualifiedName,
        descriptor: &MethodDescriptor<BinaryName>,
        is_interface: bool,
    ) {
        self.code.push(opcode.byte());
        self.push_fixup(ConstantFixup::MethodRef {
            owner: owner.clone(),
            name: name.clone(),
            descriptor: descriptor.clone(),
            is_interface,
        });
        if opcode == Opcode::Invokeinterface {
            self.code.push(descriptor.parameter_length(true) as u8);
            self.code.push(0);
        }
    }

    fn visit_invoke_dynamic_insn(
        &mut self,
        name: &UnqualifiedName,
        descriptor: &MethodDescriptor<BinaryName>,
        bootstrap_method: u16,
    ) {
        self.code.push(Opcode::Invokedynamic.byte());
        self.push_fixup(ConstantFixup::InvokeDynamic {
            bootstrap_method,
            name: name.clone(),
            descriptor: descriptor.clone(),
        });
        self.code.push(0);
        self.code.push(0);
    }

    fn visit_ldc_insn(&mut self, constant: &LoadableConstant) {
        // The one-byte-index form is never emitted: the index is not known
        // until the pool is resolved, so the wide encodings keep the layout
        // fixed
        let opcode = if constant.width() == 2 {
            Opcode::Ldc2W
        } else {
            Opcode::LdcW
        };
        self.code.push(opcode.byte());
        self.push_fixup(ConstantFixup::Loadable(constant.clone()));
    }

    fn visit_iinc_insn(&mut self, variable: u16, increment: i16) {
        if variable <= u8::MAX as u16 && i8::try_from(increment).is_ok() {
            self.code.push(Opcode::Iinc.byte());
            self.code.push(variable as u8);
            self.code.push(increment as i8 as u8);
        } else {
            self.code.push(Opcode::Wide.byte());
            self.code.push(Opcode::Iinc.byte());
            self.push_u16(variable);
            self.push_u16(increment as u16);
        }
    }

    fn visit_jump_insn(&mut self, opcode: Opcode, target: Label) {
        let anchor = self.code.len();
        self.code.push(opcode.byte());
        let wide = matches!(opcode, Opcode::GotoW | Opcode::JsrW);
        self.push_jump(anchor, target, wide);
    }

    fn visit_label(&mut self, label: Label) {
        if self.placed.insert(label, self.code.len()).is_some() && self.first_error.is_none() {
            self.first_error = Some(Error::DuplicateLabel(label));
        }
    }

    fn visit_table_switch_insn(&mut self, low: i32, high: i32, default: Label, targets: &[Label]) {
        let anchor = self.code.len();
        self.code.push(Opcode::Tableswitch.byte());
        while self.code.len() % 4 != 0 {
            self.code.push(0);
        }
        self.push_jump(anchor, default, true);
        self.push_i32(low);
        self.push_i32(high);
        for target in targets {
            self.push_jump(anchor, *target, true);
        }
    }

    fn visit_lookup_switch_insn(&mut self, default: Label, keys: &[i32], targets: &[Label]) {
        let anchor = self.code.len();
        self.code.push(Opcode::Lookupswitch.byte());
        while self.code.len() % 4 != 0 {
            self.code.push(0);
        }
        self.push_jump(anchor, default, true);
        self.push_i32(keys.len() as i32);
        for (key, target) in keys.iter().zip(targets) {
            self.push_i32(*key);
            self.push_jump(anchor, *target, true);
        }
    }

    fn visit_multi_new_array_insn(&mut self, descriptor: &FieldType<BinaryName>, dimensions: u8) {
        self.code.push(Opcode::Multianewarray.byte());
        self.push_fixup(ConstantFixup::ArrayClass(descriptor.clone()));
        self.code.push(dimensions);
    }

    fn visit_try_catch(
        &mut self,
        start: Label,
        end: Label,
        handler: Label,
        catch_type: Option<&BinaryName>,
    ) {
        self.try_catches
            .push((start, end, handler, catch_type.cloned()));
    }

    fn visit_frame(&mut self, frame: &FrameDirective) {
        self.frames.push((self.code.len(), frame.clone()));
    }

    fn visit_line_number(&mut self, line: u16, start: Label) {
        self.line_numbers.push((line, start));
    }

    fn visit_maxs(&mut self, max_stack: u16, max_locals: u16) {
        self.max_stack = max_stack;
        self.max_locals = max_locals;
    }

    fn visit_end(&mut self) {}
}

struct FieldInfo {
    access_flags: FieldAccessFlags,
    name: Utf8ConstantIndex,
    descriptor: Utf8ConstantIndex,
}

struct MethodInfo {
    access_flags: MethodAccessFlags,
    name: Utf8ConstantIndex,
    descriptor: Utf8ConstantIndex,
    /// Fully resolved `Code` attribute payload
    code: Option<Vec<u8>>,
}

struct InnerClassInfo {
    inner: ClassConstantIndex,
    outer: Option<ClassConstantIndex>,
    inner_name: Option<Utf8ConstantIndex>,
    access_flags: InnerClassAccessFlags,
}

/// Serializes a class visitation stream into a class-file byte buffer
///
/// Pool-referencing operands inside method bytecode are patched here, when
/// the method joins the class and its constants can be interned. Errors from
/// the pool (overflow) are remembered at the visit that caused them and
/// surface from [`ClassFileWriter::into_bytes`].
pub struct ClassFileWriter {
    pool: ConstantsPool,
    version: Version,
    access_flags: ClassAccessFlags,
    this_class: Option<ClassConstantIndex>,
    super_class: Option<ClassConstantIndex>,
    interfaces: Vec<ClassConstantIndex>,
    fields: Vec<FieldInfo>,
    methods: Vec<MethodInfo>,
    nest_host: Option<ClassConstantIndex>,
    enclosing_method: Option<(ClassConstantIndex, Option<ConstantIndex>)>,
    nest_members: Vec<ClassConstantIndex>,
    inner_classes: Vec<InnerClassInfo>,
    raw_attributes: Vec<(Utf8ConstantIndex, Vec<u8>)>,
    first_error: Option<Error>,
}

impl ClassFileWriter {
    pub fn new() -> ClassFileWriter {
        ClassFileWriter {
            pool: ConstantsPool::new(),
            version: Version::JAVA11,
            access_flags: ClassAccessFlags::empty(),
            this_class: None,
            super_class: None,
            interfaces: vec![],
            fields: vec![],
            methods: vec![],
            nest_host: None,
            enclosing_method: None,
            nest_members: vec![],
            inner_classes: vec![],
            raw_attributes: vec![],
            first_error: None,
        }
    }

    /// Remember the first error any visitation produced
    fn record<T>(&mut self, result: Result<T, Error>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                if self.first_error.is_none() {
                    self.first_error = Some(error);
                }
                None
            }
        }
    }

    fn constant_fixup_index(&mut self, fixup: &ConstantFixup) -> Result<u16, Error> {
        Ok(match fixup {
            ConstantFixup::Class(class) => self.pool.get_class(class)?.0 .0,
            ConstantFixup::ArrayClass(descriptor) => self.pool.get_array_class(descriptor)?.0 .0,
            ConstantFixup::FieldRef {
                owner,
                name,
                descriptor,
            } => self.pool.get_field_ref(owner, name, descriptor)?.0,
            ConstantFixup::MethodRef {
                owner,
                name,
                descriptor,
                is_interface,
            } => {
                self.pool
                    .get_method_ref(owner, name, descriptor, *is_interface)?
                    .0
            }
            ConstantFixup::InvokeDynamic {
                bootstrap_method,
                name,
                descriptor,
            } => {
                self.pool
                    .get_invoke_dynamic(*bootstrap_method, name, descriptor)?
                    .0
            }
            ConstantFixup::Loadable(constant) => self.pool.get_loadable(constant)?.0,
        })
    }

    fn serialize_frame_item(
        &mut self,
        item: &FrameItem<u16>,
        out: &mut Vec<u8>,
    ) -> Result<(), Error> {
        match item {
            FrameItem::Top => 0u8.serialize(out)?,
            FrameItem::Integer => 1u8.serialize(out)?,
            FrameItem::Float => 2u8.serialize(out)?,
            FrameItem::Double => 3u8.serialize(out)?,
            FrameItem::Long => 4u8.serialize(out)?,
            FrameItem::Null => 5u8.serialize(out)?,
            FrameItem::UninitializedThis => 6u8.serialize(out)?,
            FrameItem::Object(class) => {
                7u8.serialize(out)?;
                self.pool.get_class(class)?.serialize(out)?;
            }
            FrameItem::Uninitialized(offset) => {
                8u8.serialize(out)?;
                offset.serialize(out)?;
            }
        }
        Ok(())
    }

    /// Serialize the compressed stack-map table
    fn serialize_stack_map(&mut self, frames: &[(u16, FrameDirective<u16>)]) -> Result<Vec<u8>, Error> {
        let mut out = vec![];
        (frames.len() as u16).serialize(&mut out)?;

        let mut previous: Option<u16> = None;
        for (offset, directive) in frames {
            let delta = match previous {
                None => *offset,
                Some(prev) => offset
                    .checked_sub(prev + 1)
                    .ok_or(Error::ConflictingFrames(*offset))?,
            };
            previous = Some(*offset);

            match directive {
                FrameDirective::Same if delta < 64 => (delta as u8).serialize(&mut out)?,
                FrameDirective::Same => {
                    251u8.serialize(&mut out)?;
                    delta.serialize(&mut out)?;
                }
                FrameDirective::Same1(item) => {
                    if delta < 64 {
                        (64 + delta as u8).serialize(&mut out)?;
                    } else {
                        247u8.serialize(&mut out)?;
                        delta.serialize(&mut out)?;
                    }
                    self.serialize_frame_item(item, &mut out)?;
                }
                FrameDirective::Chop(chopped) => {
                    (251 - chopped).serialize(&mut out)?;
                    delta.serialize(&mut out)?;
                }
                FrameDirective::Append(items) => {
                    (251 + items.len() as u8).serialize(&mut out)?;
                    delta.serialize(&mut out)?;
                    for item in items {
                        self.serialize_frame_item(item, &mut out)?;
                    }
                }
                FrameDirective::Full { locals, stack } => {
                    255u8.serialize(&mut out)?;
                    delta.serialize(&mut out)?;
                    (locals.len() as u16).serialize(&mut out)?;
                    for item in locals {
                        self.serialize_frame_item(item, &mut out)?;
                    }
                    (stack.len() as u16).serialize(&mut out)?;
                    for item in stack {
                        self.serialize_frame_item(item, &mut out)?;
                    }
                }
            }
        }
        Ok(out)
    }

    /// Resolve a method body's pool references and build its `Code`
    /// attribute payload
    fn assemble_code_attribute(&mut self, code: MethodCode) -> Result<Vec<u8>, Error> {
        let MethodCode {
            max_stack,
            max_locals,
            mut bytecode,
            constant_fixups,
            exception_table,
            frames,
            line_numbers,
        } = code;

        for (at, fixup) in &constant_fixups {
            let index = self.constant_fixup_index(fixup)?;
            let at = *at as usize;
            bytecode[at..at + 2].copy_from_slice(&index.to_be_bytes());
        }

        let mut attributes: Vec<(Utf8ConstantIndex, Vec<u8>)> = vec![];
        if !frames.is_empty() {
            let payload = self.serialize_stack_map(&frames)?;
            attributes.push((self.pool.get_utf8("StackMapTable")?, payload));
        }
        if !line_numbers.is_empty() {
            let mut payload = vec![];
            (line_numbers.len() as u16).serialize(&mut payload)?;
            for (start_pc, line) in &line_numbers {
                start_pc.serialize(&mut payload)?;
                line.serialize(&mut payload)?;
            }
            attributes.push((self.pool.get_utf8("LineNumberTable")?, payload));
        }

        let mut payload = vec![];
        max_stack.serialize(&mut payload)?;
        max_locals.serialize(&mut payload)?;
        (bytecode.len() as u32).serialize(&mut payload)?;
        payload.extend_from_slice(&bytecode);
        (exception_table.len() as u16).serialize(&mut payload)?;
        for entry in &exception_table {
            entry.start_pc.serialize(&mut payload)?;
            entry.end_pc.serialize(&mut payload)?;
            entry.handler_pc.serialize(&mut payload)?;
            match &entry.catch_type {
                Some(class) => self.pool.get_class(class)?.serialize(&mut payload)?,
                None => 0u16.serialize(&mut payload)?,
            }
        }
        write_attributes(&attributes, &mut payload)?;
        Ok(payload)
    }

    /// Finalize the class into its byte-buffer form
    pub fn into_bytes(mut self) -> Result<Vec<u8>, Error> {
        if let Some(error) = self.first_error.take() {
            return Err(error);
        }
        let this_class = self.this_class.ok_or(Error::ClassHeaderMissing)?;

        // Class-level attributes (interning names completes the pool)
        let mut attributes: Vec<(Utf8ConstantIndex, Vec<u8>)> = vec![];
        if let Some(nest_host) = self.nest_host {
            let mut payload = vec![];
            nest_host.serialize(&mut payload)?;
            attributes.push((self.pool.get_utf8("NestHost")?, payload));
        }
        if !self.nest_members.is_empty() {
            let mut payload = vec![];
            (self.nest_members.len() as u16).serialize(&mut payload)?;
            for member in &self.nest_members {
                member.serialize(&mut payload)?;
            }
            attributes.push((self.pool.get_utf8("NestMembers")?, payload));
        }
        if let Some((class, method)) = self.enclosing_method {
            let mut payload = vec![];
            class.serialize(&mut payload)?;
            match method {
                Some(name_and_type) => name_and_type.serialize(&mut payload)?,
                None => 0u16.serialize(&mut payload)?,
            }
            attributes.push((self.pool.get_utf8("EnclosingMethod")?, payload));
        }
        if !self.inner_classes.is_empty() {
            let mut payload = vec![];
            (self.inner_classes.len() as u16).serialize(&mut payload)?;
            for info in &self.inner_classes {
                info.inner.serialize(&mut payload)?;
                match info.outer {
                    Some(outer) => outer.serialize(&mut payload)?,
                    None => 0u16.serialize(&mut payload)?,
                }
                match info.inner_name {
                    Some(name) => name.serialize(&mut payload)?,
                    None => 0u16.serialize(&mut payload)?,
                }
                info.access_flags.serialize(&mut payload)?;
            }
            attributes.push((self.pool.get_utf8("InnerClasses")?, payload));
        }
        attributes.extend(self.raw_attributes);

        let mut out = vec![];
        0xCAFEBABEu32.serialize(&mut out)?;
        self.version.serialize(&mut out)?;
        self.pool.serialize(&mut out)?;
        self.access_flags.serialize(&mut out)?;
        this_class.serialize(&mut out)?;
        match self.super_class {
            Some(super_class) => super_class.serialize(&mut out)?,
            None => 0u16.serialize(&mut out)?,
        }
        (self.interfaces.len() as u16).serialize(&mut out)?;
        for interface in &self.interfaces {
            interface.serialize(&mut out)?;
        }

        (self.fields.len() as u16).serialize(&mut out)?;
        for field in &self.fields {
            field.access_flags.serialize(&mut out)?;
            field.name.serialize(&mut out)?;
            field.descriptor.serialize(&mut out)?;
            0u16.serialize(&mut out)?;
        }

        (self.methods.len() as u16).serialize(&mut out)?;
        for method in &self.methods {
            method.access_flags.serialize(&mut out)?;
            method.name.serialize(&mut out)?;
            method.descriptor.serialize(&mut out)?;
            match &method.code {
                Some(payload) => {
                    1u16.serialize(&mut out)?;
                    // The "Code" utf8 was interned when the method was added
                    let name = self.pool.get_utf8("Code")?;
                    write_attribute(name, payload, &mut out)?;
                }
                None => 0u16.serialize(&mut out)?,
            }
        }

        write_attributes(&attributes, &mut out)?;

        debug!("serialized class file of {} bytes", out.len());
        Ok(out)
    }
}

impl Default for ClassFileWriter {
    fn default() -> ClassFileWriter {
        ClassFileWriter::new()
    }
}

fn write_attribute(
    name: Utf8ConstantIndex,
    payload: &[u8],
    out: &mut Vec<u8>,
) -> Result<(), Error> {
    name.serialize(out)?;
    (payload.len() as u32).serialize(out)?;
    out.extend_from_slice(payload);
    Ok(())
}

fn write_attributes(
    attributes: &[(Utf8ConstantIndex, Vec<u8>)],
    out: &mut Vec<u8>,
) -> Result<(), Error> {
    (attributes.len() as u16).serialize(out)?;
    for (name, payload) in attributes {
        write_attribute(*name, payload, out)?;
    }
    Ok(())
}

impl ClassSink for ClassFileWriter {
    fn visit(
        &mut self,
        version: Version,
        access_flags: ClassAccessFlags,
        name: &BinaryName,
        super_class: Option<&BinaryName>,
        interfaces: &[BinaryName],
    ) {
        self.version = version;
        self.access_flags = access_flags;
        let this_class = self.pool.get_class(name);
        self.this_class = self.record(this_class);
        if let Some(super_class) = super_class {
            let super_class = self.pool.get_class(super_class);
            self.super_class = self.record(super_class);
        }
        for interface in interfaces {
            let interface = self.pool.get_class(interface);
            if let Some(interface) = self.record(interface) {
                self.interfaces.push(interface);
            }
        }
    }

    fn visit_nest_host(&mut self, nest_host: &BinaryName) {
        let nest_host = self.pool.get_class(nest_host);
        self.nest_host = self.record(nest_host);
    }

    fn visit_outer_class(
        &mut self,
        owner: &BinaryName,
        method: Option<(&UnqualifiedName, &MethodDescriptor<BinaryName>)>,
    ) {
        let owner = self.pool.get_class(owner);
        let method = match method {
            Some((name, descriptor)) => {
                let name_and_type = self
                    .pool
                    .get_name_and_type(name.as_str(), &descriptor.render());
                self.record(name_and_type).map(Some)
            }
            None => Some(None),
        };
        if let (Some(owner), Some(method)) = (self.record(owner), method) {
            self.enclosing_method = Some((owner, method));
        }
    }

    fn visit_attribute(&mut self, name: &str, info: &[u8]) {
        let name = self.pool.get_utf8(name);
        if let Some(name) = self.record(name) {
            self.raw_attributes.push((name, info.to_vec()));
        }
    }

    fn visit_nest_member(&mut self, nest_member: &BinaryName) {
        let nest_member = self.pool.get_class(nest_member);
        if let Some(nest_member) = self.record(nest_member) {
            self.nest_members.push(nest_member);
        }
    }

    fn visit_inner_class(
        &mut self,
        inner: &BinaryName,
        outer: Option<&BinaryName>,
        inner_name: Option<&UnqualifiedName>,
        access_flags: InnerClassAccessFlags,
    ) {
        let inner = self.pool.get_class(inner);
        let outer = match outer {
            Some(outer) => {
                let outer = self.pool.get_class(outer);
                self.record(outer).map(Some)
            }
            None => Some(None),
        };
        let inner_name = match inner_name {
            Some(inner_name) => {
                let inner_name = self.pool.get_utf8(inner_name.as_str());
                self.record(inner_name).map(Some)
            }
            None => Some(None),
        };
        if let (Some(inner), Some(outer), Some(inner_name)) =
            (self.record(inner), outer, inner_name)
        {
            self.inner_classes.push(InnerClassInfo {
                inner,
                outer,
                inner_name,
                access_flags,
            });
        }
    }

    fn visit_field(
        &mut self,
        access_flags: FieldAccessFlags,
        name: &UnqualifiedName,
        descriptor: &FieldType<BinaryName>,
    ) {
        let name = self.pool.get_utf8(name.as_str());
        let name = self.record(name);
        let descriptor = self.pool.get_utf8(&descriptor.render());
        let descriptor = self.record(descriptor);
        if let (Some(name), Some(descriptor)) = (name, descriptor) {
            self.fields.push(FieldInfo {
                access_flags,
                name,
                descriptor,
            });
        }
    }

    fn visit_method(
        &mut self,
        access_flags: MethodAccessFlags,
        name: &UnqualifiedName,
        descriptor: &MethodDescriptor<BinaryName>,
        code: Option<MethodCode>,
    ) {
        let name = self.pool.get_utf8(name.as_str());
        let name = self.record(name);
        let descriptor_utf8 = self.pool.get_utf8(&descriptor.render());
        let descriptor_utf8 = self.record(descriptor_utf8);
        let code = match code {
            Some(code) => {
                // Intern the attribute name up front so serialization later
                // cannot grow the pool
                let code_name = self.pool.get_utf8("Code");
                self.record(code_name);
                let payload = self.assemble_code_attribute(code);
                match self.record(payload) {
                    Some(payload) => Some(payload),
                    None => return,
                }
            }
            None => None,
        };
        if let (Some(name), Some(descriptor)) = (name, descriptor_utf8) {
            self.methods.push(MethodInfo {
                access_flags,
                name,
                descriptor,
                code,
            });
        }
    }

    fn visit_end(&mut self) {}
}
