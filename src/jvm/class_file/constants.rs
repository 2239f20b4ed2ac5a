use super::Serialize;
use crate::jvm::code::LoadableConstant;
use crate::jvm::{
    BinaryName, Error, FieldType, MethodDescriptor, Name, RenderDescriptor, UnqualifiedName,
};
use crate::util::Width;
use byteorder::WriteBytesExt;
use std::collections::HashMap;
use std::io::Result as IoResult;

/// Index into the constant pool
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ConstantIndex(pub u16);

/// Index of a `Utf8` constant
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Utf8ConstantIndex(pub ConstantIndex);

/// Index of a `Class` constant
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ClassConstantIndex(pub ConstantIndex);

impl Serialize for ConstantIndex {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> IoResult<()> {
        self.0.serialize(writer)
    }
}

impl Serialize for Utf8ConstantIndex {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> IoResult<()> {
        self.0.serialize(writer)
    }
}

impl Serialize for ClassConstantIndex {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> IoResult<()> {
        self.0.serialize(writer)
    }
}

/// Entries of the constant pool
///
/// Note: constant kinds this crate never emits (method handles, method
/// types, modules, packages) are not modelled.
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.4
#[derive(Clone, Debug)]
pub enum Constant {
    /// Raw string data
    ///
    /// Despite the name, the class-file encoding is not quite UTF-8 (the
    /// null character and supplementary characters differ); the strings this
    /// crate emits never hit those cases.
    Utf8(String),

    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),

    /// Class or interface (or array type, whose "name" is its descriptor)
    Class(Utf8ConstantIndex),

    /// Object of type `java.lang.String`
    String(Utf8ConstantIndex),

    FieldRef(ClassConstantIndex, ConstantIndex),

    /// Combines the plain and interface method reference kinds
    MethodRef {
        class: ClassConstantIndex,
        name_and_type: ConstantIndex,
        is_interface: bool,
    },

    NameAndType {
        name: Utf8ConstantIndex,
        descriptor: Utf8ConstantIndex,
    },

    InvokeDynamic {
        bootstrap_method: u16,
        name_and_type: ConstantIndex,
    },
}

impl Width for Constant {
    fn width(&self) -> usize {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }
}

impl Serialize for Constant {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> IoResult<()> {
        match self {
            Constant::Utf8(text) => {
                1u8.serialize(writer)?;
                (text.len() as u16).serialize(writer)?;
                writer.write_all(text.as_bytes())?;
            }
            Constant::Integer(value) => {
                3u8.serialize(writer)?;
                value.serialize(writer)?;
            }
            Constant::Float(value) => {
                4u8.serialize(writer)?;
                value.serialize(writer)?;
            }
            Constant::Long(value) => {
                5u8.serialize(writer)?;
                value.serialize(writer)?;
            }
            Constant::Double(value) => {
                6u8.serialize(writer)?;
                value.serialize(writer)?;
            }
            Constant::Class(name) => {
                7u8.serialize(writer)?;
                name.serialize(writer)?;
            }
            Constant::String(value) => {
                8u8.serialize(writer)?;
                value.serialize(writer)?;
            }
            Constant::FieldRef(class, name_and_type) => {
                9u8.serialize(writer)?;
                class.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::MethodRef {
                class,
                name_and_type,
                is_interface,
            } => {
                let tag: u8 = if *is_interface { 11 } else { 10 };
                tag.serialize(writer)?;
                class.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::NameAndType { name, descriptor } => {
                12u8.serialize(writer)?;
                name.serialize(writer)?;
                descriptor.serialize(writer)?;
            }
            Constant::InvokeDynamic {
                bootstrap_method,
                name_and_type,
            } => {
                18u8.serialize(writer)?;
                bootstrap_method.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
        }
        Ok(())
    }
}

/// Append-only, deduplicating constant pool builder
///
/// Indexing starts at 1 and the two 64-bit constant kinds claim two indices,
/// which is why the pool tracks its offset length separately from its entry
/// count.
pub struct ConstantsPool {
    constants: Vec<Constant>,

    /// Index the next constant will receive
    next_index: u16,

    utf8s: HashMap<String, Utf8ConstantIndex>,
    classes: HashMap<String, ClassConstantIndex>,
    strings: HashMap<Utf8ConstantIndex, ConstantIndex>,
    integers: HashMap<i32, ConstantIndex>,
    floats: HashMap<[u8; 4], ConstantIndex>,
    longs: HashMap<i64, ConstantIndex>,
    doubles: HashMap<[u8; 8], ConstantIndex>,
    name_and_types: HashMap<(Utf8ConstantIndex, Utf8ConstantIndex), ConstantIndex>,
    field_refs: HashMap<(ClassConstantIndex, ConstantIndex), ConstantIndex>,
    method_refs: HashMap<(ClassConstantIndex, ConstantIndex, bool), ConstantIndex>,
    invoke_dynamics: HashMap<(u16, ConstantIndex), ConstantIndex>,
}

impl ConstantsPool {
    pub fn new() -> ConstantsPool {
        ConstantsPool {
            constants: vec![],
            next_index: 1,
            utf8s: HashMap::new(),
            classes: HashMap::new(),
            strings: HashMap::new(),
            integers: HashMap::new(),
            floats: HashMap::new(),
            longs: HashMap::new(),
            doubles: HashMap::new(),
            name_and_types: HashMap::new(),
            field_refs: HashMap::new(),
            method_refs: HashMap::new(),
            invoke_dynamics: HashMap::new(),
        }
    }

    /// Push a constant into the pool, provided there is space for it
    fn push_constant(&mut self, constant: Constant) -> Result<ConstantIndex, Error> {
        let offset = self.next_index;
        match offset.checked_add(constant.width() as u16) {
            Some(next_index) => {
                self.next_index = next_index;
                self.constants.push(constant);
                Ok(ConstantIndex(offset))
            }
            None => Err(Error::ConstantPoolOverflow { constant, offset }),
        }
    }

    /// Get or insert a utf8 constant
    pub fn get_utf8(&mut self, text: &str) -> Result<Utf8ConstantIndex, Error> {
        if let Some(idx) = self.utf8s.get(text) {
            return Ok(*idx);
        }
        let idx = Utf8ConstantIndex(self.push_constant(Constant::Utf8(text.to_owned()))?);
        self.utf8s.insert(text.to_owned(), idx);
        Ok(idx)
    }

    /// Get or insert a class constant for an internal name
    pub fn get_class(&mut self, class: &BinaryName) -> Result<ClassConstantIndex, Error> {
        self.get_class_named(class.as_str())
    }

    /// Get or insert a class constant for an array type, whose constant-pool
    /// "name" is the rendered descriptor
    pub fn get_array_class(
        &mut self,
        descriptor: &FieldType<BinaryName>,
    ) -> Result<ClassConstantIndex, Error> {
        self.get_class_named(&descriptor.render())
    }

    fn get_class_named(&mut self, name: &str) -> Result<ClassConstantIndex, Error> {
        if let Some(idx) = self.classes.get(name) {
            return Ok(*idx);
        }
        let utf8 = self.get_utf8(name)?;
        let idx = ClassConstantIndex(self.push_constant(Constant::Class(utf8))?);
        self.classes.insert(name.to_owned(), idx);
        Ok(idx)
    }

    /// Get or insert a string constant
    pub fn get_string(&mut self, text: &str) -> Result<ConstantIndex, Error> {
        let utf8 = self.get_utf8(text)?;
        if let Some(idx) = self.strings.get(&utf8) {
            return Ok(*idx);
        }
        let idx = self.push_constant(Constant::String(utf8))?;
        self.strings.insert(utf8, idx);
        Ok(idx)
    }

    pub fn get_integer(&mut self, value: i32) -> Result<ConstantIndex, Error> {
        if let Some(idx) = self.integers.get(&value) {
            return Ok(*idx);
        }
        let idx = self.push_constant(Constant::Integer(value))?;
        self.integers.insert(value, idx);
        Ok(idx)
    }

    pub fn get_float(&mut self, value: f32) -> Result<ConstantIndex, Error> {
        let key = value.to_be_bytes();
        if let Some(idx) = self.floats.get(&key) {
            return Ok(*idx);
        }
        let idx = self.push_constant(Constant::Float(value))?;
        self.floats.insert(key, idx);
        Ok(idx)
    }

    pub fn get_long(&mut self, value: i64) -> Result<ConstantIndex, Error> {
        if let Some(idx) = self.longs.get(&value) {
            return Ok(*idx);
        }
        let idx = self.push_constant(Constant::Long(value))?;
        self.longs.insert(value, idx);
        Ok(idx)
    }

    pub fn get_double(&mut self, value: f64) -> Result<ConstantIndex, Error> {
        let key = value.to_be_bytes();
        if let Some(idx) = self.doubles.get(&key) {
            return Ok(*idx);
        }
        let idx = self.push_constant(Constant::Double(value))?;
        self.doubles.insert(key, idx);
        Ok(idx)
    }

    /// Get or insert a name & type constant
    pub fn get_name_and_type(
        &mut self,
        name: &str,
        descriptor: &str,
    ) -> Result<ConstantIndex, Error> {
        let name = self.get_utf8(name)?;
        let descriptor = self.get_utf8(descriptor)?;
        if let Some(idx) = self.name_and_types.get(&(name, descriptor)) {
            return Ok(*idx);
        }
        let idx = self.push_constant(Constant::NameAndType { name, descriptor })?;
        self.name_and_types.insert((name, descriptor), idx);
        Ok(idx)
    }

    /// Get or insert a field reference
    pub fn get_field_ref(
        &mut self,
        owner: &BinaryName,
        name: &UnqualifiedName,
        descriptor: &FieldType<BinaryName>,
    ) -> Result<ConstantIndex, Error> {
        let class = self.get_class(owner)?;
        let name_and_type = self.get_name_and_type(name.as_str(), &descriptor.render())?;
        if let Some(idx) = self.field_refs.get(&(class, name_and_type)) {
            return Ok(*idx);
        }
        let idx = self.push_constant(Constant::FieldRef(class, name_and_type))?;
        self.field_refs.insert((class, name_and_type), idx);
        Ok(idx)
    }

    /// Get or insert a method reference
    pub fn get_method_ref(
        &mut self,
        owner: &BinaryName,
        name: &UnqualifiedName,
        descriptor: &MethodDescriptor<BinaryName>,
        is_interface: bool,
    ) -> Result<ConstantIndex, Error> {
        let class = self.get_class(owner)?;
        let name_and_type = self.get_name_and_type(name.as_str(), &descriptor.render())?;
        let key = (class, name_and_type, is_interface);
        if let Some(idx) = self.method_refs.get(&key) {
            return Ok(*idx);
        }
        let idx = self.push_constant(Constant::MethodRef {
            class,
            name_and_type,
            is_interface,
        })?;
        self.method_refs.insert(key, idx);
        Ok(idx)
    }

    /// Get or insert an invoke-dynamic constant
    pub fn get_invoke_dynamic(
        &mut self,
        bootstrap_method: u16,
        name: &UnqualifiedName,
        descriptor: &MethodDescriptor<BinaryName>,
    ) -> Result<ConstantIndex, Error> {
        let name_and_type = self.get_name_and_type(name.as_str(), &descriptor.render())?;
        let key = (bootstrap_method, name_and_type);
        if let Some(idx) = self.invoke_dynamics.get(&key) {
            return Ok(*idx);
        }
        let idx = self.push_constant(Constant::InvokeDynamic {
            bootstrap_method,
            name_and_type,
        })?;
        self.invoke_dynamics.insert(key, idx);
        Ok(idx)
    }

    /// Get or insert the constant behind a load-constant instruction
    pub fn get_loadable(&mut self, constant: &LoadableConstant) -> Result<ConstantIndex, Error> {
        match constant {
            LoadableConstant::Integer(value) => self.get_integer(*value),
            LoadableConstant::Float(value) => self.get_float(*value),
            LoadableConstant::Long(value) => self.get_long(*value),
            LoadableConstant::Double(value) => self.get_double(*value),
            LoadableConstant::String(text) => self.get_string(text),
            LoadableConstant::Class(class) => Ok(self.get_class(class)?.0),
        }
    }
}

impl Default for ConstantsPool {
    fn default() -> ConstantsPool {
        ConstantsPool::new()
    }
}

impl Serialize for ConstantsPool {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> IoResult<()> {
        self.next_index.serialize(writer)?;
        for constant in &self.constants {
            constant.serialize(writer)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn indices_start_at_one_and_wide_constants_take_two() {
        let mut pool = ConstantsPool::new();
        let utf8 = pool.get_utf8("first").unwrap();
        assert_eq!(utf8.0, ConstantIndex(1));
        let long = pool.get_long(42).unwrap();
        assert_eq!(long, ConstantIndex(2));
        let after = pool.get_integer(7).unwrap();
        assert_eq!(after, ConstantIndex(4));
    }

    #[test]
    fn entries_are_deduplicated() {
        let mut pool = ConstantsPool::new();
        let a = pool.get_utf8("same").unwrap();
        let b = pool.get_utf8("same").unwrap();
        assert_eq!(a, b);

        let c1 = pool.get_class(&BinaryName::OBJECT).unwrap();
        let c2 = pool.get_class(&BinaryName::OBJECT).unwrap();
        assert_eq!(c1, c2);

        let name = UnqualifiedName::from_string(String::from("x")).unwrap();
        let f1 = pool
            .get_field_ref(&BinaryName::OBJECT, &name, &FieldType::int())
            .unwrap();
        let f2 = pool
            .get_field_ref(&BinaryName::OBJECT, &name, &FieldType::int())
            .unwrap();
        assert_eq!(f1, f2);
    }

    #[test]
    fn array_classes_use_their_descriptor_as_name() {
        let mut pool = ConstantsPool::new();
        let descriptor = FieldType::array(FieldType::<BinaryName>::int());
        let class = pool.get_array_class(&descriptor).unwrap();
        let again = pool.get_array_class(&descriptor).unwrap();
        assert_eq!(class, again);
        assert!(pool.utf8s.contains_key("[I"));
    }

    #[test]
    fn serialized_pool_leads_with_its_offset_count() {
        let mut pool = ConstantsPool::new();
        pool.get_utf8("a").unwrap();
        pool.get_long(1).unwrap();

        let mut bytes = vec![];
        pool.serialize(&mut bytes).unwrap();
        // 1 (utf8) + 2 (long) entries worth of indices, plus the initial 1
        assert_eq!(&bytes[..2], &[0, 4]);
    }
}
