use super::code::StackSize;
use super::{BaseType, BinaryName, ClassAccessFlags};

/// An already-resolved description of a type, as supplied by the caller
///
/// Code emission only ever needs a handful of facts about a type: its
/// internal name, its stack-size classification, and a few shape predicates.
/// All of these are carried here verbatim; nothing is re-derived from loaded
/// classes or a type hierarchy.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct TypeDescription {
    name: BinaryName,
    sort: TypeSort,
    access_flags: ClassAccessFlags,
}

/// Fundamental shape of a described type
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum TypeSort {
    Void,
    Primitive(BaseType),
    Array {
        dimensions: usize,
        element: Box<TypeSort>,
    },
    Class,
    Interface,
}

impl TypeDescription {
    pub fn new(name: BinaryName, sort: TypeSort, access_flags: ClassAccessFlags) -> Self {
        TypeDescription {
            name,
            sort,
            access_flags,
        }
    }

    /// Describe a plain (concrete, non-array) class
    pub fn class(name: BinaryName, access_flags: ClassAccessFlags) -> Self {
        TypeDescription::new(name, TypeSort::Class, access_flags)
    }

    /// Describe an interface
    pub fn interface(name: BinaryName, access_flags: ClassAccessFlags) -> Self {
        TypeDescription::new(
            name,
            TypeSort::Interface,
            access_flags | ClassAccessFlags::INTERFACE | ClassAccessFlags::ABSTRACT,
        )
    }

    /// Slash-qualified internal name
    pub fn internal_name(&self) -> &BinaryName {
        &self.name
    }

    pub fn access_flags(&self) -> ClassAccessFlags {
        self.access_flags
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self.sort, TypeSort::Primitive(_) | TypeSort::Void)
    }

    pub fn is_array(&self) -> bool {
        matches!(self.sort, TypeSort::Array { .. })
    }

    pub fn is_interface(&self) -> bool {
        matches!(self.sort, TypeSort::Interface)
            || self.access_flags.contains(ClassAccessFlags::INTERFACE)
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::ABSTRACT)
    }

    /// Number of operand-stack or local-variable slots a value of this type
    /// occupies
    pub fn stack_size(&self) -> StackSize {
        match &self.sort {
            TypeSort::Void => StackSize::Zero,
            TypeSort::Primitive(BaseType::Long | BaseType::Double) => StackSize::Double,
            TypeSort::Primitive(_) => StackSize::Single,
            TypeSort::Array { .. } | TypeSort::Class | TypeSort::Interface => StackSize::Single,
        }
    }
}
