use super::class_file::Constant;
use super::code::{Label, StackSize};

/// Errors produced while assembling a class
#[derive(Debug)]
pub enum Error {
    IoError(std::io::Error),

    /// A name does not satisfy the format's lexical rules
    InvalidName(String),

    /// The constant pool ran out of slots for a constant
    ConstantPoolOverflow { constant: Constant, offset: u16 },

    /// A manipulation that reported itself invalid was applied anyways
    IllegalStackManipulation,

    /// Instance creation was requested for a type that cannot be instantiated
    /// (an array, primitive, abstract, or interface type)
    InvalidTypeCreation(String),

    /// A zero-sized value cannot be duplicated beneath other stack values
    IllegalDuplicationFlip,

    /// The operand stack was drained at a point where the code above was
    /// expected to have left a value on it
    DrainedValueMissing,

    /// The value on top of the operand stack at drain time did not have the
    /// width the drain was asked to preserve
    DrainedStackMismatch {
        expected: StackSize,
        found: StackSize,
    },

    /// A jump offset does not fit in the 16 bits the instruction offers
    JumpOffsetOverflow { target: Label },

    /// Method code was finished while some referenced labels were never placed
    UnplacedLabels(Vec<Label>),

    /// Two placements claim the same label (indicates a bug in emitting code)
    DuplicateLabel(Label),

    /// Method code grew past what exception table and frame offsets can index
    MethodCodeOverflow(usize),

    /// Two stack-map frames were declared for the same bytecode offset
    ConflictingFrames(u16),

    /// A class was finalized before its header was visited
    ClassHeaderMissing,

    /// A class visitation accumulated auxiliary types or a live type
    /// initializer without ever being marked active, so that output would be
    /// silently orphaned
    InactiveContext {
        auxiliary_types: usize,
        live_initializer: bool,
    },
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::IoError(err)
    }
}
