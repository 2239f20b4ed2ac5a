//! Composable units of code emission
//!
//! A [`StackManipulation`] is a self-describing chunk of method code: it
//! knows whether it can legally be emitted ([`StackManipulation::is_valid`])
//! and, when applied against an [`InstructionSink`], reports the [`Size`]
//! effect it had on the operand stack. Manipulations compose sequentially
//! with [`StackManipulation::compound`]; nested compounds flatten to a single
//! ordered list, so validity and size are plain linear folds regardless of
//! how the chain was built up.

mod arithmetic;
mod comparison;
mod constant;
mod duplication;
mod method_return;
mod removal;
mod throwing;
mod type_creation;

pub use arithmetic::*;
pub use comparison::*;
pub use constant::*;
pub use duplication::*;
pub use method_return::*;
pub use removal::*;
pub use throwing::*;
pub use type_creation::*;

use super::{InstructionSink, Size};
use crate::jvm::Error;

/// A unit of code emission with a validity flag and a reported size effect
#[derive(Clone, PartialEq, Debug)]
pub enum StackManipulation {
    /// Emits nothing and has no stack effect
    Trivial,

    /// Marks a composition that cannot be emitted. Applying it is an error;
    /// checking [`StackManipulation::is_valid`] first is the supported way to
    /// detect the failure before any instruction is committed.
    Illegal,

    Addition(Addition),
    Subtraction(Subtraction),
    Multiplication(Multiplication),
    ShiftLeft(ShiftLeft),
    ShiftRight(ShiftRight),
    IntegerConstant(IntegerConstant),
    LongConstant(LongConstant),
    FloatConstant(FloatConstant),
    DoubleConstant(DoubleConstant),
    Duplication(Duplication),
    FlippingDuplication(FlippingDuplication),
    Removal(Removal),
    Throw(Throw),
    PrimitiveComparison(PrimitiveComparison),
    TypeCreation(TypeCreation),
    MethodReturn(MethodReturn),

    /// An ordered sequence of manipulations
    Compound(Vec<StackManipulation>),
}

impl StackManipulation {
    /// Chain manipulations sequentially
    ///
    /// Nested compounds are spliced into the enclosing list, so
    /// `compound([compound([a, b]), c])` and `compound([a, b, c])` are the
    /// same value.
    pub fn compound(members: Vec<StackManipulation>) -> StackManipulation {
        let mut flattened = Vec::with_capacity(members.len());
        for member in members {
            match member {
                StackManipulation::Compound(inner) => flattened.extend(inner),
                other => flattened.push(other),
            }
        }
        StackManipulation::Compound(flattened)
    }

    /// Can this manipulation legally be emitted?
    pub fn is_valid(&self) -> bool {
        match self {
            StackManipulation::Illegal => false,
            StackManipulation::Compound(members) => members.iter().all(Self::is_valid),
            _ => true,
        }
    }

    /// Emit the manipulation into a sink, reporting its stack effect
    ///
    /// An [`StackManipulation::Illegal`] member fails with
    /// [`Error::IllegalStackManipulation`] before emitting anything.
    pub fn apply(&self, sink: &mut dyn InstructionSink) -> Result<Size, Error> {
        match self {
            StackManipulation::Trivial => Ok(Size::ZERO),
            StackManipulation::Illegal => Err(Error::IllegalStackManipulation),
            StackManipulation::Addition(m) => Ok(m.apply(sink)),
            StackManipulation::Subtraction(m) => Ok(m.apply(sink)),
            StackManipulation::Multiplication(m) => Ok(m.apply(sink)),
            StackManipulation::ShiftLeft(m) => Ok(m.apply(sink)),
            StackManipulation::ShiftRight(m) => Ok(m.apply(sink)),
            StackManipulation::IntegerConstant(m) => Ok(m.apply(sink)),
            StackManipulation::LongConstant(m) => Ok(m.apply(sink)),
            StackManipulation::FloatConstant(m) => Ok(m.apply(sink)),
            StackManipulation::DoubleConstant(m) => Ok(m.apply(sink)),
            StackManipulation::Duplication(m) => Ok(m.apply(sink)),
            StackManipulation::FlippingDuplication(m) => Ok(m.apply(sink)),
            StackManipulation::Removal(m) => Ok(m.apply(sink)),
            StackManipulation::Throw(m) => Ok(m.apply(sink)),
            StackManipulation::PrimitiveComparison(m) => Ok(m.apply(sink)),
            StackManipulation::TypeCreation(m) => Ok(m.apply(sink)),
            StackManipulation::MethodReturn(m) => Ok(m.apply(sink)),
            StackManipulation::Compound(members) => {
                members.iter().try_fold(Size::ZERO, |size, member| {
                    Ok(size.aggregate(member.apply(&mut *sink)?))
                })
            }
        }
    }
}

macro_rules! lift {
    ($($variant:ident),+ $(,)?) => {
        $(
            impl From<$variant> for StackManipulation {
                fn from(manipulation: $variant) -> StackManipulation {
                    StackManipulation::$variant(manipulation)
                }
            }
        )+
    };
}

lift! {
    Addition,
    Subtraction,
    Multiplication,
    ShiftLeft,
    ShiftRight,
    IntegerConstant,
    LongConstant,
    FloatConstant,
    DoubleConstant,
    Duplication,
    FlippingDuplication,
    Removal,
    Throw,
    PrimitiveComparison,
    TypeCreation,
    MethodReturn,
}
