//! Operand-stack modelling and method-body emission
//!
//! The pieces here are layered: [`StackSize`] classifies how many slots a
//! value occupies, [`Size`] describes the net and peak effect a chunk of code
//! has on the operand stack, and [`manipulation`] composes emission units
//! that report their own [`Size`]. Everything is played into an
//! [`InstructionSink`], the visitor surface for a single method body.

mod label;
mod opcode;
mod sink;
mod stack_size;

pub mod manipulation;

pub use label::*;
pub use opcode::*;
pub use sink::*;
pub use stack_size::*;

#[cfg(test)]
pub(crate) use sink::recording;
