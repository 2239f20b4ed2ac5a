//! Generate JVM classes
//!
//! ### Simple example
//!
//! Consider a method body computing `2 + 3` and returning the result. The
//! body can be described as a chain of stack manipulations and played into
//! any instruction sink:
//!
//! ```
//! use classweave::jvm::code::manipulation::{
//!     Addition, IntegerConstant, MethodReturn, StackManipulation,
//! };
//! use classweave::jvm::class_file::CodeWriter;
//! use classweave::jvm::code::LabelGenerator;
//! use classweave::jvm::Error;
//!
//! # fn emit_body() -> Result<(), Error> {
//! let body = StackManipulation::compound(vec![
//!     IntegerConstant::new(2).into(),
//!     IntegerConstant::new(3).into(),
//!     Addition::Integer.into(),
//!     MethodReturn::Integer.into(),
//! ]);
//! assert!(body.is_valid());
//!
//! let mut writer = CodeWriter::new(LabelGenerator::new());
//! let size = body.apply(&mut writer)?;
//! assert_eq!(size.impact(), 0);
//! assert_eq!(size.maximal(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! The [`jvm::visitor`] module wraps sinks with bookkeeping layers: operand
//! stack tracking, stack-map frame padding, and structural ordering of the
//! class-level visitation sequence.

pub mod jvm;
pub mod util;
