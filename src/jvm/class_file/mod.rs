//! Binary class-file output
//!
//! [`ClassFileWriter`] is the concrete [`crate::jvm::code::ClassSink`] that
//! turns a visitation stream into the bytes of a class file, and
//! [`CodeWriter`] is the concrete [`crate::jvm::code::InstructionSink`] that
//! assembles one method body for it. Everything serializes through
//! [`Serialize`], which writes the big-endian layout the format dictates.

mod constants;
mod writer;

pub use constants::*;
pub use writer::*;

use byteorder::{BigEndian, WriteBytesExt};
use std::io::Result;

/// Class-file version word
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
}

impl Version {
    pub const JAVA8: Version = Version {
        major: 52,
        minor: 0,
    };
    pub const JAVA11: Version = Version {
        major: 55,
        minor: 0,
    };
    pub const JAVA17: Version = Version {
        major: 61,
        minor: 0,
    };
}

impl Serialize for Version {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.minor.serialize(writer)?;
        self.major.serialize(writer)?;
        Ok(())
    }
}

/// Utility trait for serializing data inside class files
///
/// The format has some peculiarities that make a dedicated trait more
/// convenient than a generic serialization framework: everything is
/// big-endian, tags are `u8`, and sequence lengths are usually `u16`.
pub trait Serialize: Sized {
    /// Serialize the construct into a binary output stream
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()>;
}

impl Serialize for u8 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(*self)
    }
}

impl Serialize for u16 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<BigEndian>(*self)
    }
}

impl Serialize for u32 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<BigEndian>(*self)
    }
}

impl Serialize for i8 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_i8(*self)
    }
}

impl Serialize for i16 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_i16::<BigEndian>(*self)
    }
}

impl Serialize for i32 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_i32::<BigEndian>(*self)
    }
}

impl Serialize for f32 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_f32::<BigEndian>(*self)
    }
}

impl Serialize for i64 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_i64::<BigEndian>(*self)
    }
}

impl Serialize for f64 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_f64::<BigEndian>(*self)
    }
}

/// Length in `u16` is serialized first
impl<A: Serialize> Serialize for Vec<A> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        (self.len() as u16).serialize(writer)?;
        for elem in self {
            elem.serialize(writer)?;
        }
        Ok(())
    }
}
